//! Overlap-add short-time Fourier framing for 10 ms frames.
//!
//! Each analysis step prepends the last `overlap` input samples to the new
//! frame, forming an extended frame of `fft_size` samples, windows it and
//! transforms it. Synthesis applies per-bin gains, inverse transforms,
//! windows again and overlap-adds with the tail of the previous frame.
//!
//! The window is a sine taper over the overlap regions and flat in between,
//! so that analysis and synthesis windows together sum to one across every
//! overlap. With unity gains the output equals the input delayed by
//! `overlap` samples.

use std::f32::consts::PI;

use crate::real_fft::{Complex, RealFft};

/// Build the hybrid sine/flat window for the given frame and FFT size.
///
/// `w[i] = sin(pi * i / (2 * overlap))` on the rising edge, `1` from
/// `overlap` to `frame_size` inclusive, mirrored on the falling edge.
pub fn hybrid_window(frame_size: usize, fft_size: usize) -> Vec<f32> {
    let overlap = fft_size - frame_size;
    let rising = |i: usize| (PI * i as f32 / (2.0 * overlap as f32)).sin();
    (0..fft_size)
        .map(|i| {
            if i < overlap {
                rising(i)
            } else if i <= frame_size {
                1.0
            } else {
                rising(overlap - (i - frame_size))
            }
        })
        .collect()
}

/// Write `|X[k]|^2` for each bin into `power`.
pub fn power_spectrum(spectrum: &[Complex], power: &mut [f32]) {
    debug_assert_eq!(spectrum.len(), power.len());
    for (p, c) in power.iter_mut().zip(spectrum) {
        *p = c.norm_sqr();
    }
}

/// Overlap-add analysis/synthesis for one signal.
#[derive(derive_more::Debug)]
pub struct Stft {
    frame_size: usize,
    overlap: usize,
    #[debug(skip)]
    window: Vec<f32>,
    fft: RealFft,
    #[debug(skip)]
    analysis_memory: Vec<f32>,
    #[debug(skip)]
    synthesis_memory: Vec<f32>,
    #[debug(skip)]
    extended: Vec<f32>,
    #[debug(skip)]
    spectrum: Vec<Complex>,
}

impl Stft {
    /// Framer for `frame_size` samples per frame using the smallest power of
    /// two FFT strictly larger than the frame (256 for 160, 128 for 80).
    pub fn for_frame_size(frame_size: usize) -> Self {
        Self::new(frame_size, (frame_size + 1).next_power_of_two())
    }

    /// # Panics
    ///
    /// Panics unless `frame_size < fft_size <= 2 * frame_size` and `fft_size`
    /// is a power of two.
    pub fn new(frame_size: usize, fft_size: usize) -> Self {
        assert!(
            frame_size < fft_size && fft_size <= 2 * frame_size,
            "FFT size {fft_size} does not fit frame size {frame_size}"
        );
        let overlap = fft_size - frame_size;
        let fft = RealFft::new(fft_size);
        let num_bins = fft.num_bins();
        Self {
            frame_size,
            overlap,
            window: hybrid_window(frame_size, fft_size),
            fft,
            analysis_memory: vec![0.0; overlap],
            synthesis_memory: vec![0.0; overlap],
            extended: vec![0.0; fft_size],
            spectrum: vec![Complex::ZERO; num_bins],
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn fft_size(&self) -> usize {
        self.fft.size()
    }

    pub fn num_bins(&self) -> usize {
        self.fft.num_bins()
    }

    /// Delay in samples between an analyzed input and its synthesized output.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Analyze one frame and return its spectrum.
    ///
    /// # Panics
    ///
    /// Panics if `frame` is not `frame_size` samples long.
    pub fn analyze(&mut self, frame: &[f32]) -> &[Complex] {
        assert_eq!(frame.len(), self.frame_size, "frame length mismatch");
        self.extended[..self.overlap].copy_from_slice(&self.analysis_memory);
        self.extended[self.overlap..].copy_from_slice(frame);
        self.analysis_memory
            .copy_from_slice(&self.extended[self.frame_size..]);
        for (x, &w) in self.extended.iter_mut().zip(&self.window) {
            *x *= w;
        }
        self.fft.forward(&self.extended, &mut self.spectrum);
        &self.spectrum
    }

    /// Spectrum of the most recently analyzed frame.
    pub fn spectrum(&self) -> &[Complex] {
        &self.spectrum
    }

    /// Apply `gains` to the last analyzed spectrum and write one synthesized
    /// frame into `output`.
    ///
    /// # Panics
    ///
    /// Panics if `gains` is not `num_bins` long or `output` is not
    /// `frame_size` long.
    pub fn synthesize(&mut self, gains: &[f32], output: &mut [f32]) {
        assert_eq!(gains.len(), self.spectrum.len(), "gain length mismatch");
        assert_eq!(output.len(), self.frame_size, "output length mismatch");
        for (bin, &g) in self.spectrum.iter_mut().zip(gains) {
            *bin = bin.scale(g);
        }
        self.fft.inverse(&self.spectrum, &mut self.extended);
        for (x, &w) in self.extended.iter_mut().zip(&self.window) {
            *x *= w;
        }
        let ov = self.overlap;
        for ((y, &x), &m) in output[..ov]
            .iter_mut()
            .zip(&self.extended[..ov])
            .zip(&self.synthesis_memory)
        {
            *y = x + m;
        }
        output[ov..].copy_from_slice(&self.extended[ov..self.frame_size]);
        self.synthesis_memory
            .copy_from_slice(&self.extended[self.frame_size..]);
    }
}
