//! Radix-2 real FFT.
//!
//! Forward transforms produce the non-redundant half spectrum of a real
//! signal: `size / 2 + 1` bins from DC to Nyquist. The inverse takes the same
//! layout and returns `size` real samples scaled by `1 / size`, so an inverse
//! after a forward transform reproduces the input up to rounding.

use std::f64::consts::PI;
use std::ops::{Add, Mul, Sub};

/// A complex value in rectangular form.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Complex {
    pub re: f32,
    pub im: f32,
}

impl Complex {
    pub const ZERO: Self = Self { re: 0.0, im: 0.0 };

    pub const fn new(re: f32, im: f32) -> Self {
        Self { re, im }
    }

    /// Squared magnitude `re^2 + im^2`.
    #[inline]
    pub fn norm_sqr(self) -> f32 {
        self.re * self.re + self.im * self.im
    }

    #[inline]
    pub fn conj(self) -> Self {
        Self::new(self.re, -self.im)
    }

    #[inline]
    pub fn scale(self, k: f32) -> Self {
        Self::new(self.re * k, self.im * k)
    }
}

impl Add for Complex {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl Sub for Complex {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.re - rhs.re, self.im - rhs.im)
    }
}

impl Mul for Complex {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.re * rhs.re - self.im * rhs.im,
            self.re * rhs.im + self.im * rhs.re,
        )
    }
}

/// Real-input FFT of a fixed power-of-two size.
///
/// Tables are computed once at construction; transforms do not allocate.
#[derive(derive_more::Debug)]
pub struct RealFft {
    size: usize,
    /// `exp(-2*pi*i*k/size)` for `k < size / 2`.
    #[debug(skip)]
    twiddles: Vec<Complex>,
    #[debug(skip)]
    bit_reversed: Vec<usize>,
    #[debug(skip)]
    scratch: Vec<Complex>,
}

impl RealFft {
    /// Create a transform of `size` points.
    ///
    /// # Panics
    ///
    /// Panics if `size` is not a power of two or is smaller than 2.
    pub fn new(size: usize) -> Self {
        assert!(
            size >= 2 && size.is_power_of_two(),
            "FFT size must be a power of two >= 2, got {size}"
        );
        let twiddles = (0..size / 2)
            .map(|k| {
                let phase = -2.0 * PI * k as f64 / size as f64;
                Complex::new(phase.cos() as f32, phase.sin() as f32)
            })
            .collect();
        let bits = size.trailing_zeros();
        let bit_reversed = (0..size)
            .map(|i| i.reverse_bits() >> (usize::BITS - bits))
            .collect();
        Self {
            size,
            twiddles,
            bit_reversed,
            scratch: vec![Complex::ZERO; size],
        }
    }

    /// Number of time-domain points.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of half-spectrum bins (`size / 2 + 1`).
    pub fn num_bins(&self) -> usize {
        self.size / 2 + 1
    }

    /// Transform `input` (`size` samples) into `spectrum` (`num_bins` bins).
    ///
    /// # Panics
    ///
    /// Panics if the slice lengths do not match the transform size.
    pub fn forward(&mut self, input: &[f32], spectrum: &mut [Complex]) {
        assert_eq!(input.len(), self.size, "input length mismatch");
        assert_eq!(spectrum.len(), self.num_bins(), "spectrum length mismatch");
        for (&x, &j) in input.iter().zip(&self.bit_reversed) {
            self.scratch[j] = Complex::new(x, 0.0);
        }
        self.butterflies(false);
        spectrum.copy_from_slice(&self.scratch[..self.num_bins()]);
    }

    /// Transform a half spectrum back into `size` real samples.
    ///
    /// The imaginary parts of the DC and Nyquist bins are ignored.
    ///
    /// # Panics
    ///
    /// Panics if the slice lengths do not match the transform size.
    pub fn inverse(&mut self, spectrum: &[Complex], output: &mut [f32]) {
        let half = self.size / 2;
        assert_eq!(spectrum.len(), self.num_bins(), "spectrum length mismatch");
        assert_eq!(output.len(), self.size, "output length mismatch");
        for (k, &bin) in spectrum.iter().enumerate() {
            self.scratch[self.bit_reversed[k]] = bin;
        }
        for k in 1..half {
            self.scratch[self.bit_reversed[self.size - k]] = spectrum[k].conj();
        }
        self.butterflies(true);
        let scale = 1.0 / self.size as f32;
        for (y, c) in output.iter_mut().zip(&self.scratch) {
            *y = c.re * scale;
        }
    }

    fn butterflies(&mut self, inverse: bool) {
        let n = self.size;
        let mut len = 2;
        while len <= n {
            let half = len / 2;
            let stride = n / len;
            for start in (0..n).step_by(len) {
                for k in 0..half {
                    let w = self.twiddles[k * stride];
                    let w = if inverse { w.conj() } else { w };
                    let u = self.scratch[start + k];
                    let v = self.scratch[start + k + half] * w;
                    self.scratch[start + k] = u + v;
                    self.scratch[start + k + half] = u - v;
                }
            }
            len *= 2;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_strategy::proptest;

    #[test]
    fn dc_signal_concentrates_in_bin_zero() {
        let mut fft = RealFft::new(16);
        let input = [1.0f32; 16];
        let mut spectrum = [Complex::ZERO; 9];
        fft.forward(&input, &mut spectrum);
        assert!((spectrum[0].re - 16.0).abs() < 1e-5);
        for bin in &spectrum[1..] {
            assert!(bin.norm_sqr() < 1e-8, "leakage into {bin:?}");
        }
    }

    #[test]
    fn impulse_has_flat_spectrum() {
        let mut fft = RealFft::new(32);
        let mut input = [0.0f32; 32];
        input[0] = 1.0;
        let mut spectrum = [Complex::ZERO; 17];
        fft.forward(&input, &mut spectrum);
        for bin in &spectrum {
            assert!((bin.re - 1.0).abs() < 1e-6);
            assert!(bin.im.abs() < 1e-6);
        }
    }

    #[test]
    fn cosine_peaks_at_its_bin() {
        let n = 256;
        let k = 10;
        let mut fft = RealFft::new(n);
        let input: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * k as f32 * i as f32 / n as f32).cos())
            .collect();
        let mut spectrum = vec![Complex::ZERO; n / 2 + 1];
        fft.forward(&input, &mut spectrum);
        let peak = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.norm_sqr().total_cmp(&b.1.norm_sqr()))
            .map(|(i, _)| i);
        assert_eq!(peak, Some(k));
        assert!((spectrum[k].re - n as f32 / 2.0).abs() < 1e-2);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn rejects_non_power_of_two() {
        let _ = RealFft::new(160);
    }

    #[proptest]
    fn inverse_recovers_signal(
        #[strategy(proptest::collection::vec(-1.0f32..1.0, 128))] input: Vec<f32>,
    ) {
        let mut fft = RealFft::new(128);
        let mut spectrum = vec![Complex::ZERO; 65];
        let mut output = vec![0.0f32; 128];
        fft.forward(&input, &mut spectrum);
        fft.inverse(&spectrum, &mut output);
        for (a, b) in input.iter().zip(&output) {
            prop_assert!((a - b).abs() < 1e-5);
        }
    }
}
