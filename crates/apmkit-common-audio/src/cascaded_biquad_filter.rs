//! Cascaded biquad (IIR) filter in direct form 1.
//!
//! Each section computes
//! `y[n] = b0 x[n] + b1 x[n-1] + b2 x[n-2] - a1 y[n-1] - a2 y[n-2]`,
//! with `a0` normalized to one.

use std::f64::consts::PI;

use crate::audio_util::flush_denormal;

/// Pole quality factors of a fourth-order Butterworth prototype.
const BUTTERWORTH_Q: [f32; 2] = [0.541_196_1, 1.306_563];

/// Coefficients for a single second-order section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiQuadCoefficients {
    pub b: [f32; 3],
    pub a: [f32; 2],
}

impl BiQuadCoefficients {
    /// Second-order high-pass section with quality factor `q`, designed with
    /// the bilinear transform.
    pub fn high_pass(cutoff_hz: f32, sample_rate_hz: u32, q: f32) -> Self {
        let w0 = 2.0 * PI * f64::from(cutoff_hz) / f64::from(sample_rate_hz);
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * f64::from(q));
        let a0 = 1.0 + alpha;
        let b0 = (1.0 + cos_w0) / 2.0 / a0;
        Self {
            b: [b0 as f32, (-2.0 * b0) as f32, b0 as f32],
            a: [(-2.0 * cos_w0 / a0) as f32, ((1.0 - alpha) / a0) as f32],
        }
    }

    /// Second-order low-pass section with quality factor `q`.
    pub fn low_pass(cutoff_hz: f32, sample_rate_hz: u32, q: f32) -> Self {
        let w0 = 2.0 * PI * f64::from(cutoff_hz) / f64::from(sample_rate_hz);
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * f64::from(q));
        let a0 = 1.0 + alpha;
        let b1 = (1.0 - cos_w0) / a0;
        Self {
            b: [(b1 / 2.0) as f32, b1 as f32, (b1 / 2.0) as f32],
            a: [(-2.0 * cos_w0 / a0) as f32, ((1.0 - alpha) / a0) as f32],
        }
    }

    /// Fourth-order Butterworth high-pass as two cascaded sections.
    pub fn butterworth_high_pass(cutoff_hz: f32, sample_rate_hz: u32) -> [Self; 2] {
        BUTTERWORTH_Q.map(|q| Self::high_pass(cutoff_hz, sample_rate_hz, q))
    }

    /// Fourth-order Butterworth low-pass as two cascaded sections.
    pub fn butterworth_low_pass(cutoff_hz: f32, sample_rate_hz: u32) -> [Self; 2] {
        BUTTERWORTH_Q.map(|q| Self::low_pass(cutoff_hz, sample_rate_hz, q))
    }
}

/// State for a single biquad section.
#[derive(Debug, Clone)]
struct BiQuad {
    coefficients: BiQuadCoefficients,
    x: [f32; 2],
    y: [f32; 2],
}

impl BiQuad {
    fn new(coefficients: BiQuadCoefficients) -> Self {
        Self {
            coefficients,
            x: [0.0; 2],
            y: [0.0; 2],
        }
    }

    fn process_in_place(&mut self, samples: &mut [f32]) {
        let [b0, b1, b2] = self.coefficients.b;
        let [a1, a2] = self.coefficients.a;
        let [mut x0, mut x1] = self.x;
        let [mut y0, mut y1] = self.y;
        for v in samples.iter_mut() {
            let input = *v;
            let output = flush_denormal(b0 * input + b1 * x0 + b2 * x1 - a1 * y0 - a2 * y1);
            x1 = x0;
            x0 = input;
            y1 = y0;
            y0 = output;
            *v = output;
        }
        self.x = [x0, x1];
        self.y = [y0, y1];
    }
}

/// Multiple second-order sections applied in series.
#[derive(Debug, Clone)]
pub struct CascadedBiQuadFilter {
    biquads: Vec<BiQuad>,
}

impl CascadedBiQuadFilter {
    pub fn new(coefficients: &[BiQuadCoefficients]) -> Self {
        Self {
            biquads: coefficients.iter().copied().map(BiQuad::new).collect(),
        }
    }

    /// Filters `x` into `y`.
    ///
    /// # Panics
    ///
    /// Panics if `x` and `y` have different lengths.
    pub fn process(&mut self, x: &[f32], y: &mut [f32]) {
        y.copy_from_slice(x);
        self.process_in_place(y);
    }

    /// Filters `y` in place through all sections.
    pub fn process_in_place(&mut self, y: &mut [f32]) {
        for bq in &mut self.biquads {
            bq.process_in_place(y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_util::DENORMAL_FLOOR;

    fn lowpass_coefficients() -> BiQuadCoefficients {
        BiQuadCoefficients {
            b: [0.25, 0.5, 0.25],
            a: [0.1, 0.2],
        }
    }

    fn sine(freq_hz: f32, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                (2.0 * std::f32::consts::PI * freq_hz * i as f32 / rate as f32).sin() * 1000.0
            })
            .collect()
    }

    fn rms(x: &[f32]) -> f32 {
        (x.iter().map(|v| v * v).sum::<f32>() / x.len() as f32).sqrt()
    }

    #[test]
    fn empty_filter_is_passthrough() {
        let mut filter = CascadedBiQuadFilter::new(&[]);
        let input = [1.0, 2.0, 3.0, 4.0];
        let mut output = [0.0f32; 4];
        filter.process(&input, &mut output);
        assert_eq!(output, input);
    }

    #[test]
    fn first_output_is_b0_times_impulse() {
        let mut filter = CascadedBiQuadFilter::new(&[lowpass_coefficients()]);
        let mut output = [0.0f32; 8];
        let mut input = [0.0f32; 8];
        input[0] = 1.0;
        filter.process(&input, &mut output);
        assert!((output[0] - 0.25).abs() < 1e-6);
        assert!(output[1] != 0.0);
    }

    #[test]
    fn clones_continue_from_the_same_state() {
        let mut filter = CascadedBiQuadFilter::new(&[lowpass_coefficients()]);
        let input = [1.0, 1.0, 1.0, 1.0];
        let mut first = [0.0f32; 4];
        filter.process(&input, &mut first);
        let mut copy = filter.clone();
        let mut a = [0.0f32; 4];
        let mut b = [0.0f32; 4];
        filter.process(&input, &mut a);
        copy.process(&input, &mut b);
        assert_eq!(a, b);
        assert_ne!(a, first);
    }

    #[test]
    fn decaying_tail_reaches_exact_zero() {
        let coefficients = BiQuadCoefficients::butterworth_high_pass(80.0, 16000);
        let mut filter = CascadedBiQuadFilter::new(&coefficients);
        let mut loud = sine(300.0, 16000, 1600);
        loud.iter_mut().for_each(|v| *v *= 30.0);
        filter.process_in_place(&mut loud);

        let mut tail = Vec::new();
        for _ in 0..200 {
            let mut frame = [0.0f32; 160];
            filter.process_in_place(&mut frame);
            assert!(frame.iter().all(|v| *v == 0.0 || v.abs() >= DENORMAL_FLOOR));
            tail.extend_from_slice(&frame);
        }
        assert!(tail[tail.len() - 16_000..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn butterworth_high_pass_removes_dc_and_keeps_speech_band() {
        for rate in [8000, 16000, 32000, 48000] {
            let coefficients = BiQuadCoefficients::butterworth_high_pass(80.0, rate);
            let mut filter = CascadedBiQuadFilter::new(&coefficients);

            let mut dc = vec![1000.0f32; rate as usize];
            filter.process_in_place(&mut dc);
            let tail = &dc[dc.len() - 100..];
            assert!(rms(tail) < 1.0, "DC leaks through at {rate} Hz");

            let mut filter = CascadedBiQuadFilter::new(&coefficients);
            let mut tone = sine(1000.0, rate, rate as usize / 2);
            let input_rms = rms(&tone);
            filter.process_in_place(&mut tone);
            let output_rms = rms(&tone[tone.len() / 2..]);
            assert!(
                (output_rms / input_rms - 1.0).abs() < 0.05,
                "1 kHz attenuated at {rate} Hz: {output_rms} / {input_rms}"
            );
        }
    }

    #[test]
    fn butterworth_low_pass_keeps_dc_and_removes_highs() {
        let coefficients = BiQuadCoefficients::butterworth_low_pass(1800.0, 16000);
        let mut filter = CascadedBiQuadFilter::new(&coefficients);
        let mut dc = vec![1000.0f32; 1600];
        filter.process_in_place(&mut dc);
        assert!((dc[1599] - 1000.0).abs() < 1.0);

        let mut filter = CascadedBiQuadFilter::new(&coefficients);
        let mut tone = sine(6000.0, 16000, 1600);
        let input_rms = rms(&tone);
        filter.process_in_place(&mut tone);
        assert!(rms(&tone[800..]) < 0.05 * input_rms);
    }

    #[test]
    fn silence_stays_silent() {
        let coefficients = BiQuadCoefficients::butterworth_high_pass(80.0, 16000);
        let mut filter = CascadedBiQuadFilter::new(&coefficients);
        let mut x = [0.0f32; 160];
        filter.process_in_place(&mut x);
        assert!(x.iter().all(|&v| v == 0.0));
    }
}
