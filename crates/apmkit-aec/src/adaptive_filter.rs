//! Time-domain NLMS echo path model for one band.

use apmkit_common_audio::audio_util::energy;

use crate::error::FilterDiverged;

/// Per-tap power added to the NLMS normalization.
const REGULARIZATION_POWER: f32 = 100.0;

/// Residual energy above this multiple of the capture energy means the
/// model is producing echo instead of removing it.
const DIVERGENCE_FACTOR: f32 = 1.5;

/// Capture frames below this mean-square power are too quiet for a
/// divergence decision.
const DIVERGENCE_MIN_CAPTURE_POWER: f32 = 30.0 * 30.0;

/// Frame energies produced by one [`AdaptiveFilter::process`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct FilterOutput {
    pub(crate) capture_energy: f32,
    pub(crate) echo_energy: f32,
    pub(crate) residual_energy: f32,
}

#[derive(derive_more::Debug)]
pub(crate) struct AdaptiveFilter {
    #[debug(skip)]
    coefficients: Vec<f32>,
    step_size: f32,
    regularization: f32,
}

impl AdaptiveFilter {
    pub(crate) fn new(num_taps: usize, step_size: f32) -> Self {
        Self {
            coefficients: vec![0.0; num_taps],
            step_size,
            regularization: REGULARIZATION_POWER * num_taps as f32,
        }
    }

    /// Estimate the echo in `capture` and write it to `echo`, the
    /// difference to `residual`.
    ///
    /// `render` holds the aligned render history oldest first, with the
    /// frame matching `capture` last; it must be at least
    /// `num_taps + capture.len()` long. Coefficients adapt per sample when
    /// `adapt` is set.
    pub(crate) fn process(
        &mut self,
        render: &[f32],
        capture: &[f32],
        adapt: bool,
        echo: &mut [f32],
        residual: &mut [f32],
    ) -> FilterOutput {
        let n = self.coefficients.len();
        let len = capture.len();
        debug_assert!(render.len() >= n + len);
        let offset = render.len() - len;

        // Tap k multiplies render[p - k]; the window for sample j is
        // render[p - n + 1..=p] reversed, with p = offset + j.
        let mut window_energy = energy(&render[offset + 1 - n..offset + 1]);
        let mut output = FilterOutput::default();
        for j in 0..len {
            let p = offset + j;
            if j > 0 {
                let entering = render[p];
                let leaving = render[p - n];
                window_energy = (window_energy + entering * entering - leaving * leaving).max(0.0);
            }
            let window = &render[p + 1 - n..=p];
            let estimate: f32 = self
                .coefficients
                .iter()
                .zip(window.iter().rev())
                .map(|(h, x)| h * x)
                .sum();
            let error = capture[j] - estimate;
            echo[j] = estimate;
            residual[j] = error;

            if adapt {
                let gain = self.step_size * error / (window_energy + self.regularization);
                for (h, x) in self.coefficients.iter_mut().zip(window.iter().rev()) {
                    *h += gain * x;
                }
            }

            output.capture_energy += capture[j] * capture[j];
            output.echo_energy += estimate * estimate;
            output.residual_energy += error * error;
        }
        output
    }

    /// Fails when the residual is much louder than the capture.
    pub(crate) fn check_divergence(
        &self,
        output: &FilterOutput,
        frame_len: usize,
    ) -> Result<(), FilterDiverged> {
        let min_capture_energy = DIVERGENCE_MIN_CAPTURE_POWER * frame_len as f32;
        if output.capture_energy > min_capture_energy
            && output.residual_energy > DIVERGENCE_FACTOR * output.capture_energy
        {
            return Err(FilterDiverged {
                residual_energy: output.residual_energy,
                capture_energy: output.capture_energy,
            });
        }
        Ok(())
    }

    /// Move the impulse response by `taps` toward later lags (positive) or
    /// earlier lags (negative), zero-filling the vacated taps.
    pub(crate) fn shift(&mut self, taps: isize) {
        let n = self.coefficients.len();
        let amount = taps.unsigned_abs().min(n);
        if taps > 0 {
            self.coefficients.copy_within(..n - amount, amount);
            self.coefficients[..amount].fill(0.0);
        } else if taps < 0 {
            self.coefficients.copy_within(amount.., 0);
            self.coefficients[n - amount..].fill(0.0);
        }
    }

    #[cfg(test)]
    pub(crate) fn coefficients(&self) -> &[f32] {
        &self.coefficients
    }

    pub(crate) fn reset(&mut self) {
        self.coefficients.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise(len: usize, seed: u32, amplitude: f32) -> Vec<f32> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                ((state >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0) * amplitude
            })
            .collect()
    }

    #[test]
    fn learns_a_delayed_attenuated_path() {
        let len = 80;
        let taps = 240;
        let mut filter = AdaptiveFilter::new(taps, 0.5);
        let render = noise(len * 100, 3, 3000.0);
        let mut echo = vec![0.0f32; len];
        let mut residual = vec![0.0f32; len];
        let mut last = FilterOutput::default();
        for f in 4..100 {
            let history = &render[(f - 4 + 1) * len..(f + 1) * len];
            // Echo path: 30 samples delay, gain 0.5.
            let capture: Vec<f32> = (0..len).map(|j| 0.5 * render[f * len + j - 30]).collect();
            last = filter.process(history, &capture, true, &mut echo, &mut residual);
        }
        assert!(
            last.residual_energy < 1e-3 * last.capture_energy,
            "{last:?}"
        );
        let peak = filter
            .coefficients()
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(i, _)| i);
        assert_eq!(peak, Some(30));
    }

    #[test]
    fn frozen_filter_does_not_change() {
        let mut filter = AdaptiveFilter::new(160, 0.5);
        let render = noise(320, 1, 1000.0);
        let capture = noise(160, 2, 1000.0);
        let mut echo = vec![0.0f32; 160];
        let mut residual = vec![0.0f32; 160];
        let output = filter.process(&render, &capture, false, &mut echo, &mut residual);
        assert!(filter.coefficients().iter().all(|&h| h == 0.0));
        assert_eq!(residual, capture);
        assert_eq!(output.echo_energy, 0.0);
    }

    #[test]
    fn divergence_requires_loud_residual() {
        let filter = AdaptiveFilter::new(160, 0.5);
        let ok = FilterOutput {
            capture_energy: 1e8,
            echo_energy: 1e8,
            residual_energy: 1e8,
        };
        assert_eq!(filter.check_divergence(&ok, 160), Ok(()));
        let blown = FilterOutput {
            residual_energy: 2e8,
            ..ok
        };
        assert!(filter.check_divergence(&blown, 160).is_err());
        let quiet = FilterOutput {
            capture_energy: 10.0,
            echo_energy: 0.0,
            residual_energy: 1e6,
        };
        assert_eq!(filter.check_divergence(&quiet, 160), Ok(()));
    }

    #[test]
    fn shift_moves_taps() {
        let mut filter = AdaptiveFilter::new(6, 0.5);
        filter.coefficients.copy_from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        filter.shift(-2);
        assert_eq!(filter.coefficients(), &[3.0, 4.0, 5.0, 6.0, 0.0, 0.0]);
        filter.shift(3);
        assert_eq!(filter.coefficients(), &[0.0, 0.0, 0.0, 3.0, 4.0, 5.0]);
        filter.shift(10);
        assert!(filter.coefficients().iter().all(|&h| h == 0.0));
    }
}
