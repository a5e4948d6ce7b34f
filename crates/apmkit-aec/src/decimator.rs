//! Anti-aliased downsampling to about 4 kHz for delay estimation.

use apmkit_common_audio::cascaded_biquad_filter::{BiQuadCoefficients, CascadedBiQuadFilter};

/// Approximate rate the delay estimator works at.
pub(crate) const DECIMATED_RATE_HZ: usize = 4000;

/// Anti-aliasing cutoff, below the Nyquist frequency of the decimated rate.
const ANTI_ALIASING_CUTOFF_HZ: f32 = 1800.0;

#[derive(Debug)]
pub(crate) struct Decimator {
    factor: usize,
    anti_aliasing_filter: CascadedBiQuadFilter,
    scratch: Vec<f32>,
}

impl Decimator {
    /// Decimator for a band sampled at `band_rate_hz`.
    pub(crate) fn new(band_rate_hz: usize) -> Self {
        let factor = (band_rate_hz / DECIMATED_RATE_HZ).max(1);
        let rate = u32::try_from(band_rate_hz).unwrap_or(u32::MAX);
        Self {
            factor,
            anti_aliasing_filter: CascadedBiQuadFilter::new(
                &BiQuadCoefficients::butterworth_low_pass(ANTI_ALIASING_CUTOFF_HZ, rate),
            ),
            scratch: Vec::new(),
        }
    }

    pub(crate) fn factor(&self) -> usize {
        self.factor
    }

    /// Low-pass `input` and append every `factor`-th sample to `out`.
    pub(crate) fn decimate(&mut self, input: &[f32], out: &mut Vec<f32>) {
        self.scratch.clear();
        self.scratch.extend_from_slice(input);
        self.anti_aliasing_filter.process_in_place(&mut self.scratch);
        out.extend(self.scratch.iter().step_by(self.factor));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factor_targets_four_kilohertz() {
        assert_eq!(Decimator::new(8000).factor(), 2);
        assert_eq!(Decimator::new(16000).factor(), 4);
    }

    #[test]
    fn output_length_matches_factor() {
        let mut decimator = Decimator::new(16000);
        let mut out = Vec::new();
        decimator.decimate(&[1.0; 160], &mut out);
        assert_eq!(out.len(), 40);
        decimator.decimate(&[1.0; 160], &mut out);
        assert_eq!(out.len(), 80);
    }
}
