//! Directed-decision Wiener filter.
//!
//! The prior SNR blends the previous frame's filtered SNR with the current
//! posterior SNR. The gain `snr / (over_subtraction + snr)` is floored at the
//! level's minimum gain so that suppressed bins never drop to zero, which
//! keeps the residual noise smooth instead of musical.

use crate::suppression_params::SuppressionParams;

/// Weight of the previous frame in the directed-decision estimate.
const DD_SMOOTHING: f32 = 0.98;

#[derive(Debug)]
pub(crate) struct WienerFilter {
    params: SuppressionParams,
    spectrum_prev_process: Vec<f32>,
    filter: Vec<f32>,
}

impl WienerFilter {
    pub(crate) fn new(params: SuppressionParams, num_bins: usize) -> Self {
        Self {
            params,
            spectrum_prev_process: vec![0.0; num_bins],
            filter: vec![1.0; num_bins],
        }
    }

    /// Update the per-bin gains from the current signal and noise spectra.
    pub(crate) fn update(
        &mut self,
        noise_spectrum: &[f32],
        prev_noise_spectrum: &[f32],
        signal_spectrum: &[f32],
    ) {
        let over_sub = self.params.over_subtraction_factor;
        let min_gain = self.params.minimum_attenuating_gain;

        for (i, gain) in self.filter.iter_mut().enumerate() {
            let prev_tsa =
                self.spectrum_prev_process[i] / (prev_noise_spectrum[i] + 0.0001) * *gain;
            let current_tsa = if signal_spectrum[i] > noise_spectrum[i] {
                signal_spectrum[i] / (noise_spectrum[i] + 0.0001) - 1.0
            } else {
                0.0
            };
            let snr_prior = DD_SMOOTHING * prev_tsa + (1.0 - DD_SMOOTHING) * current_tsa;
            *gain = (snr_prior / (over_sub + snr_prior)).clamp(min_gain, 1.0);
        }

        self.spectrum_prev_process.copy_from_slice(signal_spectrum);
    }

    /// Prior and posterior SNR for the speech model, using the current gains.
    pub(crate) fn compute_snr(
        &self,
        signal_spectrum: &[f32],
        noise_spectrum: &[f32],
        prev_noise_spectrum: &[f32],
        prior_snr: &mut [f32],
        post_snr: &mut [f32],
    ) {
        for i in 0..self.filter.len() {
            let prev_estimate =
                self.spectrum_prev_process[i] / (prev_noise_spectrum[i] + 0.0001) * self.filter[i];
            post_snr[i] = if signal_spectrum[i] > noise_spectrum[i] {
                signal_spectrum[i] / (noise_spectrum[i] + 0.0001) - 1.0
            } else {
                0.0
            };
            prior_snr[i] = DD_SMOOTHING * prev_estimate + (1.0 - DD_SMOOTHING) * post_snr[i];
        }
    }

    pub(crate) fn filter(&self) -> &[f32] {
        &self.filter
    }

    pub(crate) fn min_gain(&self) -> f32 {
        self.params.minimum_attenuating_gain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SuppressionLevel;

    fn filter(level: SuppressionLevel) -> WienerFilter {
        WienerFilter::new(SuppressionParams::for_level(level), 65)
    }

    #[test]
    fn starts_transparent() {
        let f = filter(SuppressionLevel::K12dB);
        assert!(f.filter().iter().all(|&g| g == 1.0));
    }

    #[test]
    fn noise_only_bins_hit_the_floor() {
        for level in [SuppressionLevel::K6dB, SuppressionLevel::K21dB] {
            let mut f = filter(level);
            let noise = vec![100.0f32; 65];
            for _ in 0..300 {
                f.update(&noise, &noise, &noise);
            }
            let floor = f.min_gain();
            assert!(f.filter().iter().all(|&g| (g - floor).abs() < 1e-6));
        }
    }

    #[test]
    fn strong_signal_passes() {
        let mut f = filter(SuppressionLevel::K18dB);
        let noise = vec![1.0f32; 65];
        let signal = vec![1000.0f32; 65];
        for _ in 0..20 {
            f.update(&noise, &noise, &signal);
        }
        assert!(f.filter().iter().all(|&g| g > 0.95));
    }

    #[test]
    fn gains_stay_within_bounds() {
        let mut f = filter(SuppressionLevel::K12dB);
        let noise = vec![10.0f32; 65];
        for i in 0..100 {
            let signal: Vec<f32> = (0..65).map(|k| ((i * 7 + k * 13) % 50) as f32).collect();
            f.update(&noise, &noise, &signal);
            assert!(f.filter().iter().all(|&g| (0.25..=1.0).contains(&g)));
        }
    }
}
