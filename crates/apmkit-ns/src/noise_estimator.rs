//! Noise spectrum estimate refined by speech presence.
//!
//! The quantile tracker provides the raw floor. After each frame's speech
//! probability is known, bins likely to contain speech are updated slowly
//! while noise-dominated bins follow the signal faster.

use crate::quantile_noise_estimator::QuantileNoiseEstimator;

/// Time-averaging factor for noise-dominated bins.
const NOISE_UPDATE: f32 = 0.9;
/// Time-averaging factor for bins likely to carry speech.
const SPEECH_UPDATE: f32 = 0.99;
/// Speech probability above which a bin is treated as speech.
const PROB_RANGE: f32 = 0.2;

#[derive(Debug)]
pub(crate) struct NoiseEstimator {
    quantile_noise_estimator: QuantileNoiseEstimator,
    prev_noise_spectrum: Vec<f32>,
    noise_spectrum: Vec<f32>,
}

impl NoiseEstimator {
    pub(crate) fn new(num_bins: usize) -> Self {
        Self {
            quantile_noise_estimator: QuantileNoiseEstimator::new(num_bins),
            prev_noise_spectrum: vec![0.0; num_bins],
            noise_spectrum: vec![0.0; num_bins],
        }
    }

    /// Remember the current estimate and run the quantile tracker.
    pub(crate) fn pre_update(&mut self, signal_spectrum: &[f32]) {
        self.prev_noise_spectrum.copy_from_slice(&self.noise_spectrum);
        self.quantile_noise_estimator
            .estimate(signal_spectrum, &mut self.noise_spectrum);
    }

    /// Refine the estimate with per-bin speech probabilities.
    pub(crate) fn post_update(&mut self, speech_probability: &[f32], signal_spectrum: &[f32]) {
        for ((noise, &prev), (&p_speech, &signal)) in self
            .noise_spectrum
            .iter_mut()
            .zip(&self.prev_noise_spectrum)
            .zip(speech_probability.iter().zip(signal_spectrum))
        {
            let target = (1.0 - p_speech) * signal + p_speech * prev;
            let tracked = NOISE_UPDATE * prev + (1.0 - NOISE_UPDATE) * target;
            *noise = if p_speech > PROB_RANGE {
                // Only ever move downwards quickly while speech is present.
                let conservative = SPEECH_UPDATE * prev + (1.0 - SPEECH_UPDATE) * target;
                conservative.min(tracked)
            } else {
                tracked
            };
        }
    }

    pub(crate) fn noise_spectrum(&self) -> &[f32] {
        &self.noise_spectrum
    }

    pub(crate) fn prev_noise_spectrum(&self) -> &[f32] {
        &self.prev_noise_spectrum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_noise_when_speech_is_absent() {
        let mut est = NoiseEstimator::new(65);
        let spectrum = vec![40.0f32; 65];
        let no_speech = vec![0.0f32; 65];
        for _ in 0..300 {
            est.pre_update(&spectrum);
            est.post_update(&no_speech, &spectrum);
        }
        for &v in est.noise_spectrum() {
            assert!((v - 40.0).abs() < 10.0, "estimate {v}");
        }
    }

    #[test]
    fn speech_bins_do_not_jump_up() {
        let mut est = NoiseEstimator::new(65);
        let quiet = vec![10.0f32; 65];
        let loud = vec![5000.0f32; 65];
        let no_speech = vec![0.0f32; 65];
        let speech = vec![0.95f32; 65];
        for _ in 0..400 {
            est.pre_update(&quiet);
            est.post_update(&no_speech, &quiet);
        }
        est.pre_update(&loud);
        est.post_update(&speech, &loud);
        assert!(est.noise_spectrum().iter().all(|&v| v < 50.0));
        assert_eq!(est.prev_noise_spectrum().len(), 65);
    }
}
