//! Speech presence probability from the log-likelihood ratio (LRT) feature.

use crate::config::LRT_FEATURE_THRESHOLD;

/// Width of the sigmoid mapping the LRT feature to a speech indicator.
const WIDTH_PRIOR: f32 = 4.0;
/// Wider mapping used in pause regions (feature below its threshold).
const WIDTH_PRIOR_PAUSE: f32 = 2.0 * WIDTH_PRIOR;

#[derive(Debug)]
pub(crate) struct SpeechProbabilityEstimator {
    avg_log_lrt: Vec<f32>,
    lrt: f32,
    prior_speech_prob: f32,
    speech_probability: Vec<f32>,
}

impl SpeechProbabilityEstimator {
    pub(crate) fn new(num_bins: usize) -> Self {
        Self {
            avg_log_lrt: vec![LRT_FEATURE_THRESHOLD; num_bins],
            lrt: LRT_FEATURE_THRESHOLD,
            prior_speech_prob: 0.5,
            speech_probability: vec![0.0; num_bins],
        }
    }

    /// Update from the prior and posterior SNR of the current frame.
    pub(crate) fn update(&mut self, prior_snr: &[f32], post_snr: &[f32]) {
        for ((avg, &prior), &post) in self.avg_log_lrt.iter_mut().zip(prior_snr).zip(post_snr) {
            let tmp1 = 1.0 + 2.0 * prior;
            let tmp2 = 2.0 * prior / (tmp1 + 0.0001);
            let bessel_tmp = (post + 1.0) * tmp2;
            *avg += 0.5 * (bessel_tmp - tmp1.ln() - *avg);
        }
        self.lrt = self.avg_log_lrt.iter().sum::<f32>() / self.avg_log_lrt.len() as f32;

        let width = if self.lrt < LRT_FEATURE_THRESHOLD {
            WIDTH_PRIOR_PAUSE
        } else {
            WIDTH_PRIOR
        };
        let indicator = 0.5 * ((width * (self.lrt - LRT_FEATURE_THRESHOLD)).tanh() + 1.0);

        self.prior_speech_prob += 0.1 * (indicator - self.prior_speech_prob);
        self.prior_speech_prob = self.prior_speech_prob.clamp(0.01, 1.0);

        let gain_prior = (1.0 - self.prior_speech_prob) / (self.prior_speech_prob + 0.0001);
        for (p, &avg) in self.speech_probability.iter_mut().zip(&self.avg_log_lrt) {
            // Clamp the exponent so a very negative LRT cannot overflow.
            let inv_lrt = (-avg).min(80.0).exp();
            *p = 1.0 / (1.0 + gain_prior * inv_lrt);
        }
    }

    /// Frame-level prior speech probability.
    pub(crate) fn prior_probability(&self) -> f32 {
        self.prior_speech_prob
    }

    /// Per-bin speech probability.
    pub(crate) fn probability(&self) -> &[f32] {
        &self.speech_probability
    }
}
