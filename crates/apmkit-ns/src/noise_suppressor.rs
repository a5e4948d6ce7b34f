//! Top-level noise suppressor for one channel.

use apmkit_common_audio::audio_util::{MIN_DBFS, clamp_to_s16_range, power_to_dbfs};
use apmkit_common_audio::delay_line::DelayLine;
use apmkit_fft::stft::{Stft, hybrid_window};

use crate::config::NsConfig;
use crate::noise_estimator::NoiseEstimator;
use crate::speech_probability_estimator::SpeechProbabilityEstimator;
use crate::suppression_params::SuppressionParams;
use crate::wiener_filter::WienerFilter;

/// Single-channel noise suppressor operating on split-band FloatS16 frames.
///
/// Band 0 is filtered in the frequency domain. Upper bands are delayed by
/// the STFT overlap and scaled by one broadband gain.
///
/// # Example
///
/// ```
/// use apmkit_ns::{NoiseSuppressor, NsConfig};
///
/// let mut ns = NoiseSuppressor::new(NsConfig::default());
/// let mut bands = vec![vec![0.0f32; 160]];
/// ns.process(&mut bands);
/// assert!(bands[0].iter().all(|&v| v == 0.0));
/// ```
#[derive(Debug)]
pub struct NoiseSuppressor {
    config: NsConfig,
    num_analyzed_frames: i32,
    stft: Stft,
    noise_estimator: NoiseEstimator,
    speech_probability_estimator: SpeechProbabilityEstimator,
    wiener_filter: WienerFilter,
    upper_band_delays: Vec<DelayLine>,
    upper_band_gain: f32,
    signal_spectrum: Vec<f32>,
    prior_snr: Vec<f32>,
    post_snr: Vec<f32>,
    window_power: f32,
}

impl NoiseSuppressor {
    pub fn new(config: NsConfig) -> Self {
        let stft = Stft::for_frame_size(config.frame_size);
        let num_bins = stft.num_bins();
        let window_power = hybrid_window(stft.frame_size(), stft.fft_size())
            .iter()
            .map(|w| w * w)
            .sum();
        let upper_band_delays = (1..config.num_bands.max(1))
            .map(|_| DelayLine::new(stft.overlap()))
            .collect();
        tracing::debug!(
            level = ?config.target_level,
            frame_size = config.frame_size,
            num_bands = config.num_bands,
            "noise suppressor created"
        );
        Self {
            config,
            num_analyzed_frames: -1,
            noise_estimator: NoiseEstimator::new(num_bins),
            speech_probability_estimator: SpeechProbabilityEstimator::new(num_bins),
            wiener_filter: WienerFilter::new(
                SuppressionParams::for_level(config.target_level),
                num_bins,
            ),
            upper_band_delays,
            upper_band_gain: 1.0,
            signal_spectrum: vec![0.0; num_bins],
            prior_snr: vec![0.0; num_bins],
            post_snr: vec![0.0; num_bins],
            window_power,
            stft,
        }
    }

    pub fn config(&self) -> NsConfig {
        self.config
    }

    /// Suppress noise in one frame, in place.
    ///
    /// `bands[0]` holds the low band; any further entries are upper bands of
    /// the same length.
    ///
    /// # Panics
    ///
    /// Panics if the band count or band length differs from the config.
    pub fn process(&mut self, bands: &mut [Vec<f32>]) {
        assert_eq!(
            bands.len(),
            self.config.num_bands.max(1),
            "band count mismatch"
        );
        let Some((low, upper)) = bands.split_first_mut() else {
            return;
        };

        let mut frame_energy = 0.0f32;
        for (magnitude, bin) in self.signal_spectrum.iter_mut().zip(self.stft.analyze(low)) {
            let power = bin.norm_sqr();
            frame_energy += power;
            // The unit offset keeps the log-domain trackers finite.
            *magnitude = power.sqrt() + 1.0;
        }

        // Analysis is skipped on digital silence so the estimates survive it.
        if frame_energy > 0.0 {
            self.num_analyzed_frames = self.num_analyzed_frames.saturating_add(1);
            self.analyze();
        }

        self.stft.synthesize(self.wiener_filter.filter(), low);
        clamp_to_s16_range(low);

        if !upper.is_empty() {
            self.upper_band_gain = self.compute_upper_bands_gain();
            for (band, delay) in upper.iter_mut().zip(&mut self.upper_band_delays) {
                delay.process(band);
                for v in band.iter_mut() {
                    *v *= self.upper_band_gain;
                }
                clamp_to_s16_range(band);
            }
        }
    }

    fn analyze(&mut self) {
        self.noise_estimator.pre_update(&self.signal_spectrum);
        self.wiener_filter.compute_snr(
            &self.signal_spectrum,
            self.noise_estimator.noise_spectrum(),
            self.noise_estimator.prev_noise_spectrum(),
            &mut self.prior_snr,
            &mut self.post_snr,
        );
        self.speech_probability_estimator
            .update(&self.prior_snr, &self.post_snr);
        self.noise_estimator.post_update(
            self.speech_probability_estimator.probability(),
            &self.signal_spectrum,
        );
        self.wiener_filter.update(
            self.noise_estimator.noise_spectrum(),
            self.noise_estimator.prev_noise_spectrum(),
            &self.signal_spectrum,
        );
    }

    /// Gain for the upper bands: the mean of the top half of the low-band
    /// filter, which is closest in frequency.
    fn compute_upper_bands_gain(&self) -> f32 {
        let filter = self.wiener_filter.filter();
        let top = &filter[filter.len() / 2..];
        let mean = top.iter().sum::<f32>() / top.len() as f32;
        mean.clamp(self.wiener_filter.min_gain(), 1.0)
    }

    /// Frame-level speech probability in `[0, 1]`.
    pub fn speech_probability(&self) -> f32 {
        self.speech_probability_estimator.prior_probability()
    }

    /// Level of the current noise floor estimate in dBFS.
    pub fn noise_estimate_dbfs(&self) -> f32 {
        if self.num_analyzed_frames < 0 {
            return MIN_DBFS;
        }
        let spectral_power: f32 = self
            .noise_estimator
            .noise_spectrum()
            .iter()
            .map(|&m| {
                let m = (m - 1.0).max(0.0);
                m * m
            })
            .sum();
        let fft_size = self.stft.fft_size() as f32;
        power_to_dbfs(2.0 * spectral_power / (fft_size * self.window_power))
    }

    /// Gain most recently applied to the upper bands.
    pub fn upper_band_gain(&self) -> f32 {
        self.upper_band_gain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SuppressionLevel;

    fn noise_frame(index: usize, frame_size: usize) -> Vec<f32> {
        (0..frame_size)
            .map(|j| {
                let t = (index * frame_size + j) as f32;
                (t * 0.073).sin() * 100.0 + (t * 0.137).sin() * 50.0 + (t * 0.291).sin() * 25.0
            })
            .collect()
    }

    fn config(level: SuppressionLevel, frame_size: usize, num_bands: usize) -> NsConfig {
        NsConfig {
            target_level: level,
            frame_size,
            num_bands,
        }
    }

    #[test]
    fn silence_in_silence_out() {
        let mut ns = NoiseSuppressor::new(config(SuppressionLevel::K21dB, 160, 3));
        for _ in 0..20 {
            let mut bands = vec![vec![0.0f32; 160]; 3];
            ns.process(&mut bands);
            assert!(bands.iter().flatten().all(|&v| v == 0.0));
        }
        assert_eq!(ns.num_analyzed_frames, -1);
        assert_eq!(ns.noise_estimate_dbfs(), MIN_DBFS);
    }

    #[test]
    fn stationary_noise_is_attenuated() {
        for frame_size in [80, 160] {
            let mut ns = NoiseSuppressor::new(config(SuppressionLevel::K21dB, frame_size, 1));
            let mut input_energy = 0.0f32;
            let mut output_energy = 0.0f32;
            for i in 0..500 {
                let mut bands = vec![noise_frame(i, frame_size)];
                if i >= 300 {
                    input_energy += bands[0].iter().map(|v| v * v).sum::<f32>();
                }
                ns.process(&mut bands);
                if i >= 300 {
                    output_energy += bands[0].iter().map(|v| v * v).sum::<f32>();
                }
            }
            let ratio = output_energy / input_energy;
            assert!(ratio < 0.5, "frame size {frame_size}: energy ratio {ratio}");
        }
    }

    #[test]
    fn gains_respect_level_floor() {
        let mut ns = NoiseSuppressor::new(config(SuppressionLevel::K6dB, 160, 2));
        for i in 0..200 {
            let mut bands = vec![noise_frame(i, 160), noise_frame(i + 7, 160)];
            ns.process(&mut bands);
            assert!(ns.wiener_filter.filter().iter().all(|&g| (0.5..=1.0).contains(&g)));
            assert!((0.5..=1.0).contains(&ns.upper_band_gain()));
        }
    }

    #[test]
    fn upper_bands_are_delayed_by_the_overlap() {
        let mut ns = NoiseSuppressor::new(config(SuppressionLevel::K12dB, 160, 2));
        let delay = ns.stft.overlap();
        let mut impulse = vec![0.0f32; 160];
        impulse[10] = 1000.0;
        let mut bands = vec![vec![0.0f32; 160], impulse];
        ns.process(&mut bands);
        let gain = ns.upper_band_gain();
        let expected_index = 10 + delay;
        assert!(expected_index < 160);
        for (i, &v) in bands[1].iter().enumerate() {
            if i == expected_index {
                assert!((v - 1000.0 * gain).abs() < 1e-3);
            } else {
                assert_eq!(v, 0.0);
            }
        }
    }

    #[test]
    fn output_stays_in_s16_range() {
        let mut ns = NoiseSuppressor::new(NsConfig::default());
        for i in 0..100 {
            let mut bands = vec![
                (0..160)
                    .map(|j| ((i * 160 + j) as f32 * 0.1).sin() * 40_000.0)
                    .collect::<Vec<f32>>(),
            ];
            ns.process(&mut bands);
            assert!(bands[0].iter().all(|v| (-32768.0..=32767.0).contains(v)));
        }
    }

    #[test]
    fn noise_estimate_tracks_input_level() {
        let mut ns = NoiseSuppressor::new(NsConfig::default());
        for i in 0..400 {
            let mut bands = vec![noise_frame(i, 160)];
            ns.process(&mut bands);
        }
        // The three tones carry about 41 dB SPL relative to one S16 step.
        let level = ns.noise_estimate_dbfs();
        assert!(
            level > -70.0 && level < -40.0,
            "noise estimate {level} dBFS"
        );
        assert!((0.0..=1.0).contains(&ns.speech_probability()));
    }
}
