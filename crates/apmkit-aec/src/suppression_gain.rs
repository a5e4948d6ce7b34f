//! Residual echo suppression in the STFT domain.
//!
//! The linear echo estimate is tracked per bin with a decaying peak hold.
//! Dividing it by the current ERLE gives the echo the linear filter left
//! behind, and each residual bin is attenuated by the share of its power that
//! estimate explains.

use apmkit_common_audio::audio_util::clamp_to_s16_range;
use apmkit_common_audio::delay_line::DelayLine;
use apmkit_fft::stft::Stft;

/// Per-frame decay of the echo power peak hold.
const ECHO_POWER_DECAY: f32 = 0.8;

#[derive(Debug)]
pub(crate) struct ResidualEchoSuppressor {
    residual_stft: Stft,
    echo_stft: Stft,
    echo_power: Vec<f32>,
    gains: Vec<f32>,
    upper_band_delays: Vec<DelayLine>,
    floor: f32,
    over_suppression: f32,
}

impl ResidualEchoSuppressor {
    pub(crate) fn new(
        band_length: usize,
        num_bands: usize,
        floor: f32,
        over_suppression: f32,
    ) -> Self {
        let residual_stft = Stft::for_frame_size(band_length);
        let num_bins = residual_stft.num_bins();
        let upper_band_delays = (1..num_bands.max(1))
            .map(|_| DelayLine::new(residual_stft.overlap()))
            .collect();
        Self {
            echo_stft: Stft::for_frame_size(band_length),
            residual_stft,
            echo_power: vec![0.0; num_bins],
            gains: vec![1.0; num_bins],
            upper_band_delays,
            floor: floor.clamp(0.0, 1.0),
            over_suppression,
        }
    }

    /// Suppress the residual echo in `bands` in place. `echo` is the linear
    /// echo estimate of band 0.
    pub(crate) fn process(&mut self, echo: &[f32], bands: &mut [Vec<f32>], erle_linear: f32) {
        let Some((low, upper)) = bands.split_first_mut() else {
            return;
        };

        for (power, bin) in self.echo_power.iter_mut().zip(self.echo_stft.analyze(echo)) {
            *power = bin.norm_sqr().max(ECHO_POWER_DECAY * *power);
        }

        let erle = erle_linear.max(1.0);
        for ((gain, bin), &echo_power) in self
            .gains
            .iter_mut()
            .zip(self.residual_stft.analyze(low))
            .zip(&self.echo_power)
        {
            let residual_power = bin.norm_sqr();
            *gain = if residual_power <= 1.0 {
                1.0
            } else {
                let residual_echo = echo_power / erle;
                let gain = 1.0 - self.over_suppression * residual_echo / residual_power;
                gain.clamp(self.floor, 1.0)
            };
        }
        self.residual_stft.synthesize(&self.gains, low);
        clamp_to_s16_range(low);

        let upper_gain = self.upper_band_gain();
        for (band, delay) in upper.iter_mut().zip(&mut self.upper_band_delays) {
            delay.process(band);
            for v in band.iter_mut() {
                *v *= upper_gain;
            }
            clamp_to_s16_range(band);
        }
    }

    /// Mean of the low-band gains.
    pub(crate) fn upper_band_gain(&self) -> f32 {
        self.gains.iter().sum::<f32>() / self.gains.len().max(1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_echo_estimate_is_transparent() {
        let mut suppressor = ResidualEchoSuppressor::new(160, 2, 0.1, 1.0);
        let delay = suppressor.residual_stft.overlap();
        let signal: Vec<f32> = (0..1600).map(|i| (i as f32 * 0.05).sin() * 1000.0).collect();
        let mut output = Vec::new();
        for chunk in signal.chunks(160) {
            let mut bands = vec![chunk.to_vec(), chunk.to_vec()];
            suppressor.process(&[0.0; 160], &mut bands, 1.0);
            output.extend_from_slice(&bands[0]);
            assert_eq!(suppressor.upper_band_gain(), 1.0);
        }
        for i in 400..1600 {
            assert!((output[i] - signal[i - delay]).abs() < 0.1, "sample {i}");
        }
    }

    #[test]
    fn pure_echo_is_attenuated_to_the_floor() {
        let mut suppressor = ResidualEchoSuppressor::new(160, 1, 0.1, 1.0);
        let mut input_energy = 0.0;
        let mut output_energy = 0.0;
        for k in 0..20 {
            let frame: Vec<f32> = (0..160)
                .map(|i| ((k * 160 + i) as f32 * 0.3).sin() * 1000.0)
                .collect();
            let mut bands = vec![frame.clone()];
            suppressor.process(&frame, &mut bands, 1.0);
            if k >= 5 {
                input_energy += frame.iter().map(|v| v * v).sum::<f32>();
                output_energy += bands[0].iter().map(|v| v * v).sum::<f32>();
            }
        }
        assert!(output_energy < 0.05 * input_energy);
        assert!(suppressor.upper_band_gain() < 0.5);
    }

    #[test]
    fn silence_stays_silent() {
        let mut suppressor = ResidualEchoSuppressor::new(80, 1, 0.1, 1.0);
        for _ in 0..10 {
            let mut bands = vec![vec![0.0f32; 80]];
            suppressor.process(&[0.0; 80], &mut bands, 1.0);
            assert!(bands[0].iter().all(|&v| v == 0.0));
        }
    }
}
