//! Output peak limiter.
//!
//! A peak envelope is computed per sub-frame with instant attack and
//! exponential release. Whenever the envelope rises above the threshold the
//! signal is scaled down by `threshold / envelope`, with the scaling factors
//! interpolated per sample. A final hard clamp keeps every sample inside the
//! S16 range.

use apmkit_common_audio::audio_util::{clamp_to_s16_range, dbfs_to_float_s16};

use crate::common::{LIMITER_THRESHOLD_DBFS, SUB_FRAMES_IN_FRAME};

/// Envelope decay per sub-frame, about 20 ms for the envelope to drop by
/// 1 dB.
const DECAY_FILTER_CONSTANT: f32 = 0.997_125_9;

/// Interpolation power for the first sub-frame of an attack. Front-loads the
/// gain reduction so a sudden peak is not overshot.
const ATTACK_FIRST_SUBFRAME_INTERPOLATION_POWER: f32 = 8.0;

#[derive(derive_more::Debug)]
pub struct Limiter {
    threshold: f32,
    envelope: f32,
    last_scaling_factor: f32,
    scaling_factors: [f32; SUB_FRAMES_IN_FRAME + 1],
    #[debug(skip)]
    per_sample_scaling_factors: Vec<f32>,
}

impl Default for Limiter {
    fn default() -> Self {
        Self::new()
    }
}

impl Limiter {
    pub fn new() -> Self {
        Self {
            threshold: dbfs_to_float_s16(LIMITER_THRESHOLD_DBFS),
            envelope: 0.0,
            last_scaling_factor: 1.0,
            scaling_factors: [1.0; SUB_FRAMES_IN_FRAME + 1],
            per_sample_scaling_factors: Vec::new(),
        }
    }

    /// Limit a multi-channel frame in place. All channels share one gain.
    ///
    /// Frames shorter than [`SUB_FRAMES_IN_FRAME`] samples, or not a multiple
    /// of it, are only hard clamped.
    pub fn process(&mut self, channels: &mut [Vec<f32>]) {
        let samples_per_channel = channels.first().map_or(0, Vec::len);
        if samples_per_channel == 0 || samples_per_channel % SUB_FRAMES_IN_FRAME != 0 {
            for channel in channels.iter_mut() {
                clamp_to_s16_range(channel);
            }
            return;
        }
        let sub_frame_len = samples_per_channel / SUB_FRAMES_IN_FRAME;

        let mut peaks = [0.0f32; SUB_FRAMES_IN_FRAME];
        for channel in channels.iter() {
            for (peak, sub_frame) in peaks.iter_mut().zip(channel.chunks_exact(sub_frame_len)) {
                *peak = sub_frame.iter().fold(*peak, |m, &v| m.max(v.abs()));
            }
        }
        // Rise one sub-frame early so interpolation never lags a peak.
        for i in 0..SUB_FRAMES_IN_FRAME - 1 {
            peaks[i] = peaks[i].max(peaks[i + 1]);
        }

        self.scaling_factors[0] = self.last_scaling_factor;
        for (factor, &peak) in self.scaling_factors[1..].iter_mut().zip(&peaks) {
            self.envelope = if peak > self.envelope {
                peak
            } else {
                self.envelope * DECAY_FILTER_CONSTANT + peak * (1.0 - DECAY_FILTER_CONSTANT)
            };
            *factor = if self.envelope > self.threshold {
                self.threshold / self.envelope
            } else {
                1.0
            };
        }
        self.last_scaling_factor = self.scaling_factors[SUB_FRAMES_IN_FRAME];

        if self.scaling_factors.iter().all(|&f| f == 1.0) {
            for channel in channels.iter_mut() {
                clamp_to_s16_range(channel);
            }
            return;
        }

        self.per_sample_scaling_factors.resize(samples_per_channel, 1.0);
        compute_per_sample_factors(
            &self.scaling_factors,
            sub_frame_len,
            &mut self.per_sample_scaling_factors,
        );
        for channel in channels.iter_mut() {
            for (v, &factor) in channel.iter_mut().zip(&self.per_sample_scaling_factors) {
                *v *= factor;
            }
            clamp_to_s16_range(channel);
        }
    }

    /// Scaling factor at the end of the last frame.
    pub fn last_scaling_factor(&self) -> f32 {
        self.last_scaling_factor
    }
}

fn compute_per_sample_factors(scaling_factors: &[f32], sub_frame_len: usize, out: &mut [f32]) {
    let is_attack = scaling_factors[0] > scaling_factors[1];
    for (i, sub_frame) in out.chunks_exact_mut(sub_frame_len).enumerate() {
        let start = scaling_factors[i];
        let end = scaling_factors[i + 1];
        let n = sub_frame_len as f32;
        if i == 0 && is_attack {
            for (j, v) in sub_frame.iter_mut().enumerate() {
                let t = j as f32 / n;
                let weight = (1.0 - t).powf(ATTACK_FIRST_SUBFRAME_INTERPOLATION_POWER);
                *v = weight * (start - end) + end;
            }
        } else {
            let step = (end - start) / n;
            for (j, v) in sub_frame.iter_mut().enumerate() {
                *v = start + step * j as f32;
            }
        }
    }
}
