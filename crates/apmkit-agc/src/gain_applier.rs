//! Per-sample gain application with linear ramping.

use apmkit_common_audio::audio_util::MAX_FLOAT_S16_VALUE;

/// True when `gain_factor` would not change any S16 sample.
fn gain_close_to_one(gain_factor: f32) -> bool {
    let threshold = 1.0 / MAX_FLOAT_S16_VALUE;
    (1.0 - threshold..=1.0 + threshold).contains(&gain_factor)
}

/// Applies a gain factor to every channel, ramping linearly from the
/// previous frame's gain to avoid discontinuities.
#[derive(Debug, Clone)]
pub(crate) struct GainApplier {
    last_gain_factor: f32,
    current_gain_factor: f32,
}

impl GainApplier {
    pub(crate) fn new(initial_gain_factor: f32) -> Self {
        Self {
            last_gain_factor: initial_gain_factor,
            current_gain_factor: initial_gain_factor,
        }
    }

    pub(crate) fn set_gain_factor(&mut self, gain_factor: f32) {
        debug_assert!(gain_factor >= 0.0);
        self.current_gain_factor = gain_factor;
    }

    pub(crate) fn apply_gain(&mut self, channels: &mut [Vec<f32>]) {
        let last = self.last_gain_factor;
        let target = self.current_gain_factor;
        self.last_gain_factor = target;

        if last == target {
            if gain_close_to_one(target) {
                return;
            }
            for v in channels.iter_mut().flatten() {
                *v *= target;
            }
            return;
        }

        for channel in channels.iter_mut() {
            let increment = (target - last) / channel.len().max(1) as f32;
            let mut gain = last;
            for v in channel.iter_mut() {
                *v *= gain;
                gain += increment;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unity_gain_leaves_samples_untouched() {
        let mut applier = GainApplier::new(1.0);
        let mut frame = vec![vec![0.1f32, -12345.678, 32767.0]];
        let copy = frame.clone();
        applier.apply_gain(&mut frame);
        assert_eq!(frame, copy);
    }

    #[test]
    fn constant_gain_scales_every_channel() {
        let mut applier = GainApplier::new(2.0);
        let mut frame = vec![vec![10.0f32; 4], vec![-3.0f32; 4]];
        applier.apply_gain(&mut frame);
        assert!(frame[0].iter().all(|&v| v == 20.0));
        assert!(frame[1].iter().all(|&v| v == -6.0));
    }

    #[test]
    fn gain_change_ramps_across_the_frame() {
        let mut applier = GainApplier::new(1.0);
        applier.set_gain_factor(2.0);
        let mut frame = vec![vec![100.0f32; 10]];
        applier.apply_gain(&mut frame);
        assert_eq!(frame[0][0], 100.0);
        for pair in frame[0].windows(2) {
            assert!(pair[1] > pair[0]);
        }
        assert!(frame[0][9] < 200.0);

        let mut next = vec![vec![100.0f32; 10]];
        applier.apply_gain(&mut next);
        assert!(next[0].iter().all(|&v| v == 200.0));
    }
}
