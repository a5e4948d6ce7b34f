//! Analog input level recommendation.
//!
//! The controller never touches the device. It observes the capture
//! envelope and advises a level in `0..=255` that the caller applies to the
//! hardware and reports back through [`AnalogLevelController::set_applied_level`].
//! Every recommendation is relative to the last reported level, so a caller
//! that never reports back keeps receiving the same adjustment.

use apmkit_common_audio::audio_util::{mean_square, peak_abs, power_to_dbfs};

use crate::common::{MAX_ANALOG_LEVEL, MIN_ANALOG_LEVEL, SILENCE_THRESHOLD_DBFS};
use crate::config::AnalogConfig;

#[derive(Debug, Clone)]
pub struct AnalogLevelController {
    config: AnalogConfig,
    applied_level: i32,
    recommended_level: i32,
    /// Frames observed since the last level change.
    frames_since_change: i32,
    /// Mean-square accumulator of the current observation window.
    window_power: f32,
    window_frames: i32,
    envelope_dbfs: Option<f32>,
}

impl AnalogLevelController {
    pub fn new(config: AnalogConfig) -> Self {
        let level = config.initial_level.clamp(MIN_ANALOG_LEVEL, MAX_ANALOG_LEVEL);
        Self {
            config,
            applied_level: level,
            recommended_level: level,
            frames_since_change: 0,
            window_power: 0.0,
            window_frames: 0,
            envelope_dbfs: None,
        }
    }

    /// Record the level the caller actually applied to the device.
    ///
    /// The value must already be validated to lie in `0..=255`.
    pub fn set_applied_level(&mut self, level: i32) {
        debug_assert!((MIN_ANALOG_LEVEL..=MAX_ANALOG_LEVEL).contains(&level));
        if level != self.applied_level {
            self.applied_level = level;
            self.start_new_window();
        }
        self.recommended_level = level;
    }

    /// Observe one processed capture frame and update the recommendation.
    pub fn analyze(&mut self, channels: &[Vec<f32>]) {
        // Level zero means the user muted the device.
        if self.applied_level == 0 {
            return;
        }
        self.frames_since_change = self.frames_since_change.saturating_add(1);

        let peak = channels.iter().map(|c| peak_abs(c)).fold(0.0f32, f32::max);
        if peak > self.config.clipping_peak
            && self.frames_since_change >= self.config.update_wait_frames
        {
            let floor = self.config.clipped_level_min.min(self.applied_level);
            let level = (self.applied_level - self.config.clipped_level_step).max(floor);
            if level != self.applied_level {
                tracing::debug!(
                    from = self.applied_level,
                    to = level,
                    "clipping, lowering analog level"
                );
                self.recommend(level);
                return;
            }
        }

        let power = channels.iter().map(|c| mean_square(c)).fold(0.0f32, f32::max);
        if power_to_dbfs(power) < SILENCE_THRESHOLD_DBFS {
            return;
        }
        self.window_power += power;
        self.window_frames += 1;
        if self.window_frames < self.config.update_wait_frames.max(1) {
            return;
        }

        let envelope = power_to_dbfs(self.window_power / self.window_frames as f32);
        self.envelope_dbfs = Some(envelope);
        self.window_power = 0.0;
        self.window_frames = 0;

        let step = self.level_step(envelope);
        if step != 0 {
            let level = (self.applied_level + step).clamp(MIN_ANALOG_LEVEL, MAX_ANALOG_LEVEL);
            if level != self.recommended_level {
                tracing::trace!(
                    envelope,
                    from = self.applied_level,
                    to = level,
                    "analog level change"
                );
                self.recommend(level);
            }
        }
    }

    /// Signed level change for the given envelope, zero inside the target
    /// band widened by the deadzone.
    fn level_step(&self, envelope_dbfs: f32) -> i32 {
        let AnalogConfig {
            target_range_min_dbfs: min,
            target_range_max_dbfs: max,
            deadzone_db,
            max_level_step,
            ..
        } = self.config;
        let max_step = max_level_step.max(1);
        if envelope_dbfs < min - deadzone_db {
            ((min - envelope_dbfs).round() as i32).clamp(1, max_step)
        } else if envelope_dbfs > max + deadzone_db {
            -((envelope_dbfs - max).round() as i32).clamp(1, max_step)
        } else {
            0
        }
    }

    fn recommend(&mut self, level: i32) {
        self.recommended_level = level;
        self.start_new_window();
    }

    fn start_new_window(&mut self) {
        self.frames_since_change = 0;
        self.window_power = 0.0;
        self.window_frames = 0;
    }

    pub fn recommended_level(&self) -> i32 {
        self.recommended_level
    }

    pub fn applied_level(&self) -> i32 {
        self.applied_level
    }

    /// Envelope of the last completed observation window.
    pub fn envelope_dbfs(&self) -> Option<f32> {
        self.envelope_dbfs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apmkit_common_audio::audio_util::db_to_ratio;
    use proptest::prelude::*;
    use test_strategy::proptest;

    fn flat(value: f32) -> Vec<Vec<f32>> {
        vec![vec![value; 160]]
    }

    #[test]
    fn quiet_input_raises_the_level() {
        let mut agc = AnalogLevelController::new(AnalogConfig::default());
        let mut previous = agc.recommended_level();
        for _ in 0..50 {
            let level = agc.recommended_level();
            agc.set_applied_level(level);
            agc.analyze(&flat(100.0));
            assert!(agc.recommended_level() >= previous);
            previous = agc.recommended_level();
        }
        assert!(agc.recommended_level() > 128);
        assert!(agc.recommended_level() <= 255);
    }

    #[test]
    fn loud_input_lowers_the_level() {
        let mut agc = AnalogLevelController::new(AnalogConfig::default());
        for _ in 0..20 {
            let level = agc.recommended_level();
            agc.set_applied_level(level);
            agc.analyze(&flat(10_000.0));
        }
        assert!(agc.recommended_level() < 128);
    }

    #[test]
    fn settles_inside_target_band_in_closed_loop() {
        // Each level step is worth half a decibel at the microphone.
        let mut agc = AnalogLevelController::new(AnalogConfig::default());
        let mut history = Vec::new();
        for _ in 0..200 {
            let level = agc.recommended_level();
            agc.set_applied_level(level);
            let amplitude = 100.0 * db_to_ratio(0.5 * (level - 128) as f32);
            agc.analyze(&flat(amplitude));
            history.push(agc.recommended_level());
        }
        let tail = &history[150..];
        assert!(tail.iter().all(|&l| l == tail[0]), "level still hunting: {tail:?}");
        let envelope = agc.envelope_dbfs().unwrap_or(f32::NAN);
        assert!((-32.0..=-18.0).contains(&envelope), "envelope {envelope}");
    }

    #[test]
    fn stale_baseline_repeats_the_same_recommendation() {
        let mut agc = AnalogLevelController::new(AnalogConfig::default());
        for _ in 0..30 {
            agc.analyze(&flat(100.0));
        }
        assert_eq!(agc.applied_level(), 128);
        assert_eq!(agc.recommended_level(), 140);
    }

    #[test]
    fn silence_is_ignored() {
        let mut agc = AnalogLevelController::new(AnalogConfig::default());
        for _ in 0..100 {
            agc.analyze(&flat(0.0));
        }
        assert_eq!(agc.recommended_level(), 128);
        assert_eq!(agc.envelope_dbfs(), None);
    }

    #[test]
    fn clipping_lowers_the_level_quickly() {
        let mut agc = AnalogLevelController::new(AnalogConfig::default());
        for _ in 0..5 {
            agc.analyze(&flat(32767.0));
        }
        assert_eq!(agc.recommended_level(), 113);
    }

    #[test]
    fn muted_device_is_left_alone() {
        let mut agc = AnalogLevelController::new(AnalogConfig::default());
        agc.set_applied_level(0);
        for _ in 0..50 {
            agc.analyze(&flat(100.0));
        }
        assert_eq!(agc.recommended_level(), 0);
    }

    #[proptest]
    fn recommendation_stays_in_range(
        #[strategy(prop::collection::vec((0.0f32..40_000.0, 0i32..=255, any::<bool>()), 1..120))]
        steps: Vec<(f32, i32, bool)>,
    ) {
        let mut agc = AnalogLevelController::new(AnalogConfig::default());
        for (amplitude, level, report) in steps {
            if report {
                agc.set_applied_level(level);
            }
            agc.analyze(&flat(amplitude));
            prop_assert!((0..=255).contains(&agc.recommended_level()));
        }
    }
}
