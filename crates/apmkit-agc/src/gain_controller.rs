//! Mode dispatch for the gain control stage.

use apmkit_common_audio::audio_util::db_to_ratio;

use crate::adaptive_digital::AdaptiveDigitalGainController;
use crate::analog::AnalogLevelController;
use crate::config::{GainControlMode, GainControllerConfig};
use crate::gain_applier::GainApplier;
use crate::limiter::Limiter;

/// Highest accepted fixed digital gain.
pub const MAX_FIXED_GAIN_DB: f32 = 90.0;

#[derive(Debug)]
enum Mode {
    AdaptiveAnalog,
    AdaptiveDigital(AdaptiveDigitalGainController),
    FixedDigital { gain_db: f32, applier: GainApplier },
}

/// Gain controller for one capture stream.
///
/// The analog level recommender runs in every mode so the level reported by
/// the caller is always tracked, but it only adapts in
/// [`GainControlMode::AdaptiveAnalog`]. The limiter runs last in every mode.
#[derive(Debug)]
pub struct GainController {
    config: GainControllerConfig,
    mode: Mode,
    analog: AnalogLevelController,
    limiter: Limiter,
}

impl GainController {
    pub fn new(config: GainControllerConfig) -> Self {
        let mode = match config.mode {
            GainControlMode::AdaptiveAnalog => Mode::AdaptiveAnalog,
            GainControlMode::AdaptiveDigital => {
                Mode::AdaptiveDigital(AdaptiveDigitalGainController::new(config.adaptive_digital))
            }
            GainControlMode::FixedDigital => {
                let gain_db = config.fixed_gain_db.clamp(0.0, MAX_FIXED_GAIN_DB);
                Mode::FixedDigital {
                    gain_db,
                    applier: GainApplier::new(db_to_ratio(gain_db)),
                }
            }
        };
        tracing::debug!(mode = ?config.mode, "gain controller created");
        Self {
            config,
            mode,
            analog: AnalogLevelController::new(config.analog),
            limiter: Limiter::new(),
        }
    }

    pub fn config(&self) -> &GainControllerConfig {
        &self.config
    }

    pub fn mode(&self) -> GainControlMode {
        self.config.mode
    }

    /// Process one full-band multi-channel frame in place.
    pub fn process(&mut self, channels: &mut [Vec<f32>]) {
        match &mut self.mode {
            Mode::AdaptiveAnalog => self.analog.analyze(channels),
            Mode::AdaptiveDigital(controller) => controller.process(channels),
            Mode::FixedDigital { applier, .. } => applier.apply_gain(channels),
        }
        self.limiter.process(channels);
    }

    /// Record the analog level applied by the caller, already validated.
    pub fn set_applied_analog_level(&mut self, level: i32) {
        self.analog.set_applied_level(level);
    }

    pub fn recommended_analog_level(&self) -> i32 {
        self.analog.recommended_level()
    }

    /// Digital gain currently applied, in dB, excluding the limiter.
    pub fn applied_gain_db(&self) -> f32 {
        match &self.mode {
            Mode::AdaptiveAnalog => 0.0,
            Mode::AdaptiveDigital(controller) => controller.gain_db(),
            Mode::FixedDigital { gain_db, .. } => *gain_db,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(value: f32) -> Vec<Vec<f32>> {
        vec![vec![value; 160]; 2]
    }

    #[test]
    fn analog_mode_leaves_signal_below_threshold_untouched() {
        let mut gc = GainController::new(GainControllerConfig::default());
        let mut f = frame(100.0);
        gc.process(&mut f);
        assert_eq!(f, frame(100.0));
        assert_eq!(gc.applied_gain_db(), 0.0);
    }

    #[test]
    fn analog_mode_still_limits_peaks() {
        let mut gc = GainController::new(GainControllerConfig::default());
        let mut f = frame(32_000.0);
        gc.process(&mut f);
        assert!(f.iter().flatten().all(|&v| v <= 32_000.0));
        assert!(f[0][159] < 29_300.0, "{}", f[0][159]);
        assert_eq!(f[0], f[1]);
    }

    #[test]
    fn fixed_gain_is_applied_and_limited() {
        let mut gc = GainController::new(GainControllerConfig {
            mode: GainControlMode::FixedDigital,
            fixed_gain_db: 20.0,
            ..Default::default()
        });
        let mut f = frame(100.0);
        gc.process(&mut f);
        assert!(f.iter().flatten().all(|&v| (v - 1000.0).abs() < 0.1));

        let mut loud = frame(20_000.0);
        gc.process(&mut loud);
        assert!(loud.iter().flatten().all(|v| (-32768.0..=32767.0).contains(v)));
        assert!(loud[0][159] < 29_300.0, "{}", loud[0][159]);
        assert_eq!(gc.applied_gain_db(), 20.0);
    }

    #[test]
    fn fixed_gain_is_clamped_to_range() {
        let gc = GainController::new(GainControllerConfig {
            mode: GainControlMode::FixedDigital,
            fixed_gain_db: 200.0,
            ..Default::default()
        });
        assert_eq!(gc.applied_gain_db(), MAX_FIXED_GAIN_DB);
    }

    #[test]
    fn analog_level_is_tracked_in_digital_modes() {
        let mut gc = GainController::new(GainControllerConfig {
            mode: GainControlMode::AdaptiveDigital,
            ..Default::default()
        });
        gc.set_applied_analog_level(77);
        for _ in 0..20 {
            gc.process(&mut frame(100.0));
        }
        assert_eq!(gc.recommended_analog_level(), 77);
    }

    #[test]
    fn silence_stays_silent_in_every_mode() {
        for mode in [
            GainControlMode::AdaptiveAnalog,
            GainControlMode::AdaptiveDigital,
            GainControlMode::FixedDigital,
        ] {
            let mut gc = GainController::new(GainControllerConfig {
                mode,
                fixed_gain_db: 30.0,
                ..Default::default()
            });
            for _ in 0..10 {
                let mut f = frame(0.0);
                gc.process(&mut f);
                assert!(f.iter().flatten().all(|&v| v == 0.0));
            }
        }
    }
}
