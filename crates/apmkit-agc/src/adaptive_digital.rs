//! Adaptive digital gain.
//!
//! The desired gain brings the estimated speech level to the target minus
//! the headroom. The applied gain moves toward it at most
//! `max_gain_decrease_db_per_frame` down (fast attack) and
//! `max_gain_increase_db_per_frame` up (slow release).

use apmkit_common_audio::audio_util::{db_to_ratio, mean_square, power_to_dbfs};

use crate::config::AdaptiveDigitalConfig;
use crate::gain_applier::GainApplier;
use crate::level_estimator::LevelEstimator;

/// Desired gain in dB for a speech level, limited to `[0, max_gain_db]`.
fn compute_gain_db(level_dbfs: f32, config: &AdaptiveDigitalConfig) -> f32 {
    (config.target_level_dbfs - config.headroom_db - level_dbfs).clamp(0.0, config.max_gain_db)
}

/// Gain change for this frame, bounded by the attack and release rates.
fn compute_gain_change_db(
    target_gain_db: f32,
    last_gain_db: f32,
    config: &AdaptiveDigitalConfig,
) -> f32 {
    (target_gain_db - last_gain_db).clamp(
        -config.max_gain_decrease_db_per_frame,
        config.max_gain_increase_db_per_frame,
    )
}

#[derive(Debug, Clone)]
pub struct AdaptiveDigitalGainController {
    config: AdaptiveDigitalConfig,
    level_estimator: LevelEstimator,
    gain_applier: GainApplier,
    last_gain_db: f32,
}

impl AdaptiveDigitalGainController {
    pub fn new(config: AdaptiveDigitalConfig) -> Self {
        let initial_gain_db = config.initial_gain_db.clamp(0.0, config.max_gain_db);
        Self {
            level_estimator: LevelEstimator::new(config.noise_floor_dbfs),
            gain_applier: GainApplier::new(db_to_ratio(initial_gain_db)),
            last_gain_db: initial_gain_db,
            config,
        }
    }

    /// Update the gain from the frame level and apply it in place.
    pub fn process(&mut self, channels: &mut [Vec<f32>]) {
        let power = channels.iter().map(|c| mean_square(c)).fold(0.0f32, f32::max);
        if self.level_estimator.update(power_to_dbfs(power))
            && let Some(level_dbfs) = self.level_estimator.level_dbfs()
        {
            let target_gain_db = compute_gain_db(level_dbfs, &self.config);
            let gain_change_db =
                compute_gain_change_db(target_gain_db, self.last_gain_db, &self.config);
            let gain_db = self.last_gain_db + gain_change_db;
            if gain_db != self.last_gain_db {
                tracing::trace!(level_dbfs, gain_db, "adaptive digital gain update");
                self.last_gain_db = gain_db;
                self.gain_applier.set_gain_factor(db_to_ratio(gain_db));
            }
        }
        self.gain_applier.apply_gain(channels);
    }

    /// Gain applied at the end of the last frame, in dB.
    pub fn gain_db(&self) -> f32 {
        self.last_gain_db
    }

    pub fn speech_level_dbfs(&self) -> Option<f32> {
        self.level_estimator.level_dbfs()
    }
}
