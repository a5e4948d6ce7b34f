//! Smoothed frame level tracking for the adaptive digital controller.

/// Smoothing weight when the frame is louder than the estimate.
const ATTACK_WEIGHT: f32 = 0.5;
/// Smoothing weight when the frame is quieter than the estimate.
const RELEASE_WEIGHT: f32 = 0.05;

/// Tracks the level of non-silent frames in dBFS. Frames below the noise
/// floor leave the estimate unchanged.
#[derive(Debug, Clone)]
pub(crate) struct LevelEstimator {
    noise_floor_dbfs: f32,
    level_dbfs: Option<f32>,
}

impl LevelEstimator {
    pub(crate) fn new(noise_floor_dbfs: f32) -> Self {
        Self {
            noise_floor_dbfs,
            level_dbfs: None,
        }
    }

    /// Feed one frame level. Returns `true` when the estimate was updated.
    pub(crate) fn update(&mut self, frame_level_dbfs: f32) -> bool {
        if frame_level_dbfs < self.noise_floor_dbfs {
            return false;
        }
        self.level_dbfs = Some(match self.level_dbfs {
            None => frame_level_dbfs,
            Some(level) => {
                let weight = if frame_level_dbfs > level {
                    ATTACK_WEIGHT
                } else {
                    RELEASE_WEIGHT
                };
                level + weight * (frame_level_dbfs - level)
            }
        });
        true
    }

    pub(crate) fn level_dbfs(&self) -> Option<f32> {
        self.level_dbfs
    }
}
