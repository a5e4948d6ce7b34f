//! Gain controller configuration.

/// Gain control strategy. Only one runs per session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum GainControlMode {
    /// Recommend a hardware input level. The signal only passes the
    /// limiter.
    #[default]
    AdaptiveAnalog,
    /// Track the speech level and adapt a digital gain toward a target.
    AdaptiveDigital,
    /// Apply a constant digital gain.
    FixedDigital,
}

/// Analog input level recommender settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalogConfig {
    /// Level assumed until the caller reports one.
    pub initial_level: i32,
    /// Lower edge of the target loudness band in dBFS.
    pub target_range_min_dbfs: f32,
    /// Upper edge of the target loudness band in dBFS.
    pub target_range_max_dbfs: f32,
    /// Distance outside the band the envelope must reach before a change.
    pub deadzone_db: f32,
    /// Largest level change for a single recommendation.
    pub max_level_step: i32,
    /// Non-silent frames to observe between two changes.
    pub update_wait_frames: i32,
    /// Absolute FloatS16 peak above which a frame counts as clipped.
    pub clipping_peak: f32,
    /// Level decrease applied after a clipped frame.
    pub clipped_level_step: i32,
    /// Clipping never lowers the level below this value.
    pub clipped_level_min: i32,
}

impl Default for AnalogConfig {
    fn default() -> Self {
        Self {
            initial_level: 128,
            target_range_min_dbfs: -30.0,
            target_range_max_dbfs: -20.0,
            deadzone_db: 2.0,
            max_level_step: 12,
            update_wait_frames: 5,
            clipping_peak: 32000.0,
            clipped_level_step: 15,
            clipped_level_min: 70,
        }
    }
}

/// Adaptive digital gain settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveDigitalConfig {
    /// Speech level the gain aims for, in dBFS.
    pub target_level_dbfs: f32,
    /// Margin kept below the target.
    pub headroom_db: f32,
    pub max_gain_db: f32,
    pub initial_gain_db: f32,
    /// Largest gain decrease per 10 ms frame.
    pub max_gain_decrease_db_per_frame: f32,
    /// Largest gain increase per 10 ms frame.
    pub max_gain_increase_db_per_frame: f32,
    /// Frames below this level leave both the level estimate and the gain
    /// unchanged.
    pub noise_floor_dbfs: f32,
}

impl Default for AdaptiveDigitalConfig {
    fn default() -> Self {
        Self {
            target_level_dbfs: -18.0,
            headroom_db: 0.0,
            max_gain_db: 30.0,
            initial_gain_db: 0.0,
            max_gain_decrease_db_per_frame: 10.0,
            max_gain_increase_db_per_frame: 0.2,
            noise_floor_dbfs: -70.0,
        }
    }
}

/// Full gain controller configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainControllerConfig {
    pub mode: GainControlMode,
    pub analog: AnalogConfig,
    pub adaptive_digital: AdaptiveDigitalConfig,
    /// Gain of [`GainControlMode::FixedDigital`], in `0..=90` dB.
    pub fixed_gain_db: f32,
}

impl Default for GainControllerConfig {
    fn default() -> Self {
        Self {
            mode: GainControlMode::default(),
            analog: AnalogConfig::default(),
            adaptive_digital: AdaptiveDigitalConfig::default(),
            fixed_gain_db: 0.0,
        }
    }
}
