//! Noise suppression configuration and shared constants.

/// Frames analyzed before the quantile trackers hand over to their regular
/// update cycle.
pub const LONG_STARTUP_PHASE_BLOCKS: i32 = 200;

/// Threshold on the averaged log-likelihood ratio separating speech from
/// noise in the prior speech model.
pub const LRT_FEATURE_THRESHOLD: f32 = 0.5;

/// Target suppression level for the noise suppressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuppressionLevel {
    /// 6 dB suppression.
    K6dB,
    /// 12 dB suppression (default).
    #[default]
    K12dB,
    /// 18 dB suppression.
    K18dB,
    /// 21 dB suppression.
    K21dB,
}

/// Configuration for the noise suppressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NsConfig {
    /// Target suppression level.
    pub target_level: SuppressionLevel,
    /// Samples per band per frame: 80 at 8 kHz, 160 otherwise.
    pub frame_size: usize,
    /// Bands per frame, including band 0.
    pub num_bands: usize,
}

impl Default for NsConfig {
    fn default() -> Self {
        Self {
            target_level: SuppressionLevel::K12dB,
            frame_size: 160,
            num_bands: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = NsConfig::default();
        assert_eq!(config.target_level, SuppressionLevel::K12dB);
        assert_eq!(config.frame_size, 160);
        assert_eq!(config.num_bands, 1);
    }
}
