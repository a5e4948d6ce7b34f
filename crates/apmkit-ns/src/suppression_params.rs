//! Level-dependent suppression parameters.

use crate::config::SuppressionLevel;

/// Parameters that control how hard a level suppresses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SuppressionParams {
    /// Over-subtraction factor for the noise estimate.
    pub(crate) over_subtraction_factor: f32,
    /// Gain floor of an attenuated bin.
    pub(crate) minimum_attenuating_gain: f32,
}

impl SuppressionParams {
    pub(crate) fn for_level(level: SuppressionLevel) -> Self {
        let (over_subtraction_factor, minimum_attenuating_gain) = match level {
            SuppressionLevel::K6dB => (1.0, 0.5),
            SuppressionLevel::K12dB => (1.0, 0.25),
            SuppressionLevel::K18dB => (1.1, 0.125),
            // 20.9 dB attenuation.
            SuppressionLevel::K21dB => (1.25, 0.09),
        };
        Self {
            over_subtraction_factor,
            minimum_attenuating_gain,
        }
    }
}
