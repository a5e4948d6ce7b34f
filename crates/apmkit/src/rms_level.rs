//! Output level meter in the RFC 6465 audio-level style.
//!
//! Levels are reported as a positive number of dB below full scale (dBov)
//! in `0..=127`, where 127 means digital silence.

use apmkit_common_audio::audio_util::MAX_ABS_FLOAT_S16_VALUE;

/// Level reported for digital silence.
pub(crate) const MIN_LEVEL_DB: i32 = 127;
/// Lowest level that is still reported as audible.
pub(crate) const INAUDIBLE_BUT_NOT_MUTED: i32 = 126;

fn level_from_mean_square(mean_square: f32) -> i32 {
    let full_scale = MAX_ABS_FLOAT_S16_VALUE * MAX_ABS_FLOAT_S16_VALUE;
    let db = -10.0 * (mean_square / full_scale).log10();
    // Non-zero input never reports silence.
    (db.round() as i32).clamp(0, INAUDIBLE_BUT_NOT_MUTED)
}

/// Accumulates FloatS16 samples until [`average`](Self::average) is read.
#[derive(Debug, Clone, Default)]
pub(crate) struct RmsLevel {
    sum_square: f64,
    sample_count: usize,
}

impl RmsLevel {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn analyze(&mut self, data: &[f32]) {
        self.sum_square += data.iter().map(|&v| f64::from(v) * f64::from(v)).sum::<f64>();
        self.sample_count += data.len();
    }

    /// Level of everything analyzed since the last call, and reset.
    pub(crate) fn average(&mut self) -> i32 {
        let level = if self.sample_count == 0 || self.sum_square == 0.0 {
            MIN_LEVEL_DB
        } else {
            level_from_mean_square((self.sum_square / self.sample_count as f64) as f32)
        };
        *self = Self::default();
        level
    }
}
