//! Echo canceller tuning.

/// Echo canceller settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EchoCancellerConfig {
    /// Echo tail covered by the adaptive filter, in 10 ms frames.
    pub filter_length_frames: usize,
    /// Largest render-to-capture delay that can be compensated.
    pub max_delay_ms: i32,
    /// NLMS step size in `(0, 1]`.
    pub step_size: f32,
    /// Frames between two delay estimates.
    pub delay_estimation_interval_frames: usize,
    /// Normalized correlation required to trust a delay estimate.
    pub delay_correlation_threshold: f32,
    /// Run the STFT residual echo suppressor after the linear filter.
    pub residual_suppression: bool,
    /// Lowest gain of the residual echo suppressor.
    pub suppression_floor: f32,
    /// Weight of the residual echo estimate in the suppression gain.
    pub over_suppression: f32,
}

impl Default for EchoCancellerConfig {
    fn default() -> Self {
        Self {
            filter_length_frames: 3,
            max_delay_ms: 500,
            step_size: 0.5,
            delay_estimation_interval_frames: 25,
            delay_correlation_threshold: 0.3,
            residual_suppression: true,
            suppression_floor: 0.1,
            over_suppression: 1.0,
        }
    }
}

impl EchoCancellerConfig {
    /// Most frames the render can be aligned back by.
    pub fn max_alignment_frames(&self) -> usize {
        usize::try_from(self.max_delay_ms / 10).unwrap_or(0)
    }
}
