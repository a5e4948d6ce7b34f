//! Per-frame processing statistics.

/// Snapshot of the pipeline's state after the last capture frame.
///
/// Fields are `None` when the stage producing them is disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProcessingStatistics {
    /// Same value as [`AudioProcessing::stream_has_echo`](crate::AudioProcessing::stream_has_echo).
    pub echo_detected: bool,
    /// Likelihood in `[0, 1]` that echo is still audible in the output.
    ///
    /// Comes from the residual echo detector when it runs, otherwise from
    /// the echo canceller.
    pub residual_echo_likelihood: Option<f32>,
    /// Maximum residual echo likelihood over the last 10 s.
    pub residual_echo_likelihood_recent_max: Option<f32>,
    /// Output level in dBFS, from 0 down to -127 for digital silence.
    pub output_rms_dbfs: Option<f32>,
    /// Estimated stationary noise floor of the capture signal.
    pub noise_estimate_dbfs: Option<f32>,
    /// Digital gain applied by the gain controller, limiter excluded.
    pub applied_digital_gain_db: Option<f32>,
    pub voice_detected: Option<bool>,
    pub speech_probability: Option<f32>,
    /// Echo return loss: capture energy below render energy.
    pub echo_return_loss_db: Option<f32>,
    /// Echo return loss enhancement: residual energy below capture energy.
    pub echo_return_loss_enhancement_db: Option<f32>,
    /// Render-to-capture delay used by the echo canceller.
    pub delay_ms: Option<i32>,
    /// Analog level the caller should apply, in adaptive analog mode.
    pub recommended_analog_level: Option<i32>,
}
