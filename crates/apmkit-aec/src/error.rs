//! Echo canceller errors.

/// A stream delay outside `0..=max_delay_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("stream delay {delay_ms} ms outside 0..={max_delay_ms} ms")]
pub struct InvalidDelay {
    pub delay_ms: i32,
    pub max_delay_ms: i32,
}

/// The echo path model produced more residual than capture energy.
///
/// Recovered inside the canceller by resetting the model.
#[derive(Debug, Clone, Copy, PartialEq, derive_more::Display, derive_more::Error)]
#[display("echo path model diverged: residual {residual_energy} > capture {capture_energy}")]
pub struct FilterDiverged {
    pub residual_energy: f32,
    pub capture_energy: f32,
}
