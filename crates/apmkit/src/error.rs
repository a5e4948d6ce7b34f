//! Caller-facing errors.

use apmkit_aec::InvalidDelay;

/// Errors returned by session and framing calls.
///
/// Every error is raised before any session state changes, so a rejected
/// call can be retried with corrected input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum Error {
    /// Channel count or sample count does not match the stream.
    ///
    /// `expected` and `actual` count channels when the channel axis is wrong
    /// and samples when the length is wrong.
    #[display("invalid frame shape: expected {expected}, got {actual}")]
    InvalidShape { expected: usize, actual: usize },
    /// Sample rate outside 8000, 16000, 32000 and 48000 Hz, or different
    /// from the session's rate.
    #[display("unsupported sample rate {sample_rate_hz} Hz")]
    UnsupportedRate { sample_rate_hz: u32 },
    /// Stream delay outside `0..=max_delay_ms`.
    #[display("stream delay {delay_ms} ms outside 0..={max_delay_ms} ms")]
    InvalidDelay { delay_ms: i32, max_delay_ms: i32 },
    /// Analog level outside `0..=255`.
    #[display("analog level {level} outside 0..=255")]
    InvalidLevel { level: i32 },
}

impl From<InvalidDelay> for Error {
    fn from(err: InvalidDelay) -> Self {
        Self::InvalidDelay {
            delay_ms: err.delay_ms,
            max_delay_ms: err.max_delay_ms,
        }
    }
}
