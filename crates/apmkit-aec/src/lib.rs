#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub(crate) mod adaptive_filter;
pub mod config;
pub(crate) mod decimator;
pub mod delay_estimator;
pub(crate) mod double_talk;
pub mod echo_canceller;
pub mod error;
pub mod filter_state;
pub(crate) mod metrics;
pub mod render_buffer;
pub(crate) mod suppression_gain;

pub use config::EchoCancellerConfig;
pub use echo_canceller::{EchoCanceller, EchoMetrics};
pub use error::{FilterDiverged, InvalidDelay};
pub use filter_state::FilterState;
pub use render_buffer::RenderRingBuffer;
