#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub(crate) mod audio_buffer;
pub mod audio_frame;
mod audio_processing;
pub(crate) mod audio_processing_impl;
pub mod config;
pub(crate) mod echo_detector;
pub mod error;
pub mod frame_buffer;
pub(crate) mod high_pass_filter;
pub(crate) mod residual_echo_detector;
pub(crate) mod rms_level;
pub(crate) mod splitting_filter;
pub mod stats;
pub mod stream_config;
pub(crate) mod submodule_states;
pub(crate) mod three_band_filter_bank;

pub use audio_frame::{AudioFrame, Sample};
pub use audio_processing::{AudioProcessing, AudioProcessingBuilder};
pub use config::Config;
pub use error::Error;
pub use frame_buffer::{FrameBuffer, Frames, InputBuffer};
pub use stats::ProcessingStatistics;
pub use stream_config::StreamConfig;

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
