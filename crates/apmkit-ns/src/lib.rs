#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod config;
pub(crate) mod noise_estimator;
pub mod noise_suppressor;
pub(crate) mod quantile_noise_estimator;
pub(crate) mod speech_probability_estimator;
pub(crate) mod suppression_params;
pub(crate) mod wiener_filter;

pub use config::{NsConfig, SuppressionLevel};
pub use noise_suppressor::NoiseSuppressor;
