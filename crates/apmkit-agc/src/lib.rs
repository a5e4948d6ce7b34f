#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod adaptive_digital;
pub mod analog;
pub mod common;
pub mod config;
pub(crate) mod gain_applier;
pub mod gain_controller;
pub(crate) mod level_estimator;
pub mod limiter;

pub use config::{AdaptiveDigitalConfig, AnalogConfig, GainControlMode, GainControllerConfig};
pub use gain_controller::GainController;
