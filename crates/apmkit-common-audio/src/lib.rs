#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod audio_util;
pub mod cascaded_biquad_filter;
pub mod delay_line;
