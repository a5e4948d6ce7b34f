#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod real_fft;
pub mod stft;
