//! Fixed-length audio frames.

use std::fmt::Debug;

use apmkit_common_audio::audio_util::{
    float_s16_to_float, float_s16_to_s16, float_to_float_s16, s16_to_float_s16,
};

use crate::error::Error;
use crate::stream_config::StreamConfig;

/// Sample types a frame can carry.
///
/// `i16` uses the S16 scale and `f32` the `[-1, 1]` scale. Processing
/// converts both to FloatS16.
pub trait Sample: Copy + Default + PartialEq + Debug + Send + Sync + 'static {
    fn to_float_s16(self) -> f32;
    fn from_float_s16(value: f32) -> Self;
}

impl Sample for i16 {
    #[inline]
    fn to_float_s16(self) -> f32 {
        s16_to_float_s16(self)
    }

    #[inline]
    fn from_float_s16(value: f32) -> Self {
        float_s16_to_s16(value)
    }
}

impl Sample for f32 {
    #[inline]
    fn to_float_s16(self) -> f32 {
        float_to_float_s16(self)
    }

    #[inline]
    fn from_float_s16(value: f32) -> Self {
        float_s16_to_float(value)
    }
}

/// One 10 ms frame of interleaved samples, tagged with its stream.
///
/// The length always equals `num_frames * num_channels` of the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame<T> {
    config: StreamConfig,
    samples: Vec<T>,
}

impl<T: Sample> AudioFrame<T> {
    /// Wrap interleaved samples.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidShape`] when the length is not one frame of `config`.
    pub fn new(config: StreamConfig, samples: Vec<T>) -> Result<Self, Error> {
        if samples.len() != config.num_samples() {
            return Err(Error::InvalidShape {
                expected: config.num_samples(),
                actual: samples.len(),
            });
        }
        Ok(Self { config, samples })
    }

    /// Interleave one slice per channel into a frame.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidShape`] when the channel count or any channel length
    /// differs from `config`.
    pub fn from_channels(config: StreamConfig, channels: &[&[T]]) -> Result<Self, Error> {
        let num_channels = config.num_channels();
        if channels.len() != num_channels {
            return Err(Error::InvalidShape {
                expected: num_channels,
                actual: channels.len(),
            });
        }
        let num_frames = config.num_frames();
        if let Some(bad) = channels.iter().find(|c| c.len() != num_frames) {
            return Err(Error::InvalidShape {
                expected: num_frames,
                actual: bad.len(),
            });
        }
        let mut samples = Vec::with_capacity(config.num_samples());
        for i in 0..num_frames {
            samples.extend(channels.iter().map(|c| c[i]));
        }
        Ok(Self { config, samples })
    }

    /// A frame of digital silence.
    pub fn silent(config: StreamConfig) -> Self {
        Self {
            config,
            samples: vec![T::default(); config.num_samples()],
        }
    }

    pub fn config(&self) -> StreamConfig {
        self.config
    }

    pub fn num_channels(&self) -> usize {
        self.config.num_channels()
    }

    /// Samples per channel.
    pub fn num_frames(&self) -> usize {
        self.config.num_frames()
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[T] {
        &self.samples
    }

    /// Interleaved samples; the length cannot change through this view.
    pub fn samples_mut(&mut self) -> &mut [T] {
        &mut self.samples
    }

    pub fn into_samples(self) -> Vec<T> {
        self.samples
    }

    /// Samples of one channel.
    ///
    /// # Panics
    ///
    /// Panics if `channel` is out of range.
    pub fn channel(&self, channel: usize) -> impl Iterator<Item = T> + '_ {
        assert!(
            channel < self.num_channels(),
            "channel {channel} out of range"
        );
        self.samples
            .iter()
            .skip(channel)
            .step_by(self.num_channels())
            .copied()
    }
}
