//! Re-chunking of arbitrary-length buffers into 10 ms frames.

use std::iter::FusedIterator;
use std::slice::ChunksExact;

use crate::audio_frame::{AudioFrame, Sample};
use crate::error::Error;
use crate::stream_config::{StreamConfig, validate_sample_rate};

/// Caller-supplied audio of any length.
#[derive(Debug, Clone, Copy)]
pub enum InputBuffer<'a, T> {
    /// One channel.
    Mono(&'a [T]),
    /// Interleaved samples with an explicit channel axis.
    Interleaved { data: &'a [T], num_channels: usize },
}

/// Cuts caller buffers into frames of one stream.
///
/// Framing always starts at the first sample of each submitted buffer;
/// nothing is carried between calls.
#[derive(Debug, Clone, Copy)]
pub struct FrameBuffer {
    config: StreamConfig,
}

impl FrameBuffer {
    pub fn new(config: StreamConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> StreamConfig {
        self.config
    }

    /// Validate `input` and return its whole frames lazily.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedRate`] when `sample_rate_hz` is not supported or
    ///   differs from the stream's rate.
    /// - [`Error::InvalidShape`] when the channel axis does not match the
    ///   stream, or interleaved data is not a whole number of sample frames.
    pub fn submit<'a, T: Sample>(
        &self,
        input: InputBuffer<'a, T>,
        sample_rate_hz: u32,
    ) -> Result<Frames<'a, T>, Error> {
        validate_sample_rate(sample_rate_hz)?;
        if sample_rate_hz != self.config.sample_rate_hz() {
            return Err(Error::UnsupportedRate { sample_rate_hz });
        }

        let expected_channels = self.config.num_channels();
        let (data, num_channels) = match input {
            InputBuffer::Mono(data) => (data, 1),
            InputBuffer::Interleaved { data, num_channels } => (data, num_channels),
        };
        if num_channels != expected_channels {
            return Err(Error::InvalidShape {
                expected: expected_channels,
                actual: num_channels,
            });
        }
        let partial = data.len() % num_channels;
        if partial != 0 {
            return Err(Error::InvalidShape {
                expected: data.len() - partial,
                actual: data.len(),
            });
        }

        Ok(Frames {
            config: self.config,
            chunks: data.chunks_exact(self.config.num_samples()),
        })
    }
}

/// Lazy, finite sequence of frames cut from one buffer.
#[derive(Debug, Clone)]
pub struct Frames<'a, T> {
    config: StreamConfig,
    chunks: ChunksExact<'a, T>,
}

impl<'a, T> Frames<'a, T> {
    /// Trailing samples that do not fill a whole frame.
    pub fn remainder(&self) -> &'a [T] {
        self.chunks.remainder()
    }
}

impl<T: Sample> Iterator for Frames<'_, T> {
    type Item = AudioFrame<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk = self.chunks.next()?;
        AudioFrame::new(self.config, chunk.to_vec()).ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl<T: Sample> ExactSizeIterator for Frames<'_, T> {}

impl<T: Sample> FusedIterator for Frames<'_, T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_strategy::proptest;

    fn buffer(rate: u32, channels: u16) -> FrameBuffer {
        FrameBuffer::new(StreamConfig::new(rate, channels).unwrap())
    }

    #[test]
    fn splits_mono_input_and_keeps_remainder() {
        let fb = buffer(8_000, 1);
        let data: Vec<i16> = (0..250).collect();
        let frames = fb.submit(InputBuffer::Mono(&data), 8_000).unwrap();
        assert_eq!(frames.remainder(), &data[240..]);
        let frames: Vec<_> = frames.collect();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].samples(), &data[80..160]);
    }

    #[test]
    fn rejects_unsupported_or_mismatched_rate() {
        let fb = buffer(16_000, 1);
        let data = [0.0f32; 160];
        assert_eq!(
            fb.submit(InputBuffer::Mono(&data), 44_100).unwrap_err(),
            Error::UnsupportedRate {
                sample_rate_hz: 44_100,
            }
        );
        assert_eq!(
            fb.submit(InputBuffer::Mono(&data), 48_000).unwrap_err(),
            Error::UnsupportedRate {
                sample_rate_hz: 48_000,
            }
        );
    }

    #[test]
    fn rejects_mismatched_channel_axis() {
        let fb = buffer(16_000, 2);
        let data = [0i16; 640];
        assert_eq!(
            fb.submit(InputBuffer::Mono(&data), 16_000).unwrap_err(),
            Error::InvalidShape {
                expected: 2,
                actual: 1,
            }
        );
        let three_channels = InputBuffer::Interleaved {
            data: &data,
            num_channels: 3,
        };
        assert_eq!(
            fb.submit(three_channels, 16_000).unwrap_err(),
            Error::InvalidShape {
                expected: 2,
                actual: 3,
            }
        );
        let ragged = InputBuffer::Interleaved {
            data: &data[..639],
            num_channels: 2,
        };
        assert_eq!(
            fb.submit(ragged, 16_000).unwrap_err(),
            Error::InvalidShape {
                expected: 638,
                actual: 639,
            }
        );
    }

    #[test]
    fn interleaved_frames_keep_channel_order() {
        let fb = buffer(8_000, 2);
        let data: Vec<i16> = (0..160).map(|i| if i % 2 == 0 { 1 } else { -1 }).collect();
        let input = InputBuffer::Interleaved {
            data: &data,
            num_channels: 2,
        };
        let mut frames = fb.submit(input, 8_000).unwrap();
        let frame = frames.next().unwrap();
        assert!(frame.channel(0).all(|v| v == 1));
        assert!(frame.channel(1).all(|v| v == -1));
        assert!(frames.next().is_none());
    }

    #[proptest]
    fn frame_count_matches_length(#[strategy(0usize..5000)] len: usize) {
        let fb = buffer(16_000, 1);
        let data = vec![0.0f32; len];
        let frames = fb.submit(InputBuffer::Mono(&data), 16_000).unwrap();
        let remainder = frames.remainder().len();
        let count = frames.count();
        prop_assert_eq!(count, len / 160);
        prop_assert_eq!(remainder, len % 160);
    }
}
