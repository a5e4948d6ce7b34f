//! Working buffer for one stream direction.
//!
//! Holds the full-band FloatS16 channels of the current frame and, when any
//! split-band stage runs, the `[channel][band][sample]` view produced by the
//! band splitter.

use crate::audio_frame::Sample;
use crate::splitting_filter::BandSplitter;
use crate::stream_config::StreamConfig;

#[derive(Debug)]
pub(crate) struct AudioBuffer {
    num_frames: usize,
    channels: Vec<Vec<f32>>,
    bands: Vec<Vec<Vec<f32>>>,
    splitters: Vec<BandSplitter>,
}

impl AudioBuffer {
    pub(crate) fn new(config: StreamConfig) -> Self {
        let num_channels = config.num_channels();
        let num_bands = config.num_bands();
        let band_length = config.band_length();
        Self {
            num_frames: config.num_frames(),
            channels: vec![vec![0.0; config.num_frames()]; num_channels],
            bands: vec![vec![vec![0.0; band_length]; num_bands]; num_channels],
            splitters: (0..num_channels)
                .filter_map(|_| BandSplitter::new(num_bands, band_length))
                .collect(),
        }
    }

    /// Load interleaved samples of one frame.
    pub(crate) fn copy_from_interleaved<T: Sample>(&mut self, samples: &[T]) {
        let num_channels = self.channels.len();
        debug_assert_eq!(samples.len(), num_channels * self.num_frames);
        for (i, frame) in samples.chunks_exact(num_channels).enumerate() {
            for (channel, &s) in self.channels.iter_mut().zip(frame) {
                channel[i] = s.to_float_s16();
            }
        }
    }

    /// Store the full-band channels as interleaved samples.
    pub(crate) fn copy_to_interleaved<T: Sample>(&self, samples: &mut [T]) {
        let num_channels = self.channels.len();
        debug_assert_eq!(samples.len(), num_channels * self.num_frames);
        for (i, frame) in samples.chunks_exact_mut(num_channels).enumerate() {
            for (s, channel) in frame.iter_mut().zip(&self.channels) {
                *s = T::from_float_s16(channel[i]);
            }
        }
    }

    /// Load one slice per channel.
    pub(crate) fn copy_from_deinterleaved<T: Sample>(&mut self, src: &[&[T]]) {
        for (channel, samples) in self.channels.iter_mut().zip(src) {
            for (c, &s) in channel.iter_mut().zip(samples.iter()) {
                *c = s.to_float_s16();
            }
        }
    }

    /// Store the full-band channels into one slice per channel.
    pub(crate) fn copy_to_deinterleaved<T: Sample>(&self, dst: &mut [&mut [T]]) {
        for (samples, channel) in dst.iter_mut().zip(&self.channels) {
            for (s, &c) in samples.iter_mut().zip(channel) {
                *s = T::from_float_s16(c);
            }
        }
    }

    pub(crate) fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub(crate) fn channels_mut(&mut self) -> &mut [Vec<f32>] {
        &mut self.channels
    }

    pub(crate) fn bands(&self) -> &[Vec<Vec<f32>>] {
        &self.bands
    }

    pub(crate) fn bands_mut(&mut self) -> &mut [Vec<Vec<f32>>] {
        &mut self.bands
    }

    /// Fill the split-band view from the full-band channels.
    pub(crate) fn split_into_bands(&mut self) {
        if self.splitters.is_empty() {
            for (bands, channel) in self.bands.iter_mut().zip(&self.channels) {
                bands[0].copy_from_slice(channel);
            }
            return;
        }
        for ((splitter, bands), channel) in self
            .splitters
            .iter_mut()
            .zip(self.bands.iter_mut())
            .zip(&self.channels)
        {
            splitter.analysis(channel, bands);
        }
    }

    /// Rebuild the full-band channels from the split-band view.
    pub(crate) fn merge_bands(&mut self) {
        if self.splitters.is_empty() {
            for (channel, bands) in self.channels.iter_mut().zip(&self.bands) {
                channel.copy_from_slice(&bands[0]);
            }
            return;
        }
        for ((splitter, channel), bands) in self
            .splitters
            .iter_mut()
            .zip(self.channels.iter_mut())
            .zip(&self.bands)
        {
            splitter.synthesis(bands, channel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleaved_round_trip_is_exact() {
        let config = StreamConfig::new(8_000, 2).unwrap();
        let mut buffer = AudioBuffer::new(config);
        let input: Vec<i16> = (0..160).map(|i| (i * 397 - 30_000) as i16).collect();
        buffer.copy_from_interleaved(&input);
        assert_eq!(buffer.channels()[1][0], f32::from(input[1]));
        let mut output = vec![0i16; 160];
        buffer.copy_to_interleaved(&mut output);
        assert_eq!(output, input);
    }

    #[test]
    fn float_samples_are_scaled_to_float_s16() {
        let config = StreamConfig::new(16_000, 1).unwrap();
        let mut buffer = AudioBuffer::new(config);
        let input = vec![0.25f32; 160];
        buffer.copy_from_deinterleaved(&[&input]);
        assert!(buffer.channels()[0].iter().all(|&v| v == 8192.0));
        let mut out = vec![0.0f32; 160];
        buffer.copy_to_deinterleaved(&mut [&mut out]);
        assert_eq!(out, input);
    }

    #[test]
    fn single_band_split_is_a_copy() {
        let config = StreamConfig::new(16_000, 1).unwrap();
        let mut buffer = AudioBuffer::new(config);
        buffer.channels_mut()[0].iter_mut().enumerate().for_each(|(i, v)| *v = i as f32);
        buffer.split_into_bands();
        assert_eq!(buffer.bands()[0][0], buffer.channels()[0]);
        buffer.bands_mut()[0][0].fill(7.0);
        buffer.merge_bands();
        assert!(buffer.channels()[0].iter().all(|&v| v == 7.0));
    }

    #[test]
    fn split_rates_produce_band_layout() {
        for (rate, bands) in [(32_000, 2), (48_000, 3)] {
            let config = StreamConfig::new(rate, 2).unwrap();
            let mut buffer = AudioBuffer::new(config);
            buffer.split_into_bands();
            assert_eq!(buffer.bands().len(), 2);
            assert!(buffer.bands().iter().all(|b| b.len() == bands && b[0].len() == 160));
        }
    }
}
