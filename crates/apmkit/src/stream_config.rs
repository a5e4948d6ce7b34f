//! Stream configuration.

use crate::error::Error;

/// Sample rates a session can run at.
pub const SUPPORTED_SAMPLE_RATES_HZ: [u32; 4] = [8_000, 16_000, 32_000, 48_000];

/// Duration of one processing frame.
pub const FRAME_DURATION_MS: u32 = 10;

/// Immutable properties of a session's audio stream.
///
/// The rate is one of [`SUPPORTED_SAMPLE_RATES_HZ`] and there is at least one
/// channel, so every frame holds an integral number of samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamConfig {
    sample_rate_hz: u32,
    num_channels: u16,
}

impl StreamConfig {
    /// Create a validated stream configuration.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedRate`] for a rate outside the supported set and
    /// [`Error::InvalidShape`] for zero channels.
    pub fn new(sample_rate_hz: u32, num_channels: u16) -> Result<Self, Error> {
        validate_sample_rate(sample_rate_hz)?;
        if num_channels == 0 {
            return Err(Error::InvalidShape {
                expected: 1,
                actual: 0,
            });
        }
        Ok(Self {
            sample_rate_hz,
            num_channels,
        })
    }

    /// The sampling rate in Hz.
    #[inline]
    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    /// The number of channels.
    #[inline]
    pub fn num_channels(&self) -> usize {
        usize::from(self.num_channels)
    }

    /// Samples per channel in one 10 ms frame.
    #[inline]
    pub fn num_frames(&self) -> usize {
        (self.sample_rate_hz * FRAME_DURATION_MS / 1000) as usize
    }

    /// Total number of samples (channels × frames).
    #[inline]
    pub fn num_samples(&self) -> usize {
        self.num_channels() * self.num_frames()
    }

    /// Split bands used internally: 1 up to 16 kHz, 2 at 32 kHz, 3 at 48 kHz.
    pub fn num_bands(&self) -> usize {
        match self.sample_rate_hz {
            32_000 => 2,
            48_000 => 3,
            _ => 1,
        }
    }

    /// Samples per band per frame: 80 at 8 kHz, 160 otherwise.
    pub fn band_length(&self) -> usize {
        self.num_frames() / self.num_bands()
    }
}

impl Default for StreamConfig {
    /// 16 kHz mono.
    fn default() -> Self {
        Self {
            sample_rate_hz: 16_000,
            num_channels: 1,
        }
    }
}

pub(crate) fn validate_sample_rate(sample_rate_hz: u32) -> Result<(), Error> {
    if SUPPORTED_SAMPLE_RATES_HZ.contains(&sample_rate_hz) {
        Ok(())
    } else {
        Err(Error::UnsupportedRate { sample_rate_hz })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_sample_rates() {
        for rate in [0, 7_999, 11_025, 22_050, 44_100, 96_000] {
            assert_eq!(
                StreamConfig::new(rate, 1),
                Err(Error::UnsupportedRate {
                    sample_rate_hz: rate,
                })
            );
        }
    }

    #[test]
    fn rejects_zero_channels() {
        assert_eq!(
            StreamConfig::new(16_000, 0),
            Err(Error::InvalidShape {
                expected: 1,
                actual: 0,
            })
        );
    }

    #[test]
    fn frame_and_band_layout() {
        let layouts = [
            (8_000, 80, 1, 80),
            (16_000, 160, 1, 160),
            (32_000, 320, 2, 160),
            (48_000, 480, 3, 160),
        ];
        for (rate, frames, bands, band_length) in layouts {
            let config = StreamConfig::new(rate, 2).unwrap();
            assert_eq!(config.num_frames(), frames);
            assert_eq!(config.num_samples(), 2 * frames);
            assert_eq!(config.num_bands(), bands);
            assert_eq!(config.band_length(), band_length);
        }
    }
}
