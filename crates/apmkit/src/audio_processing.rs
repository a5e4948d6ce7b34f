//! Public session API.
//!
//! Provides [`AudioProcessing`] and its [`AudioProcessingBuilder`].

use crate::audio_frame::{AudioFrame, Sample};
use crate::audio_processing_impl::AudioProcessingImpl;
use crate::config::Config;
use crate::error::Error;
use crate::frame_buffer::{FrameBuffer, InputBuffer};
use crate::stats::ProcessingStatistics;
use crate::stream_config::StreamConfig;

/// Highest analog level a caller may report.
const MAX_ANALOG_LEVEL: i32 = 255;

/// Builder for an [`AudioProcessing`] session.
///
/// # Example
///
/// ```
/// use apmkit::{AudioProcessing, Config, StreamConfig};
///
/// let mut config = Config::default();
/// config.set_noise_suppression_enabled(true);
///
/// let apm = AudioProcessing::builder()
///     .stream_config(StreamConfig::new(48_000, 2)?)
///     .config(config)
///     .build();
/// assert_eq!(apm.stream_config().num_frames(), 480);
/// # Ok::<(), apmkit::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct AudioProcessingBuilder {
    stream_config: StreamConfig,
    config: Config,
}

impl AudioProcessingBuilder {
    /// Set the stream format (default: 16 kHz mono).
    pub fn stream_config(mut self, stream_config: StreamConfig) -> Self {
        self.stream_config = stream_config;
        self
    }

    /// Set the initial configuration (default: every stage disabled).
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> AudioProcessing {
        tracing::debug!(
            sample_rate_hz = self.stream_config.sample_rate_hz(),
            num_channels = self.stream_config.num_channels(),
            "audio processing session created"
        );
        AudioProcessing {
            inner: AudioProcessingImpl::new(self.stream_config, self.config),
        }
    }
}

/// One audio processing session.
///
/// A session owns the adaptive state of every stage for one stream format.
/// For each 10 ms period:
///
/// 1. hand the audio about to be played out to
///    [`process_render_frame`](Self::process_render_frame) (or a sibling),
/// 2. then hand the microphone audio of the same period to
///    [`process_capture_frame`](Self::process_capture_frame).
///
/// In adaptive analog gain mode, read
/// [`recommended_stream_analog_level`](Self::recommended_stream_analog_level)
/// after each capture frame, apply it to the device and report the level
/// the device actually uses with
/// [`set_stream_analog_level`](Self::set_stream_analog_level). Without that
/// report the controller keeps recommending from the last level it was
/// told about.
///
/// Sessions are independent. Driving the render and capture sides of one
/// session from two threads requires an external lock around both calls.
#[derive(Debug)]
pub struct AudioProcessing {
    inner: AudioProcessingImpl,
}

impl AudioProcessing {
    /// Session with every stage disabled.
    pub fn new(stream_config: StreamConfig) -> Self {
        Self::builder().stream_config(stream_config).build()
    }

    pub fn builder() -> AudioProcessingBuilder {
        AudioProcessingBuilder::default()
    }

    /// Replace the configuration between frames.
    ///
    /// Stages whose settings changed are rebuilt; the others keep their
    /// adaptive state.
    pub fn apply_config(&mut self, config: Config) {
        self.inner.apply_config(config);
    }

    pub fn config(&self) -> &Config {
        self.inner.config()
    }

    pub fn stream_config(&self) -> StreamConfig {
        self.inner.stream_config()
    }

    /// Statistics of the last processed capture frame.
    pub fn get_statistics(&self) -> ProcessingStatistics {
        self.inner.statistics()
    }

    /// Whether echo is currently audible in the capture signal.
    ///
    /// Always false while echo cancellation is disabled.
    pub fn stream_has_echo(&self) -> bool {
        self.inner.stream_has_echo()
    }

    // ─── Stream parameters ───────────────────────────────────────

    /// Report the render-to-capture delay.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidDelay`] when `delay_ms` is negative or above
    /// [`Pipeline::max_stream_delay_ms`](crate::config::Pipeline::max_stream_delay_ms).
    pub fn set_stream_delay_ms(&mut self, delay_ms: i32) -> Result<(), Error> {
        let max_delay_ms = self.inner.max_stream_delay_ms();
        if !(0..=max_delay_ms).contains(&delay_ms) {
            tracing::debug!(delay_ms, max_delay_ms, "stream delay rejected");
            return Err(Error::InvalidDelay {
                delay_ms,
                max_delay_ms,
            });
        }
        self.inner.set_stream_delay_ms(delay_ms);
        Ok(())
    }

    /// Report the analog level the capture device currently applies.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidLevel`] when `level` is outside `0..=255`.
    pub fn set_stream_analog_level(&mut self, level: i32) -> Result<(), Error> {
        if !(0..=MAX_ANALOG_LEVEL).contains(&level) {
            tracing::debug!(level, "analog level rejected");
            return Err(Error::InvalidLevel { level });
        }
        self.inner.set_stream_analog_level(level);
        Ok(())
    }

    /// Analog level the caller should apply to the capture device.
    ///
    /// Without adaptive analog gain control this echoes the last level
    /// reported with [`set_stream_analog_level`](Self::set_stream_analog_level).
    pub fn recommended_stream_analog_level(&self) -> i32 {
        self.inner.recommended_stream_analog_level()
    }

    // ─── Frames ──────────────────────────────────────────────────

    /// Process one capture frame and return the cleaned frame.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedRate`] or [`Error::InvalidShape`] when the frame
    /// was made for a different stream.
    pub fn process_capture_frame<T: Sample>(
        &mut self,
        frame: &AudioFrame<T>,
    ) -> Result<AudioFrame<T>, Error> {
        self.check_frame_config(frame.config())?;
        let mut output = frame.clone();
        self.inner.process_capture_interleaved(output.samples_mut());
        Ok(output)
    }

    /// Feed one render frame to the echo stages and return it unmodified.
    ///
    /// # Errors
    ///
    /// As for [`process_capture_frame`](Self::process_capture_frame).
    pub fn process_render_frame<T: Sample>(
        &mut self,
        frame: &AudioFrame<T>,
    ) -> Result<AudioFrame<T>, Error> {
        self.check_frame_config(frame.config())?;
        self.inner.analyze_render_interleaved(frame.samples());
        Ok(frame.clone())
    }

    /// Process one deinterleaved capture frame in the `[-1, 1]` scale.
    ///
    /// `src` and `dest` hold one slice of one frame per channel.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidShape`] when a channel count or slice length differs
    /// from the stream.
    pub fn process_capture_f32(
        &mut self,
        src: &[&[f32]],
        dest: &mut [&mut [f32]],
    ) -> Result<(), Error> {
        self.check_deinterleaved(src)?;
        self.check_deinterleaved(dest)?;
        self.inner.process_capture_deinterleaved(src, dest);
        Ok(())
    }

    /// Feed one deinterleaved render frame and copy it to `dest` unmodified.
    ///
    /// # Errors
    ///
    /// As for [`process_capture_f32`](Self::process_capture_f32).
    pub fn process_render_f32(
        &mut self,
        src: &[&[f32]],
        dest: &mut [&mut [f32]],
    ) -> Result<(), Error> {
        self.check_deinterleaved(src)?;
        self.check_deinterleaved(dest)?;
        self.inner.analyze_render_deinterleaved(src);
        for (d, s) in dest.iter_mut().zip(src) {
            d.copy_from_slice(s);
        }
        Ok(())
    }

    /// Process one interleaved S16 capture frame.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidShape`] when `src` or `dest` is not one frame long.
    pub fn process_capture_i16(&mut self, src: &[i16], dest: &mut [i16]) -> Result<(), Error> {
        self.check_interleaved(src.len())?;
        self.check_interleaved(dest.len())?;
        dest.copy_from_slice(src);
        self.inner.process_capture_interleaved(dest);
        Ok(())
    }

    /// Feed one interleaved S16 render frame and copy it to `dest` unmodified.
    ///
    /// # Errors
    ///
    /// As for [`process_capture_i16`](Self::process_capture_i16).
    pub fn process_render_i16(&mut self, src: &[i16], dest: &mut [i16]) -> Result<(), Error> {
        self.check_interleaved(src.len())?;
        self.check_interleaved(dest.len())?;
        self.inner.analyze_render_interleaved(src);
        dest.copy_from_slice(src);
        Ok(())
    }

    // ─── Buffers ─────────────────────────────────────────────────

    /// Process a capture buffer of any length.
    ///
    /// Whole frames are processed in order; trailing samples that do not
    /// fill a frame are appended to the output unchanged.
    ///
    /// # Errors
    ///
    /// As for [`FrameBuffer::submit`]. Nothing is processed on error.
    pub fn process_capture_buffer<T: Sample>(
        &mut self,
        input: InputBuffer<'_, T>,
        sample_rate_hz: u32,
    ) -> Result<Vec<T>, Error> {
        let frames = FrameBuffer::new(self.stream_config()).submit(input, sample_rate_hz)?;
        let remainder = frames.remainder();
        let mut output = Vec::with_capacity(frames.len() * self.stream_config().num_samples());
        for frame in frames {
            let mut samples = frame.into_samples();
            self.inner.process_capture_interleaved(&mut samples);
            output.extend_from_slice(&samples);
        }
        output.extend_from_slice(remainder);
        Ok(output)
    }

    /// Feed a render buffer of any length and return it unchanged.
    ///
    /// # Errors
    ///
    /// As for [`FrameBuffer::submit`]. Nothing is analyzed on error.
    pub fn process_render_buffer<T: Sample>(
        &mut self,
        input: InputBuffer<'_, T>,
        sample_rate_hz: u32,
    ) -> Result<Vec<T>, Error> {
        let frames = FrameBuffer::new(self.stream_config()).submit(input, sample_rate_hz)?;
        let mut output = Vec::with_capacity(frames.len() * self.stream_config().num_samples());
        let remainder = frames.remainder();
        for frame in frames {
            self.inner.analyze_render_interleaved(frame.samples());
            output.extend_from_slice(frame.samples());
        }
        output.extend_from_slice(remainder);
        Ok(output)
    }

    // ─── Validation ──────────────────────────────────────────────

    fn check_frame_config(&self, frame_config: StreamConfig) -> Result<(), Error> {
        let stream = self.stream_config();
        if frame_config.sample_rate_hz() != stream.sample_rate_hz() {
            tracing::debug!(
                sample_rate_hz = frame_config.sample_rate_hz(),
                "frame rate rejected"
            );
            return Err(Error::UnsupportedRate {
                sample_rate_hz: frame_config.sample_rate_hz(),
            });
        }
        if frame_config.num_channels() != stream.num_channels() {
            tracing::debug!(
                num_channels = frame_config.num_channels(),
                "frame channels rejected"
            );
            return Err(Error::InvalidShape {
                expected: stream.num_channels(),
                actual: frame_config.num_channels(),
            });
        }
        Ok(())
    }

    fn check_deinterleaved<C: AsRef<[f32]>>(&self, channels: &[C]) -> Result<(), Error> {
        let stream = self.stream_config();
        if channels.len() != stream.num_channels() {
            tracing::debug!(num_channels = channels.len(), "channel count rejected");
            return Err(Error::InvalidShape {
                expected: stream.num_channels(),
                actual: channels.len(),
            });
        }
        if let Some(bad) = channels
            .iter()
            .map(|c| c.as_ref().len())
            .find(|&len| len != stream.num_frames())
        {
            tracing::debug!(len = bad, "channel length rejected");
            return Err(Error::InvalidShape {
                expected: stream.num_frames(),
                actual: bad,
            });
        }
        Ok(())
    }

    fn check_interleaved(&self, len: usize) -> Result<(), Error> {
        let expected = self.stream_config().num_samples();
        if len != expected {
            tracing::debug!(len, expected, "frame length rejected");
            return Err(Error::InvalidShape {
                expected,
                actual: len,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_STREAM_DELAY_MS;

    fn session(rate: u32, channels: u16) -> AudioProcessing {
        AudioProcessing::new(StreamConfig::new(rate, channels).unwrap())
    }

    #[test]
    fn builder_defaults_to_16k_mono_and_no_stages() {
        let apm = AudioProcessing::builder().build();
        assert_eq!(apm.stream_config(), StreamConfig::default());
        assert_eq!(apm.config(), &Config::default());
        assert!(!apm.stream_has_echo());
    }

    #[test]
    fn delay_is_bounded_by_pipeline() {
        let mut apm = session(16_000, 1);
        assert!(apm.set_stream_delay_ms(0).is_ok());
        assert!(apm.set_stream_delay_ms(500).is_ok());
        assert_eq!(
            apm.set_stream_delay_ms(1000),
            Err(Error::InvalidDelay {
                delay_ms: 1000,
                max_delay_ms: 500,
            })
        );
        assert_eq!(
            apm.set_stream_delay_ms(-1),
            Err(Error::InvalidDelay {
                delay_ms: -1,
                max_delay_ms: 500,
            })
        );
    }

    #[test]
    fn oversized_delay_bound_is_clamped() {
        let mut config = Config::default();
        config.pipeline.max_stream_delay_ms = i32::MAX;
        config.set_echo_cancellation_enabled(true);
        let mut apm = AudioProcessing::builder()
            .stream_config(StreamConfig::new(48_000, 2).unwrap())
            .config(config)
            .build();
        assert!(apm.set_stream_delay_ms(MAX_STREAM_DELAY_MS).is_ok());
        assert_eq!(
            apm.set_stream_delay_ms(MAX_STREAM_DELAY_MS + 1),
            Err(Error::InvalidDelay {
                delay_ms: MAX_STREAM_DELAY_MS + 1,
                max_delay_ms: MAX_STREAM_DELAY_MS,
            })
        );
        let frame = AudioFrame::<f32>::silent(apm.stream_config());
        apm.process_render_frame(&frame).unwrap();
        assert_eq!(apm.process_capture_frame(&frame).unwrap(), frame);
    }

    #[test]
    fn analog_level_is_bounded() {
        let mut apm = session(16_000, 1);
        assert!(apm.set_stream_analog_level(0).is_ok());
        assert!(apm.set_stream_analog_level(255).is_ok());
        assert_eq!(
            apm.set_stream_analog_level(256),
            Err(Error::InvalidLevel { level: 256 })
        );
        assert_eq!(
            apm.set_stream_analog_level(-1),
            Err(Error::InvalidLevel { level: -1 })
        );
        assert_eq!(apm.recommended_stream_analog_level(), 255);
    }

    #[test]
    fn frames_of_another_stream_are_rejected() {
        let mut apm = session(16_000, 1);
        let wrong_rate = AudioFrame::<i16>::silent(StreamConfig::new(32_000, 1).unwrap());
        assert_eq!(
            apm.process_capture_frame(&wrong_rate).unwrap_err(),
            Error::UnsupportedRate {
                sample_rate_hz: 32_000,
            }
        );
        let wrong_channels = AudioFrame::<f32>::silent(StreamConfig::new(16_000, 2).unwrap());
        assert_eq!(
            apm.process_render_frame(&wrong_channels).unwrap_err(),
            Error::InvalidShape {
                expected: 1,
                actual: 2,
            }
        );
    }

    #[test]
    fn deinterleaved_shapes_are_checked() {
        let mut apm = session(16_000, 2);
        let a = [0.0f32; 160];
        let short = [0.0f32; 159];
        let mut d0 = [0.0f32; 160];
        let mut d1 = [0.0f32; 160];
        assert_eq!(
            apm.process_capture_f32(&[&a], &mut [&mut d0, &mut d1]),
            Err(Error::InvalidShape {
                expected: 2,
                actual: 1,
            })
        );
        assert_eq!(
            apm.process_capture_f32(&[&a, &short], &mut [&mut d0, &mut d1]),
            Err(Error::InvalidShape {
                expected: 160,
                actual: 159,
            })
        );
        assert!(
            apm.process_capture_f32(&[&a, &a], &mut [&mut d0, &mut d1]).is_ok()
        );
    }

    #[test]
    fn interleaved_length_is_checked() {
        let mut apm = session(8_000, 2);
        let mut dest = [0i16; 160];
        assert_eq!(
            apm.process_capture_i16(&[0; 158], &mut dest),
            Err(Error::InvalidShape {
                expected: 160,
                actual: 158,
            })
        );
        assert_eq!(
            apm.process_render_i16(&[0; 160], &mut [0; 162]),
            Err(Error::InvalidShape {
                expected: 160,
                actual: 162,
            })
        );
    }

    #[test]
    fn render_frames_are_returned_unmodified() {
        let mut config = Config::default();
        config.set_echo_cancellation_enabled(true);
        config.set_residual_echo_detector_enabled(true);
        let mut apm = AudioProcessing::builder()
            .stream_config(StreamConfig::new(32_000, 1).unwrap())
            .config(config)
            .build();
        let render: Vec<i16> = (0..320).map(|i| ((i * 211) % 4000 - 2000) as i16).collect();
        let mut dest = vec![0i16; 320];
        apm.process_render_i16(&render, &mut dest).unwrap();
        assert_eq!(dest, render);
    }

    #[test]
    fn buffer_remainder_passes_through() {
        let mut config = Config::default();
        config.set_gain_control_enabled(true);
        let mut apm = AudioProcessing::builder().config(config).build();
        let input: Vec<i16> = vec![100; 400];
        let output = apm.process_capture_buffer(InputBuffer::Mono(&input), 16_000).unwrap();
        assert_eq!(output.len(), 400);
        assert_eq!(&output[320..], &input[320..]);
    }

    #[test]
    fn rejected_buffer_processes_nothing() {
        let mut config = Config::default();
        config.set_noise_suppression_enabled(true);
        let mut apm = AudioProcessing::builder().config(config).build();
        let input = vec![0.1f32; 320];
        assert_eq!(
            apm.process_capture_buffer(InputBuffer::Mono(&input), 44_100).unwrap_err(),
            Error::UnsupportedRate {
                sample_rate_hz: 44_100,
            }
        );
        assert_eq!(apm.get_statistics(), ProcessingStatistics::default());
    }
}
