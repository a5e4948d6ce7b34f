//! Session configuration.
//!
//! Every optional stage is an `Option`: `Some(..)` enables it with the given
//! settings, `None` disables it. All stages are disabled by default, in
//! which case capture frames pass through unchanged.

pub use apmkit_agc::{AdaptiveDigitalConfig, AnalogConfig};

use apmkit_aec::EchoCancellerConfig;
use apmkit_agc::GainControllerConfig;
use apmkit_ns::SuppressionLevel;

/// Settings of a capture pipeline.
///
/// Supplied when the session is built and replaceable between frames with
/// [`AudioProcessing::apply_config`](crate::AudioProcessing::apply_config).
/// Stages whose settings did not change keep their adaptive state.
///
/// # Example
///
/// ```
/// use apmkit::Config;
/// use apmkit::config::{NoiseSuppression, NoiseSuppressionLevel};
///
/// let mut config = Config {
///     noise_suppression: Some(NoiseSuppression {
///         level: NoiseSuppressionLevel::High,
///     }),
///     ..Default::default()
/// };
/// config.set_echo_cancellation_enabled(true);
/// assert!(config.is_echo_cancellation_enabled());
/// assert!(!config.is_gain_control_enabled());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub pipeline: Pipeline,
    /// 80 Hz high-pass on the capture signal, before any other stage.
    pub high_pass_filter: Option<HighPassFilter>,
    pub echo_canceller: Option<EchoCanceller>,
    pub noise_suppression: Option<NoiseSuppression>,
    /// Gain control on the full-band signal after noise suppression.
    pub gain_controller: Option<GainController>,
    /// Echo likelihood of the processed output, reported in statistics.
    pub residual_echo_detector: Option<ResidualEchoDetector>,
}

impl Config {
    /// Enable echo cancellation with default settings, or disable it.
    ///
    /// Enabling keeps existing settings when already enabled.
    pub fn set_echo_cancellation_enabled(&mut self, enabled: bool) {
        toggle(&mut self.echo_canceller, enabled);
    }

    pub fn is_echo_cancellation_enabled(&self) -> bool {
        self.echo_canceller.is_some()
    }

    pub fn set_noise_suppression_enabled(&mut self, enabled: bool) {
        toggle(&mut self.noise_suppression, enabled);
    }

    pub fn is_noise_suppression_enabled(&self) -> bool {
        self.noise_suppression.is_some()
    }

    pub fn set_gain_control_enabled(&mut self, enabled: bool) {
        toggle(&mut self.gain_controller, enabled);
    }

    pub fn is_gain_control_enabled(&self) -> bool {
        self.gain_controller.is_some()
    }

    pub fn set_high_pass_filter_enabled(&mut self, enabled: bool) {
        toggle(&mut self.high_pass_filter, enabled);
    }

    pub fn is_high_pass_filter_enabled(&self) -> bool {
        self.high_pass_filter.is_some()
    }

    pub fn set_residual_echo_detector_enabled(&mut self, enabled: bool) {
        toggle(&mut self.residual_echo_detector, enabled);
    }

    pub fn is_residual_echo_detector_enabled(&self) -> bool {
        self.residual_echo_detector.is_some()
    }
}

fn toggle<T: Default>(stage: &mut Option<T>, enabled: bool) {
    if !enabled {
        *stage = None;
    } else if stage.is_none() {
        *stage = Some(T::default());
    }
}

/// Largest stream delay bound a session accepts, in milliseconds.
pub const MAX_STREAM_DELAY_MS: i32 = 1000;

/// Longest echo tail the linear filter can cover, in 10 ms frames.
pub const MAX_FILTER_LENGTH_FRAMES: usize = 20;

/// Session-wide properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pipeline {
    /// Upper bound for [`AudioProcessing::set_stream_delay_ms`](crate::AudioProcessing::set_stream_delay_ms)
    /// and for the delay the echo canceller can compensate (default: 500).
    ///
    /// Clamped to `0..=`[`MAX_STREAM_DELAY_MS`].
    pub max_stream_delay_ms: i32,
}

impl Pipeline {
    /// The delay bound in effect.
    pub fn effective_max_stream_delay_ms(&self) -> i32 {
        self.max_stream_delay_ms.clamp(0, MAX_STREAM_DELAY_MS)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            max_stream_delay_ms: 500,
        }
    }
}

/// High-pass filter settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HighPassFilter;

/// Echo canceller settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoCanceller {
    /// Echo tail covered by the linear filter, in 10 ms frames (default: 3).
    ///
    /// Clamped to `1..=`[`MAX_FILTER_LENGTH_FRAMES`].
    pub filter_length_frames: usize,
    /// Apply spectral suppression to the echo the linear filter leaves
    /// behind (default: true).
    pub suppress_residual_echo: bool,
}

impl Default for EchoCanceller {
    fn default() -> Self {
        Self {
            filter_length_frames: 3,
            suppress_residual_echo: true,
        }
    }
}

impl EchoCanceller {
    pub(crate) fn to_canceller_config(self, pipeline: Pipeline) -> EchoCancellerConfig {
        EchoCancellerConfig {
            filter_length_frames: self.filter_length_frames.clamp(1, MAX_FILTER_LENGTH_FRAMES),
            max_delay_ms: pipeline.effective_max_stream_delay_ms(),
            residual_suppression: self.suppress_residual_echo,
            ..Default::default()
        }
    }
}

/// Noise suppression settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoiseSuppression {
    pub level: NoiseSuppressionLevel,
}

/// Noise suppression aggressiveness.
///
/// Higher levels remove more noise at the cost of more speech distortion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum NoiseSuppressionLevel {
    /// About 6 dB of suppression.
    Low,
    /// About 12 dB of suppression.
    #[default]
    Moderate,
    /// About 18 dB of suppression.
    High,
    /// About 21 dB of suppression.
    VeryHigh,
}

impl From<NoiseSuppressionLevel> for SuppressionLevel {
    fn from(level: NoiseSuppressionLevel) -> Self {
        match level {
            NoiseSuppressionLevel::Low => Self::K6dB,
            NoiseSuppressionLevel::Moderate => Self::K12dB,
            NoiseSuppressionLevel::High => Self::K18dB,
            NoiseSuppressionLevel::VeryHigh => Self::K21dB,
        }
    }
}

impl TryFrom<i32> for NoiseSuppressionLevel {
    type Error = InvalidSetting;

    /// Levels `0..=3`, from [`Low`](Self::Low) to [`VeryHigh`](Self::VeryHigh).
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Low),
            1 => Ok(Self::Moderate),
            2 => Ok(Self::High),
            3 => Ok(Self::VeryHigh),
            _ => Err(InvalidSetting {
                name: "noise suppression level",
                value,
            }),
        }
    }
}

/// Gain controller settings.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GainController {
    pub mode: GainControlMode,
    /// Gain of [`GainControlMode::FixedDigital`], clamped to `0..=90` dB.
    pub fixed_gain_db: f32,
    /// Tuning of the analog level recommender.
    pub analog: AnalogConfig,
    /// Tuning of the adaptive digital controller.
    pub adaptive_digital: AdaptiveDigitalConfig,
}

impl GainController {
    pub(crate) fn to_controller_config(self) -> GainControllerConfig {
        GainControllerConfig {
            mode: self.mode.into(),
            analog: self.analog,
            adaptive_digital: self.adaptive_digital,
            fixed_gain_db: self.fixed_gain_db,
        }
    }
}

/// How the gain controller reaches its target level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum GainControlMode {
    /// Recommend an analog level for the caller to apply to the device.
    #[default]
    AdaptiveAnalog,
    /// Apply an adaptive digital gain.
    AdaptiveDigital,
    /// Apply a constant digital gain.
    FixedDigital,
}

impl From<GainControlMode> for apmkit_agc::GainControlMode {
    fn from(mode: GainControlMode) -> Self {
        match mode {
            GainControlMode::AdaptiveAnalog => Self::AdaptiveAnalog,
            GainControlMode::AdaptiveDigital => Self::AdaptiveDigital,
            GainControlMode::FixedDigital => Self::FixedDigital,
        }
    }
}

impl TryFrom<i32> for GainControlMode {
    type Error = InvalidSetting;

    /// Modes `0..=2`: adaptive analog, adaptive digital, fixed digital.
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::AdaptiveAnalog),
            1 => Ok(Self::AdaptiveDigital),
            2 => Ok(Self::FixedDigital),
            _ => Err(InvalidSetting {
                name: "gain control mode",
                value,
            }),
        }
    }
}

/// Residual echo detector settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResidualEchoDetector;

/// Integer that does not name a variant of a configuration enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("{value} is not a valid {name}")]
pub struct InvalidSetting {
    pub name: &'static str,
    pub value: i32,
}
