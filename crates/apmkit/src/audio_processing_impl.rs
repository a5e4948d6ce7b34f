//! Session internals: stage ownership and the per-frame pipeline.
//!
//! Callers validate every argument before reaching this module; nothing
//! here fails.

use apmkit_aec::EchoCanceller;
use apmkit_agc::GainController;
use apmkit_ns::{NoiseSuppressor, NsConfig};

use crate::audio_buffer::AudioBuffer;
use crate::audio_frame::Sample;
use crate::config::{Config, GainControlMode};
use crate::high_pass_filter::HighPassFilter;
use crate::residual_echo_detector::ResidualEchoDetector;
use crate::rms_level::RmsLevel;
use crate::stats::ProcessingStatistics;
use crate::stream_config::StreamConfig;
use crate::submodule_states::SubmoduleStates;

/// Speech probability above which a frame counts as voiced.
const VOICE_PROBABILITY_THRESHOLD: f32 = 0.5;
/// Analog level reported when no analog controller runs and the caller
/// never set one.
const DEFAULT_ANALOG_LEVEL: i32 = 128;

/// Stages of the capture pipeline. `None` or empty means disabled.
#[derive(Debug, Default)]
struct Submodules {
    high_pass_filter: Option<HighPassFilter>,
    echo_canceller: Option<EchoCanceller>,
    /// One per capture channel.
    noise_suppressors: Vec<NoiseSuppressor>,
    gain_controller: Option<GainController>,
    echo_detector: Option<ResidualEchoDetector>,
}

#[derive(Debug)]
pub(crate) struct AudioProcessingImpl {
    stream: StreamConfig,
    config: Config,
    submodule_states: SubmoduleStates,
    submodules: Submodules,
    capture: AudioBuffer,
    render: AudioBuffer,
    output_level: RmsLevel,
    /// Last delay accepted by `set_stream_delay_ms`.
    stream_delay_ms: Option<i32>,
    /// Last level accepted by `set_stream_analog_level`.
    applied_analog_level: Option<i32>,
    stats: ProcessingStatistics,
}

impl AudioProcessingImpl {
    pub(crate) fn new(stream: StreamConfig, config: Config) -> Self {
        let mut apm = Self {
            stream,
            config: Config::default(),
            submodule_states: SubmoduleStates::default(),
            submodules: Submodules::default(),
            capture: AudioBuffer::new(stream),
            render: AudioBuffer::new(stream),
            output_level: RmsLevel::new(),
            stream_delay_ms: None,
            applied_analog_level: None,
            stats: ProcessingStatistics::default(),
        };
        apm.apply_config(config);
        apm
    }

    pub(crate) fn stream_config(&self) -> StreamConfig {
        self.stream
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    /// Rebuild the stages whose settings changed; the rest keep their state.
    pub(crate) fn apply_config(&mut self, config: Config) {
        let pipeline_changed = self.config.pipeline != config.pipeline;
        let hpf_changed = self.config.high_pass_filter != config.high_pass_filter;
        let aec_changed = pipeline_changed || self.config.echo_canceller != config.echo_canceller;
        let ns_changed = self.config.noise_suppression != config.noise_suppression;
        let agc_changed = self.config.gain_controller != config.gain_controller;
        let red_changed = self.config.residual_echo_detector != config.residual_echo_detector;
        self.config = config;

        if pipeline_changed
            && let Some(delay_ms) = self.stream_delay_ms
            && delay_ms > self.max_stream_delay_ms()
        {
            tracing::debug!(delay_ms, "stream delay beyond new bound dropped");
            self.stream_delay_ms = None;
        }
        if hpf_changed {
            self.initialize_high_pass_filter();
        }
        if aec_changed {
            self.initialize_echo_canceller();
        }
        if ns_changed {
            self.initialize_noise_suppressors();
        }
        if agc_changed {
            self.initialize_gain_controller();
        }
        if red_changed {
            self.initialize_residual_echo_detector();
        }
        if self.submodule_states.update(&self.config) {
            tracing::debug!(states = ?self.submodule_states, "active stages changed");
        }
    }

    pub(crate) fn max_stream_delay_ms(&self) -> i32 {
        self.config.pipeline.effective_max_stream_delay_ms()
    }

    /// Store an already validated delay and pass it to the echo canceller.
    pub(crate) fn set_stream_delay_ms(&mut self, delay_ms: i32) {
        self.stream_delay_ms = Some(delay_ms);
        if let Some(aec) = &mut self.submodules.echo_canceller
            && let Err(err) = aec.set_stream_delay_ms(delay_ms)
        {
            tracing::debug!(%err, "echo canceller rejected stream delay");
        }
    }

    /// Store an already validated analog level.
    pub(crate) fn set_stream_analog_level(&mut self, level: i32) {
        self.applied_analog_level = Some(level);
        if let Some(gc) = &mut self.submodules.gain_controller {
            gc.set_applied_analog_level(level);
        }
    }

    pub(crate) fn recommended_stream_analog_level(&self) -> i32 {
        match &self.submodules.gain_controller {
            Some(gc) if self.analog_mode() => gc.recommended_analog_level(),
            _ => self.applied_analog_level.unwrap_or(DEFAULT_ANALOG_LEVEL),
        }
    }

    pub(crate) fn stream_has_echo(&self) -> bool {
        self.submodules
            .echo_canceller
            .as_ref()
            .is_some_and(EchoCanceller::stream_has_echo)
    }

    pub(crate) fn statistics(&self) -> ProcessingStatistics {
        self.stats
    }

    /// Whether capture processing can change the signal. When it cannot,
    /// callers copy input to output untouched.
    pub(crate) fn capture_processing_active(&self) -> bool {
        self.submodule_states.capture_processing_active()
    }

    /// Process one interleaved capture frame in place.
    pub(crate) fn process_capture_interleaved<T: Sample>(&mut self, samples: &mut [T]) {
        self.capture.copy_from_interleaved(samples);
        self.process_capture_buffer();
        if self.capture_processing_active() {
            self.capture.copy_to_interleaved(samples);
        }
    }

    /// Process one deinterleaved capture frame into `dest`.
    pub(crate) fn process_capture_deinterleaved<T: Sample>(
        &mut self,
        src: &[&[T]],
        dest: &mut [&mut [T]],
    ) {
        self.capture.copy_from_deinterleaved(src);
        self.process_capture_buffer();
        if self.capture_processing_active() {
            self.capture.copy_to_deinterleaved(dest);
        } else {
            for (d, s) in dest.iter_mut().zip(src) {
                d.copy_from_slice(s);
            }
        }
    }

    pub(crate) fn analyze_render_interleaved<T: Sample>(&mut self, samples: &[T]) {
        if self.submodule_states.render_processing_active() {
            self.render.copy_from_interleaved(samples);
            self.analyze_render_buffer();
        }
    }

    pub(crate) fn analyze_render_deinterleaved<T: Sample>(&mut self, src: &[&[T]]) {
        if self.submodule_states.render_processing_active() {
            self.render.copy_from_deinterleaved(src);
            self.analyze_render_buffer();
        }
    }

    fn analyze_render_buffer(&mut self) {
        if let Some(aec) = &mut self.submodules.echo_canceller {
            self.render.split_into_bands();
            aec.process_render(self.render.bands());
        }
        if let Some(red) = &mut self.submodules.echo_detector {
            red.analyze_render(&self.render.channels()[0]);
        }
    }

    fn process_capture_buffer(&mut self) {
        let states = self.submodule_states;
        let submodules = &mut self.submodules;

        if states.capture_processing_active() {
            if let Some(hpf) = &mut submodules.high_pass_filter {
                hpf.process(self.capture.channels_mut());
            }

            if states.capture_multi_band_processing_active() {
                self.capture.split_into_bands();
                if let Some(aec) = &mut submodules.echo_canceller {
                    aec.process_capture(self.capture.bands_mut());
                }
                for (ns, bands) in submodules
                    .noise_suppressors
                    .iter_mut()
                    .zip(self.capture.bands_mut())
                {
                    ns.process(bands);
                }
                self.capture.merge_bands();
            }

            if let Some(red) = &mut submodules.echo_detector {
                red.analyze_capture(&self.capture.channels()[0]);
            }

            if let Some(gc) = &mut submodules.gain_controller {
                gc.process(self.capture.channels_mut());
            }
        }

        for channel in self.capture.channels() {
            self.output_level.analyze(channel);
        }
        let output_level = self.output_level.average();
        self.stats = self.snapshot(output_level);
    }

    fn snapshot(&self, output_level: i32) -> ProcessingStatistics {
        let aec = self.submodules.echo_canceller.as_ref();
        let aec_metrics = aec.map(EchoCanceller::metrics);
        let ns = self.submodules.noise_suppressors.first();
        let gc = self.submodules.gain_controller.as_ref();
        let red = self.submodules.echo_detector.as_ref();

        let residual_echo_likelihood = red
            .map(ResidualEchoDetector::echo_likelihood)
            .or_else(|| aec_metrics.map(|m| m.residual_echo_likelihood));
        let speech_probability = ns.map(NoiseSuppressor::speech_probability);

        ProcessingStatistics {
            echo_detected: aec.is_some_and(EchoCanceller::stream_has_echo),
            residual_echo_likelihood,
            residual_echo_likelihood_recent_max: red
                .map(ResidualEchoDetector::echo_likelihood_recent_max),
            output_rms_dbfs: Some(-(output_level as f32)),
            noise_estimate_dbfs: ns.map(NoiseSuppressor::noise_estimate_dbfs),
            applied_digital_gain_db: gc.map(GainController::applied_gain_db),
            voice_detected: speech_probability.map(|p| p >= VOICE_PROBABILITY_THRESHOLD),
            speech_probability,
            echo_return_loss_db: aec_metrics.and_then(|m| m.echo_return_loss_db),
            echo_return_loss_enhancement_db: aec_metrics
                .and_then(|m| m.echo_return_loss_enhancement_db),
            delay_ms: aec_metrics.map(|m| m.delay_ms),
            recommended_analog_level: gc
                .filter(|_| self.analog_mode())
                .map(GainController::recommended_analog_level),
        }
    }

    fn analog_mode(&self) -> bool {
        self.config
            .gain_controller
            .is_some_and(|gc| gc.mode == GainControlMode::AdaptiveAnalog)
    }

    fn initialize_high_pass_filter(&mut self) {
        self.submodules.high_pass_filter = self.config.high_pass_filter.map(|_| {
            HighPassFilter::new(self.stream.sample_rate_hz(), self.stream.num_channels())
        });
        tracing::debug!(
            enabled = self.submodules.high_pass_filter.is_some(),
            "high-pass filter initialized"
        );
    }

    fn initialize_echo_canceller(&mut self) {
        self.submodules.echo_canceller = self.config.echo_canceller.map(|settings| {
            EchoCanceller::new(
                settings.to_canceller_config(self.config.pipeline),
                self.stream.num_bands(),
                self.stream.band_length(),
                self.stream.num_channels(),
            )
        });
        if let Some(delay_ms) = self.stream_delay_ms {
            self.set_stream_delay_ms(delay_ms);
        }
        tracing::debug!(
            enabled = self.submodules.echo_canceller.is_some(),
            "echo canceller initialized"
        );
    }

    fn initialize_noise_suppressors(&mut self) {
        self.submodules.noise_suppressors = match self.config.noise_suppression {
            Some(settings) => {
                let ns_config = NsConfig {
                    target_level: settings.level.into(),
                    frame_size: self.stream.band_length(),
                    num_bands: self.stream.num_bands(),
                };
                (0..self.stream.num_channels())
                    .map(|_| NoiseSuppressor::new(ns_config))
                    .collect()
            }
            None => Vec::new(),
        };
        tracing::debug!(
            level = ?self.config.noise_suppression.map(|ns| ns.level),
            "noise suppression initialized"
        );
    }

    fn initialize_gain_controller(&mut self) {
        self.submodules.gain_controller = self
            .config
            .gain_controller
            .map(|settings| GainController::new(settings.to_controller_config()));
        if let (Some(gc), Some(level)) =
            (&mut self.submodules.gain_controller, self.applied_analog_level)
        {
            gc.set_applied_analog_level(level);
        }
        tracing::debug!(
            mode = ?self.config.gain_controller.map(|gc| gc.mode),
            "gain controller initialized"
        );
    }

    fn initialize_residual_echo_detector(&mut self) {
        self.submodules.echo_detector =
            self.config.residual_echo_detector.map(|_| ResidualEchoDetector::new());
        tracing::debug!(
            enabled = self.submodules.echo_detector.is_some(),
            "residual echo detector initialized"
        );
    }
}
