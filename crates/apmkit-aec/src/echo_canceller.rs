//! Multi-band, multi-channel echo canceller.

use apmkit_common_audio::audio_util::{energy, mean_square};

use crate::adaptive_filter::{AdaptiveFilter, FilterOutput};
use crate::config::EchoCancellerConfig;
use crate::delay_estimator::DelayEstimator;
use crate::double_talk::DoubleTalkDetector;
use crate::error::InvalidDelay;
use crate::filter_state::{FilterState, FrameObservation};
use crate::metrics::MetricsTracker;
use crate::render_buffer::RenderRingBuffer;
use crate::suppression_gain::ResidualEchoSuppressor;

/// Render windows below this mean-square power do not drive adaptation.
const RENDER_ACTIVE_POWER: f32 = 100.0;

/// Coupling above which echo is considered present.
const ECHO_COUPLING_THRESHOLD: f32 = 0.2;

/// Snapshot of the canceller's quality metrics, taken from the first
/// capture channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EchoMetrics {
    pub echo_return_loss_db: Option<f32>,
    pub echo_return_loss_enhancement_db: Option<f32>,
    /// Render-to-capture delay currently compensated.
    pub delay_ms: i32,
    /// Likelihood in `[0, 1]` that echo remains in the output.
    pub residual_echo_likelihood: f32,
}

#[derive(Debug)]
struct BandModel {
    filter: AdaptiveFilter,
    state: FilterState,
    double_talk: DoubleTalkDetector,
}

impl BandModel {
    fn reset(&mut self) {
        self.filter.reset();
        self.state = FilterState::Idle;
    }
}

#[derive(Debug)]
struct ChannelState {
    bands: Vec<BandModel>,
    suppressor: Option<ResidualEchoSuppressor>,
    metrics: MetricsTracker,
    echo: Vec<f32>,
    residual: Vec<f32>,
    low_band_echo: Vec<f32>,
}

/// Echo canceller for one stream pair.
///
/// Render frames go in through [`process_render`](Self::process_render),
/// capture frames are cleaned in place by
/// [`process_capture`](Self::process_capture). Frames are split-band:
/// `[channel][band][sample]`. Render must be pushed before the capture frame
/// of the same 10 ms period.
#[derive(Debug)]
pub struct EchoCanceller {
    config: EchoCancellerConfig,
    num_bands: usize,
    band_length: usize,
    render_buffer: RenderRingBuffer,
    delay_estimator: DelayEstimator,
    channels: Vec<ChannelState>,
    render_windows: Vec<Vec<f32>>,
    render_mix: Vec<Vec<f32>>,
    delay_hint_ms: Option<i32>,
    estimated_delay_samples: Option<usize>,
    render_active: bool,
}

impl EchoCanceller {
    /// # Panics
    ///
    /// Panics if `num_bands`, `band_length` or `num_channels` is zero.
    pub fn new(
        config: EchoCancellerConfig,
        num_bands: usize,
        band_length: usize,
        num_channels: usize,
    ) -> Self {
        assert!(
            num_bands > 0 && band_length > 0 && num_channels > 0,
            "empty layout"
        );
        let filter_frames = config.filter_length_frames.max(1);
        let num_taps = filter_frames * band_length;
        let channels = (0..num_channels)
            .map(|_| ChannelState {
                bands: (0..num_bands)
                    .map(|_| BandModel {
                        filter: AdaptiveFilter::new(num_taps, config.step_size),
                        state: FilterState::Idle,
                        double_talk: DoubleTalkDetector::default(),
                    })
                    .collect(),
                suppressor: config.residual_suppression.then(|| {
                    ResidualEchoSuppressor::new(
                        band_length,
                        num_bands,
                        config.suppression_floor,
                        config.over_suppression,
                    )
                }),
                metrics: MetricsTracker::default(),
                echo: vec![0.0; band_length],
                residual: vec![0.0; band_length],
                low_band_echo: vec![0.0; band_length],
            })
            .collect();
        tracing::debug!(
            num_bands,
            band_length,
            num_channels,
            num_taps,
            "echo canceller created"
        );
        Self {
            render_buffer: RenderRingBuffer::new(
                num_bands,
                band_length,
                config.max_delay_ms,
                filter_frames,
            ),
            delay_estimator: DelayEstimator::new(
                band_length,
                config.max_delay_ms,
                config.delay_estimation_interval_frames,
                config.delay_correlation_threshold,
            ),
            channels,
            render_windows: vec![Vec::with_capacity((filter_frames + 1) * band_length); num_bands],
            render_mix: vec![vec![0.0; band_length]; num_bands],
            delay_hint_ms: None,
            estimated_delay_samples: None,
            render_active: false,
            config,
            num_bands,
            band_length,
        }
    }

    pub fn config(&self) -> &EchoCancellerConfig {
        &self.config
    }

    /// Downmix a render frame and store it for the next capture frame.
    pub fn process_render(&mut self, render: &[Vec<Vec<f32>>]) {
        let scale = 1.0 / render.len().max(1) as f32;
        for (b, mix) in self.render_mix.iter_mut().enumerate() {
            mix.fill(0.0);
            for channel in render {
                for (m, &v) in mix.iter_mut().zip(&channel[b]) {
                    *m += v;
                }
            }
            for m in mix.iter_mut() {
                *m *= scale;
            }
        }
        self.render_buffer.push_render_frame(&self.render_mix);
    }

    /// Apply an externally reported render-to-capture delay.
    ///
    /// Only a changed value moves the alignment; the estimator refines it
    /// afterwards.
    pub fn set_stream_delay_ms(&mut self, delay_ms: i32) -> Result<(), InvalidDelay> {
        let delay_samples = self.render_buffer.validate_delay_ms(delay_ms)?;
        if self.delay_hint_ms != Some(delay_ms) {
            self.delay_hint_ms = Some(delay_ms);
            self.apply_delay(delay_samples);
        }
        Ok(())
    }

    /// Remove echo from a capture frame in place.
    ///
    /// # Panics
    ///
    /// Panics if the channel or band layout differs from the one the
    /// canceller was created with.
    pub fn process_capture(&mut self, capture: &mut [Vec<Vec<f32>>]) {
        assert_eq!(
            capture.len(),
            self.channels.len(),
            "capture channel count mismatch"
        );
        let index = self.render_buffer.latest_index().unwrap_or(0);

        if let Some(estimate) = self
            .delay_estimator
            .update(&self.render_buffer.get(index)[0], &capture[0][0])
        {
            self.estimated_delay_samples = Some(estimate.delay_samples);
            self.apply_delay(estimate.delay_samples);
        }

        let filter_frames = self.config.filter_length_frames.max(1);
        for (b, window) in self.render_windows.iter_mut().enumerate() {
            window.clear();
            for lookback in (0..=filter_frames).rev() {
                window.extend_from_slice(&self.render_buffer.get_at_lookback(index, lookback)[b]);
            }
        }
        let render_active = mean_square(&self.render_windows[0]) > RENDER_ACTIVE_POWER;
        let aligned_render_energy = energy(&self.render_buffer.get_aligned_render(index)[0]);
        self.render_active = render_active;

        for (channel, bands) in self.channels.iter_mut().zip(capture.iter_mut()) {
            assert_eq!(bands.len(), self.num_bands, "capture band count mismatch");
            for (b, (model, band)) in channel.bands.iter_mut().zip(bands.iter_mut()).enumerate() {
                let output = cancel_band(
                    model,
                    &self.render_windows[b],
                    band,
                    render_active,
                    &mut channel.echo,
                    &mut channel.residual,
                );
                if b == 0 {
                    channel.low_band_echo.copy_from_slice(&channel.echo);
                    channel.metrics.update(
                        render_active,
                        aligned_render_energy,
                        output.capture_energy,
                        output.echo_energy,
                        output.residual_energy,
                    );
                }
            }
            if let Some(suppressor) = &mut channel.suppressor {
                let erle = channel.metrics.erle_linear();
                suppressor.process(&channel.low_band_echo, bands, erle);
            }
        }
    }

    /// Re-align the render to a delay in band samples.
    fn apply_delay(&mut self, delay_samples: usize) {
        let l = self.band_length;
        let current = self.render_buffer.alignment_frames();
        if (current * l..current * l + 2 * l).contains(&delay_samples) {
            return;
        }
        let target = self.render_buffer.alignment_for_delay(delay_samples);
        self.render_buffer.set_alignment_frames(target);
        let aligned = self.render_buffer.alignment_frames();
        if aligned == current {
            return;
        }
        tracing::debug!(
            from = current,
            to = aligned,
            delay_samples,
            "render alignment changed"
        );
        let taps = l as isize;
        for model in self.channels.iter_mut().flat_map(|c| c.bands.iter_mut()) {
            if aligned == current + 1 {
                model.filter.shift(-taps);
            } else if aligned + 1 == current {
                model.filter.shift(taps);
            } else {
                model.reset();
            }
        }
    }

    /// Whether echo is currently audible in the capture signal.
    pub fn stream_has_echo(&self) -> bool {
        self.render_active
            && self.channels.iter().any(|c| {
                c.metrics.coupling() > ECHO_COUPLING_THRESHOLD
                    && !c.bands[0].state.is_converged()
            })
    }

    pub fn metrics(&self) -> EchoMetrics {
        let metrics = &self.channels[0].metrics;
        let delay_samples = self
            .estimated_delay_samples
            .unwrap_or(self.render_buffer.alignment_frames() * self.band_length);
        EchoMetrics {
            echo_return_loss_db: metrics.erl_db(),
            echo_return_loss_enhancement_db: metrics.erle_db(),
            delay_ms: i32::try_from(delay_samples * 10 / self.band_length).unwrap_or(i32::MAX),
            residual_echo_likelihood: metrics.echo_likelihood(),
        }
    }

    /// State of the echo path model of `band` on `channel`.
    pub fn filter_state(&self, channel: usize, band: usize) -> Option<FilterState> {
        self.channels.get(channel)?.bands.get(band).map(|m| m.state)
    }

    pub fn alignment_frames(&self) -> usize {
        self.render_buffer.alignment_frames()
    }
}

/// Run the echo path model of one band and write the residual into `band`.
fn cancel_band(
    model: &mut BandModel,
    render_window: &[f32],
    band: &mut [f32],
    render_active: bool,
    echo: &mut [f32],
    residual: &mut [f32],
) -> FilterOutput {
    let capture_energy = energy(band);
    if capture_energy == 0.0 {
        echo.fill(0.0);
        return FilterOutput::default();
    }

    let mut double_talk = false;
    let mut output = if model.state.is_converged() {
        let output = model.filter.process(render_window, band, false, echo, residual);
        double_talk = model
            .double_talk
            .update(render_active, output.echo_energy, output.residual_energy);
        output
    } else {
        FilterOutput::default()
    };
    if !model.state.is_converged() || (render_active && !double_talk) {
        let adapt = render_active && model.state.allows_adaptation(double_talk);
        output = model.filter.process(render_window, band, adapt, echo, residual);
    }

    if let Err(err) = model.filter.check_divergence(&output, band.len()) {
        tracing::warn!(%err, "resetting echo path model");
        model.filter.reset();
        model.state = FilterState::Diverged;
        echo.fill(0.0);
        return FilterOutput {
            capture_energy,
            echo_energy: 0.0,
            residual_energy: capture_energy,
        };
    }

    model.state = model.state.next(&FrameObservation {
        render_active,
        double_talk,
        capture_energy: output.capture_energy,
        residual_energy: output.residual_energy,
    });
    band.copy_from_slice(residual);
    output
}
