//! Residual echo detector.
//!
//! Correlates the per-frame power of the capture output with the render
//! power at every lag up to 6.5 s. The maximum normalized covariance,
//! weighted by a reliability that ramps up over the first seconds, is the
//! likelihood that echo is still audible after processing.

use crate::echo_detector::circular_buffer::CircularBuffer;
use crate::echo_detector::mean_variance_estimator::MeanVarianceEstimator;
use crate::echo_detector::moving_max::MovingMax;
use crate::echo_detector::normalized_covariance_estimator::NormalizedCovarianceEstimator;

const LOOKBACK_FRAMES: usize = 650;
/// Render powers waiting for their capture frame.
const RENDER_BUFFER_SIZE: usize = 30;
const RELIABILITY_ALPHA: f32 = 0.001;
/// 10 s of frames.
const RECENT_MAX_WINDOW: usize = 1000;

fn power(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    frame.iter().map(|v| v * v).sum::<f32>() / frame.len() as f32
}

/// Render power at one lag, with the render statistics seen when it arrived.
#[derive(Debug, Clone, Copy, Default)]
struct RenderEntry {
    power: f32,
    mean: f32,
    std_deviation: f32,
}

#[derive(Debug)]
pub(crate) struct ResidualEchoDetector {
    first_capture: bool,
    render_queue: CircularBuffer,
    frames_since_queue_empty: usize,
    history: Vec<RenderEntry>,
    next_insertion: usize,
    covariances: Vec<NormalizedCovarianceEstimator>,
    render_statistics: MeanVarianceEstimator,
    capture_statistics: MeanVarianceEstimator,
    likelihood: f32,
    reliability: f32,
    recent_max: MovingMax,
}

impl Default for ResidualEchoDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ResidualEchoDetector {
    pub(crate) fn new() -> Self {
        Self {
            first_capture: true,
            render_queue: CircularBuffer::new(RENDER_BUFFER_SIZE),
            frames_since_queue_empty: 0,
            history: vec![RenderEntry::default(); LOOKBACK_FRAMES],
            next_insertion: 0,
            covariances: vec![NormalizedCovarianceEstimator::default(); LOOKBACK_FRAMES],
            render_statistics: MeanVarianceEstimator::default(),
            capture_statistics: MeanVarianceEstimator::default(),
            likelihood: 0.0,
            reliability: 0.0,
            recent_max: MovingMax::new(RECENT_MAX_WINDOW),
        }
    }

    /// Queue the power of one render frame.
    pub(crate) fn analyze_render(&mut self, frame: &[f32]) {
        // A queue that never drains means render runs faster than capture:
        // drop one entry per buffer length to stay aligned.
        if self.render_queue.is_empty() {
            self.frames_since_queue_empty = 0;
        } else if self.frames_since_queue_empty >= RENDER_BUFFER_SIZE {
            self.render_queue.pop();
            self.frames_since_queue_empty = 0;
        }
        self.frames_since_queue_empty += 1;
        self.render_queue.push(power(frame));
    }

    /// Correlate one processed capture frame against the render history.
    pub(crate) fn analyze_capture(&mut self, frame: &[f32]) {
        if self.first_capture {
            // Render queued before capture started belongs to no capture frame.
            self.render_queue.clear();
            self.first_capture = false;
        }
        let Some(render_power) = self.render_queue.pop() else {
            return;
        };

        self.render_statistics.update(render_power);
        self.history[self.next_insertion] = RenderEntry {
            power: render_power,
            mean: self.render_statistics.mean(),
            std_deviation: self.render_statistics.std_deviation(),
        };

        let capture_power = power(frame);
        self.capture_statistics.update(capture_power);
        let capture_moments = (
            self.capture_statistics.mean(),
            self.capture_statistics.std_deviation(),
        );

        // Lag 0 is the newest render entry; walk backwards through history.
        let newest_first = self.history[..=self.next_insertion]
            .iter()
            .rev()
            .chain(self.history[self.next_insertion + 1..].iter().rev());
        let mut likelihood = 0.0f32;
        for (covariance, entry) in self.covariances.iter_mut().zip(newest_first) {
            covariance.update(
                capture_power,
                capture_moments,
                entry.power,
                (entry.mean, entry.std_deviation),
            );
            likelihood = likelihood.max(covariance.normalized_cross_correlation());
        }

        self.reliability += RELIABILITY_ALPHA * (1.0 - self.reliability);
        self.likelihood = (likelihood * self.reliability).min(1.0);
        self.recent_max.update(self.likelihood);
        self.next_insertion = (self.next_insertion + 1) % LOOKBACK_FRAMES;
    }

    /// Likelihood in `[0, 1]` that the last capture frame carries echo.
    pub(crate) fn echo_likelihood(&self) -> f32 {
        self.likelihood
    }

    /// Maximum likelihood over the last 10 s.
    pub(crate) fn echo_likelihood_recent_max(&self) -> f32 {
        self.recent_max.max()
    }

    #[cfg(test)]
    fn set_reliability(&mut self, reliability: f32) {
        self.reliability = reliability;
    }
}
