//! Render-to-capture delay estimation.
//!
//! Both signals are decimated to about 4 kHz. Every
//! `interval_frames` frames the normalized cross correlation between the
//! latest capture window and the render history is evaluated at every lag up
//! to the maximum delay. A lag is accepted once two consecutive evaluations
//! agree on it and its correlation exceeds the threshold.

use crate::decimator::{DECIMATED_RATE_HZ, Decimator};

/// Mean-square power below which a window carries no usable signal.
const MIN_WINDOW_POWER: f64 = 100.0;

/// Largest lag difference, in decimated samples, at which two estimates
/// still confirm each other.
const CONFIRMATION_TOLERANCE: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayEstimate {
    /// Delay in samples at the band rate.
    pub delay_samples: usize,
    /// Normalized correlation at the estimated lag.
    pub correlation: f32,
}

#[derive(derive_more::Debug)]
pub struct DelayEstimator {
    render_decimator: Decimator,
    capture_decimator: Decimator,
    max_lag: usize,
    window: usize,
    #[debug(skip)]
    render_history: Vec<f32>,
    #[debug(skip)]
    capture_history: Vec<f32>,
    #[debug(skip)]
    scratch: Vec<f32>,
    interval_frames: usize,
    frames_since_estimate: usize,
    threshold: f32,
    candidate: Option<usize>,
    estimate: Option<DelayEstimate>,
}

impl DelayEstimator {
    pub fn new(
        band_length: usize,
        max_delay_ms: i32,
        interval_frames: usize,
        threshold: f32,
    ) -> Self {
        let band_rate_hz = band_length * 100;
        let render_decimator = Decimator::new(band_rate_hz);
        let factor = render_decimator.factor();
        let decimated_frame = band_length / factor;
        let interval_frames = interval_frames.max(1);
        let max_lag = usize::try_from(max_delay_ms).unwrap_or(0) * DECIMATED_RATE_HZ / 1000;
        let window = interval_frames * decimated_frame;
        Self {
            render_decimator,
            capture_decimator: Decimator::new(band_rate_hz),
            max_lag,
            window,
            render_history: vec![0.0; max_lag + window],
            capture_history: vec![0.0; window],
            scratch: Vec::with_capacity(decimated_frame),
            interval_frames,
            frames_since_estimate: 0,
            threshold,
            candidate: None,
            estimate: None,
        }
    }

    /// Feed one frame of the lowest band of render and capture.
    ///
    /// Returns the new estimate when an evaluation accepts a delay that
    /// differs from the current one.
    pub fn update(&mut self, render: &[f32], capture: &[f32]) -> Option<DelayEstimate> {
        self.scratch.clear();
        self.render_decimator.decimate(render, &mut self.scratch);
        push_history(&mut self.render_history, &self.scratch);
        self.scratch.clear();
        self.capture_decimator.decimate(capture, &mut self.scratch);
        push_history(&mut self.capture_history, &self.scratch);

        self.frames_since_estimate += 1;
        if self.frames_since_estimate < self.interval_frames {
            return None;
        }
        self.frames_since_estimate = 0;

        let Some((lag, correlation)) = self.best_lag() else {
            self.candidate = None;
            return None;
        };
        let confirmed = self
            .candidate
            .is_some_and(|previous| previous.abs_diff(lag) <= CONFIRMATION_TOLERANCE);
        self.candidate = Some(lag);
        if !confirmed {
            return None;
        }

        let estimate = DelayEstimate {
            delay_samples: lag * self.render_decimator.factor(),
            correlation,
        };
        let changed = self
            .estimate
            .is_none_or(|current| current.delay_samples != estimate.delay_samples);
        self.estimate = Some(estimate);
        if changed {
            tracing::debug!(
                delay_samples = estimate.delay_samples,
                correlation,
                "delay estimate accepted"
            );
            Some(estimate)
        } else {
            None
        }
    }

    /// Lag with the highest normalized correlation above the threshold.
    fn best_lag(&self) -> Option<(usize, f32)> {
        let w = self.window;
        let capture = &self.capture_history;
        let render = &self.render_history;
        let capture_energy: f64 = capture.iter().map(|&v| f64::from(v) * f64::from(v)).sum();
        let min_energy = MIN_WINDOW_POWER * w as f64;
        if capture_energy < min_energy {
            return None;
        }

        let end = render.len();
        let mut render_energy: f64 = render[end - w..]
            .iter()
            .map(|&v| f64::from(v) * f64::from(v))
            .sum();
        let mut best: Option<(usize, f32)> = None;
        for lag in 0..=self.max_lag {
            let start = end - w - lag;
            if lag > 0 {
                let entering = f64::from(render[start]);
                let leaving = f64::from(render[start + w]);
                render_energy = (render_energy + entering * entering - leaving * leaving).max(0.0);
            }
            if render_energy < min_energy {
                continue;
            }
            let dot: f64 = capture
                .iter()
                .zip(&render[start..start + w])
                .map(|(&c, &r)| f64::from(c) * f64::from(r))
                .sum();
            let correlation = (dot.abs() / (capture_energy * render_energy).sqrt()) as f32;
            if correlation > self.threshold && best.is_none_or(|(_, c)| correlation > c) {
                best = Some((lag, correlation));
            }
        }
        best
    }

    /// Most recently accepted estimate.
    pub fn estimate(&self) -> Option<DelayEstimate> {
        self.estimate
    }
}

/// Shift `history` left by `new.len()` samples and append `new`.
fn push_history(history: &mut [f32], new: &[f32]) {
    let n = new.len().min(history.len());
    let len = history.len();
    history.copy_within(n.., 0);
    history[len - n..].copy_from_slice(&new[new.len() - n..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic white noise in `[-amplitude, amplitude]`.
    fn noise(len: usize, seed: u32, amplitude: f32) -> Vec<f32> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                ((state >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0) * amplitude
            })
            .collect()
    }

    fn run(delay_samples: usize, frames: usize) -> (Option<DelayEstimate>, Vec<usize>) {
        let band_length = 160;
        let render = noise((frames + 1) * band_length, 7, 3000.0);
        let mut estimator = DelayEstimator::new(band_length, 500, 25, 0.3);
        let mut accepted = Vec::new();
        for f in 0..frames {
            let r = &render[f * band_length..(f + 1) * band_length];
            let capture: Vec<f32> = (0..band_length)
                .map(|j| {
                    let t = f * band_length + j;
                    t.checked_sub(delay_samples).map_or(0.0, |i| 0.5 * render[i])
                })
                .collect();
            if let Some(estimate) = estimator.update(r, &capture) {
                accepted.push(f);
                assert_eq!(Some(estimate), estimator.estimate());
            }
        }
        (estimator.estimate(), accepted)
    }

    #[test]
    fn finds_short_delay_after_confirmation() {
        let (estimate, accepted) = run(600, 60);
        let estimate = estimate.map(|e| e.delay_samples);
        assert!(estimate.is_some_and(|d| d.abs_diff(600) <= 4), "{estimate:?}");
        assert_eq!(accepted, vec![49]);
    }

    #[test]
    fn finds_long_delay() {
        let (estimate, _) = run(2400, 120);
        let estimate = estimate.map(|e| e.delay_samples);
        assert!(estimate.is_some_and(|d| d.abs_diff(2400) <= 4), "{estimate:?}");
    }

    #[test]
    fn uncorrelated_signals_give_no_estimate() {
        let band_length = 160;
        let render = noise(100 * band_length, 1, 3000.0);
        let capture = noise(100 * band_length, 2, 3000.0);
        let mut estimator = DelayEstimator::new(band_length, 500, 25, 0.3);
        for f in 0..100 {
            let range = f * band_length..(f + 1) * band_length;
            assert_eq!(
                estimator.update(&render[range.clone()], &capture[range]),
                None
            );
        }
        assert_eq!(estimator.estimate(), None);
    }

    #[test]
    fn silence_gives_no_estimate() {
        let mut estimator = DelayEstimator::new(80, 500, 25, 0.3);
        for _ in 0..100 {
            assert_eq!(estimator.update(&[0.0; 80], &[0.0; 80]), None);
        }
    }

    #[test]
    fn history_push_shifts_left() {
        let mut history = [1.0, 2.0, 3.0, 4.0];
        push_history(&mut history, &[5.0, 6.0]);
        assert_eq!(history, [3.0, 4.0, 5.0, 6.0]);
    }
}
