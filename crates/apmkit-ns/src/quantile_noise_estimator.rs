//! Quantile-based noise floor tracking.
//!
//! Three trackers follow a low quantile of the log magnitude spectrum, each
//! restarted on a staggered schedule of [`LONG_STARTUP_PHASE_BLOCKS`] frames.
//! When a tracker completes a cycle its estimate becomes the published noise
//! spectrum, so the floor follows slow changes while a burst of speech never
//! lasts long enough to be mistaken for noise.

use std::array;

use crate::config::LONG_STARTUP_PHASE_BLOCKS;

/// Number of simultaneous quantile estimates.
const SIMULT: usize = 3;

/// Half width of the density estimation window in the log domain.
const WIDTH: f32 = 0.01;

#[derive(Debug)]
pub(crate) struct QuantileNoiseEstimator {
    num_bins: usize,
    /// Density estimates, `[SIMULT][num_bins]` flattened.
    density: Vec<f32>,
    /// Log-domain quantile estimates, `[SIMULT][num_bins]` flattened.
    log_quantile: Vec<f32>,
    /// Published noise spectrum (linear magnitude).
    quantile: Vec<f32>,
    counter: [i32; SIMULT],
    num_updates: i32,
}

impl QuantileNoiseEstimator {
    pub(crate) fn new(num_bins: usize) -> Self {
        let counter = array::from_fn(|i| {
            (LONG_STARTUP_PHASE_BLOCKS as f32 * (i as f32 + 1.0) / SIMULT as f32).floor() as i32
        });
        Self {
            num_bins,
            density: vec![0.3; SIMULT * num_bins],
            log_quantile: vec![8.0; SIMULT * num_bins],
            quantile: vec![0.0; num_bins],
            counter,
            num_updates: 1,
        }
    }

    /// Update the trackers with `signal_spectrum` and write the current noise
    /// estimate into `noise_spectrum`.
    pub(crate) fn estimate(&mut self, signal_spectrum: &[f32], noise_spectrum: &mut [f32]) {
        debug_assert_eq!(signal_spectrum.len(), self.num_bins);
        let n = self.num_bins;
        let mut publish: Option<usize> = None;

        for s in 0..SIMULT {
            let k = s * n;
            let one_by_counter_plus_1 = 1.0 / (self.counter[s] as f32 + 1.0);
            let log_quantile = &mut self.log_quantile[k..k + n];
            let density = &mut self.density[k..k + n];

            for ((&magnitude, q), d) in signal_spectrum
                .iter()
                .zip(log_quantile.iter_mut())
                .zip(density.iter_mut())
            {
                let log_spectrum = magnitude.ln();
                let delta = if *d > 1.0 { 40.0 / *d } else { 40.0 };
                let multiplier = delta * one_by_counter_plus_1;
                if log_spectrum > *q {
                    *q += 0.25 * multiplier;
                } else {
                    *q -= 0.75 * multiplier;
                }

                if (log_spectrum - *q).abs() < WIDTH {
                    *d = (self.counter[s] as f32 * *d + 1.0 / (2.0 * WIDTH))
                        * one_by_counter_plus_1;
                }
            }

            if self.counter[s] >= LONG_STARTUP_PHASE_BLOCKS {
                self.counter[s] = 0;
                if self.num_updates >= LONG_STARTUP_PHASE_BLOCKS {
                    publish = Some(k);
                }
            }
            self.counter[s] += 1;
        }

        // During startup publish the tracker closest to completing its cycle.
        if self.num_updates < LONG_STARTUP_PHASE_BLOCKS {
            publish = Some(n * (SIMULT - 1));
            self.num_updates += 1;
        }

        if let Some(start) = publish {
            for (out, &q) in self
                .quantile
                .iter_mut()
                .zip(&self.log_quantile[start..start + n])
            {
                *out = q.exp();
            }
        }

        noise_spectrum.copy_from_slice(&self.quantile);
    }
}
