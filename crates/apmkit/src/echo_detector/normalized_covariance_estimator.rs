//! Running Pearson correlation between two signals.

const ALPHA: f32 = 0.001;
const SIGMA_FLOOR: f32 = 0.0001;

/// `(mean, standard deviation)` of one input at the current sample.
pub(crate) type Moments = (f32, f32);

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct NormalizedCovarianceEstimator {
    covariance: f32,
    correlation: f32,
}

impl NormalizedCovarianceEstimator {
    pub(crate) fn update(
        &mut self,
        x: f32,
        (x_mean, x_sigma): Moments,
        y: f32,
        (y_mean, y_sigma): Moments,
    ) {
        self.covariance += ALPHA * ((x - x_mean) * (y - y_mean) - self.covariance);
        self.correlation = self.covariance / (x_sigma * y_sigma + SIGMA_FLOOR);
    }

    pub(crate) fn normalized_cross_correlation(&self) -> f32 {
        self.correlation
    }
}
