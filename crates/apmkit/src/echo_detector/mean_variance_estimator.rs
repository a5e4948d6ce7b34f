//! Exponentially smoothed mean and variance.

const ALPHA: f32 = 0.001;

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct MeanVarianceEstimator {
    mean: f32,
    variance: f32,
}

impl MeanVarianceEstimator {
    pub(crate) fn update(&mut self, value: f32) {
        self.mean += ALPHA * (value - self.mean);
        let deviation = value - self.mean;
        self.variance += ALPHA * (deviation * deviation - self.variance);
    }

    pub(crate) fn mean(&self) -> f32 {
        self.mean
    }

    pub(crate) fn std_deviation(&self) -> f32 {
        self.variance.max(0.0).sqrt()
    }
}
