//! Smoothed echo metrics for one capture channel.

/// Weight of a new frame in the ERL and ERLE averages.
const DB_SMOOTHING: f32 = 0.1;
/// Weight of a new frame in the coupling average.
const COUPLING_SMOOTHING: f32 = 0.2;
/// ERLE estimates are bounded to this range in dB.
const ERLE_RANGE_DB: (f32, f32) = (-10.0, 60.0);
/// ERLE that maps the echo likelihood to zero.
const FULL_ERLE_DB: f32 = 20.0;

#[derive(Debug, Clone, Default)]
pub(crate) struct MetricsTracker {
    erl_db: Option<f32>,
    erle_db: Option<f32>,
    coupling: f32,
}

fn smooth(current: Option<f32>, value: f32) -> f32 {
    match current {
        Some(c) => c + DB_SMOOTHING * (value - c),
        None => value,
    }
}

impl MetricsTracker {
    pub(crate) fn update(
        &mut self,
        render_active: bool,
        render_energy: f32,
        capture_energy: f32,
        echo_energy: f32,
        residual_energy: f32,
    ) {
        if !render_active || capture_energy <= 0.0 {
            self.coupling *= 1.0 - COUPLING_SMOOTHING;
            return;
        }
        let erl = 10.0 * (render_energy / capture_energy).max(1e-10).log10();
        self.erl_db = Some(smooth(self.erl_db, erl));

        let erle = 10.0 * (capture_energy / residual_energy.max(1e-10)).log10();
        let erle = erle.clamp(ERLE_RANGE_DB.0, ERLE_RANGE_DB.1);
        self.erle_db = Some(smooth(self.erle_db, erle));

        let coupling = (echo_energy / capture_energy).min(1.0);
        self.coupling += COUPLING_SMOOTHING * (coupling - self.coupling);
    }

    pub(crate) fn erl_db(&self) -> Option<f32> {
        self.erl_db
    }

    pub(crate) fn erle_db(&self) -> Option<f32> {
        self.erle_db
    }

    /// Linear ERLE, never below one.
    pub(crate) fn erle_linear(&self) -> f32 {
        self.erle_db
            .map_or(1.0, |db| 10.0f32.powf(db / 10.0))
            .max(1.0)
    }

    /// Smoothed share of the capture energy explained by the echo estimate.
    pub(crate) fn coupling(&self) -> f32 {
        self.coupling
    }

    /// Likelihood in `[0, 1]` that echo remains after the linear filter.
    pub(crate) fn echo_likelihood(&self) -> f32 {
        let erle = self.erle_db.unwrap_or(0.0);
        (self.coupling * (1.0 - (erle / FULL_ERLE_DB).clamp(0.0, 1.0))).clamp(0.0, 1.0)
    }
}
