//! Which pipeline stages are active.
//!
//! Evaluated once per configuration change so the per-frame path only
//! reads flags.

use crate::config::Config;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SubmoduleStates {
    high_pass_filter: bool,
    echo_canceller: bool,
    noise_suppressor: bool,
    gain_controller: bool,
    residual_echo_detector: bool,
}

impl SubmoduleStates {
    /// Take the flags from `config` and return whether any of them changed.
    pub(crate) fn update(&mut self, config: &Config) -> bool {
        let next = Self {
            high_pass_filter: config.high_pass_filter.is_some(),
            echo_canceller: config.echo_canceller.is_some(),
            noise_suppressor: config.noise_suppression.is_some(),
            gain_controller: config.gain_controller.is_some(),
            residual_echo_detector: config.residual_echo_detector.is_some(),
        };
        let changed = next != *self;
        *self = next;
        changed
    }

    /// Whether the capture signal is touched at all.
    pub(crate) fn capture_processing_active(&self) -> bool {
        self.high_pass_filter
            || self.echo_canceller
            || self.noise_suppressor
            || self.gain_controller
            || self.residual_echo_detector
    }

    /// Whether a stage runs on the split-band signal.
    pub(crate) fn capture_multi_band_processing_active(&self) -> bool {
        self.echo_canceller || self.noise_suppressor
    }

    /// Whether render audio feeds any stage.
    pub(crate) fn render_processing_active(&self) -> bool {
        self.echo_canceller || self.residual_echo_detector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_reports_changes_only() {
        let mut states = SubmoduleStates::default();
        assert!(!states.update(&Config::default()));
        assert!(!states.capture_processing_active());

        let mut config = Config::default();
        config.set_noise_suppression_enabled(true);
        assert!(states.update(&config));
        assert!(!states.update(&config));
        assert!(states.capture_multi_band_processing_active());
        assert!(!states.render_processing_active());
    }

    #[test]
    fn gain_control_alone_needs_no_band_split() {
        let mut states = SubmoduleStates::default();
        let mut config = Config::default();
        config.set_gain_control_enabled(true);
        config.set_residual_echo_detector_enabled(true);
        states.update(&config);
        assert!(states.capture_processing_active());
        assert!(!states.capture_multi_band_processing_active());
        assert!(states.render_processing_active());
    }
}
