//! Energy-ratio double-talk detection.

/// Residual energy above this multiple of the echo estimate means near-end
/// speech is present.
const DOUBLE_TALK_RATIO: f32 = 4.0;

/// Frames the decision is held after the last detection.
const HANGOVER_FRAMES: u32 = 5;

/// Flags frames where near-end speech overlaps the echo.
///
/// Only meaningful once the model predicts the echo well; before that a
/// large residual is just unmodelled echo.
#[derive(Debug, Clone, Default)]
pub(crate) struct DoubleTalkDetector {
    hangover: u32,
}

impl DoubleTalkDetector {
    pub(crate) fn update(
        &mut self,
        render_active: bool,
        echo_energy: f32,
        residual_energy: f32,
    ) -> bool {
        if render_active && residual_energy > DOUBLE_TALK_RATIO * echo_energy {
            self.hangover = HANGOVER_FRAMES;
        } else {
            self.hangover = self.hangover.saturating_sub(1);
        }
        self.hangover > 0
    }
}
