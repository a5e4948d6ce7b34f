//! Convergence state machine of one band's echo path model.

/// Residual to capture energy ratio that counts as a well modelled frame.
const CONVERGED_RESIDUAL_RATIO: f32 = 0.1;
/// Consecutive well modelled frames needed to be declared converged.
const CONVERGED_FRAMES: u32 = 20;
/// Consecutive double-talk frames after which a converged model is
/// considered stale.
const DOUBLE_TALK_HANGOVER_FRAMES: u32 = 50;

/// Per-frame observations that drive [`FilterState::next`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameObservation {
    pub render_active: bool,
    pub double_talk: bool,
    pub capture_energy: f32,
    pub residual_energy: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterState {
    /// No render has been seen since the last reset.
    #[default]
    Idle,
    /// Adapting; `good_frames` counts consecutive well modelled frames.
    Converging { good_frames: u32 },
    /// The model explains the echo; `double_talk_frames` counts the current
    /// run of double-talk frames.
    Converged { double_talk_frames: u32 },
    /// The model blew up and was reset this frame.
    Diverged,
}

impl FilterState {
    /// State after a frame described by `observation`.
    pub fn next(self, observation: &FrameObservation) -> Self {
        match self {
            Self::Idle if observation.render_active => Self::Converging { good_frames: 0 },
            Self::Idle => Self::Idle,
            Self::Diverged => Self::Converging { good_frames: 0 },
            Self::Converging { good_frames } => {
                if !observation.render_active {
                    return self;
                }
                let well_modelled = observation.residual_energy
                    < CONVERGED_RESIDUAL_RATIO * observation.capture_energy;
                match (well_modelled, good_frames + 1) {
                    (true, n) if n >= CONVERGED_FRAMES => Self::Converged {
                        double_talk_frames: 0,
                    },
                    (true, n) => Self::Converging { good_frames: n },
                    (false, _) => Self::Converging { good_frames: 0 },
                }
            }
            Self::Converged { double_talk_frames } => {
                if !observation.double_talk {
                    return Self::Converged {
                        double_talk_frames: 0,
                    };
                }
                let n = double_talk_frames + 1;
                if n >= DOUBLE_TALK_HANGOVER_FRAMES {
                    Self::Converging { good_frames: 0 }
                } else {
                    Self::Converged {
                        double_talk_frames: n,
                    }
                }
            }
        }
    }

    /// Whether the model may adapt on an active render frame in this state
    /// given the double-talk flag.
    pub fn allows_adaptation(self, double_talk: bool) -> bool {
        match self {
            Self::Diverged => false,
            Self::Idle | Self::Converging { .. } => true,
            Self::Converged { .. } => !double_talk,
        }
    }

    pub fn is_converged(self) -> bool {
        matches!(self, Self::Converged { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active(capture_energy: f32, residual_energy: f32) -> FrameObservation {
        FrameObservation {
            render_active: true,
            double_talk: false,
            capture_energy,
            residual_energy,
        }
    }

    #[test]
    fn idle_waits_for_render() {
        let state = FilterState::Idle.next(&FrameObservation::default());
        assert_eq!(state, FilterState::Idle);
        assert_eq!(
            state.next(&active(1.0, 1.0)),
            FilterState::Converging { good_frames: 0 }
        );
    }

    #[test]
    fn converges_after_sustained_low_residual() {
        let mut state = FilterState::Converging { good_frames: 0 };
        for _ in 0..CONVERGED_FRAMES - 1 {
            state = state.next(&active(100.0, 1.0));
            assert!(!state.is_converged());
        }
        state = state.next(&active(100.0, 1.0));
        assert!(state.is_converged());
    }

    #[test]
    fn one_bad_frame_restarts_the_count() {
        let mut state = FilterState::Converging { good_frames: 0 };
        for _ in 0..10 {
            state = state.next(&active(100.0, 1.0));
        }
        state = state.next(&active(100.0, 50.0));
        assert_eq!(state, FilterState::Converging { good_frames: 0 });
    }

    #[test]
    fn render_pause_holds_progress() {
        let state = FilterState::Converging { good_frames: 7 };
        assert_eq!(state.next(&FrameObservation::default()), state);
    }

    #[test]
    fn long_double_talk_falls_back_to_converging() {
        let talk = FrameObservation {
            double_talk: true,
            ..active(100.0, 100.0)
        };
        let mut state = FilterState::Converged {
            double_talk_frames: 0,
        };
        for _ in 0..DOUBLE_TALK_HANGOVER_FRAMES - 1 {
            state = state.next(&talk);
            assert!(state.is_converged());
            assert!(!state.allows_adaptation(true));
        }
        state = state.next(&talk);
        assert_eq!(state, FilterState::Converging { good_frames: 0 });
    }

    #[test]
    fn diverged_restarts_convergence() {
        assert_eq!(
            FilterState::Diverged.next(&FrameObservation::default()),
            FilterState::Converging { good_frames: 0 }
        );
        assert!(!FilterState::Diverged.allows_adaptation(false));
    }
}
