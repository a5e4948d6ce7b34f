//! Windowed maximum that decays once the peak leaves the window.

const DECAY_FACTOR: f32 = 0.99;

#[derive(Debug, Clone)]
pub(crate) struct MovingMax {
    max: f32,
    frames_since_max: usize,
    window_size: usize,
}

impl MovingMax {
    pub(crate) fn new(window_size: usize) -> Self {
        Self {
            max: 0.0,
            frames_since_max: 0,
            window_size: window_size.max(1),
        }
    }

    pub(crate) fn update(&mut self, value: f32) {
        if self.frames_since_max + 1 >= self.window_size {
            self.max *= DECAY_FACTOR;
        } else {
            self.frames_since_max += 1;
        }
        if value > self.max {
            self.max = value;
            self.frames_since_max = 0;
        }
    }

    pub(crate) fn max(&self) -> f32 {
        self.max
    }
}
