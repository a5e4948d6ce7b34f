//! Fixed integer sample delay.

/// Delays a stream by a constant number of samples, processing in place.
#[derive(Debug, Clone)]
pub struct DelayLine {
    memory: Vec<f32>,
    scratch: Vec<f32>,
}

impl DelayLine {
    pub fn new(delay: usize) -> Self {
        Self {
            memory: vec![0.0; delay],
            scratch: Vec::with_capacity(delay),
        }
    }

    pub fn delay(&self) -> usize {
        self.memory.len()
    }

    /// Replace `x` with the stream delayed by [`delay`](Self::delay) samples.
    pub fn process(&mut self, x: &mut [f32]) {
        let delay = self.memory.len();
        if delay == 0 {
            return;
        }
        self.scratch.clear();
        self.scratch.extend_from_slice(&self.memory);
        self.scratch.extend_from_slice(x);
        let len = x.len();
        x.copy_from_slice(&self.scratch[..len]);
        self.memory.copy_from_slice(&self.scratch[len..]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_across_calls() {
        let mut line = DelayLine::new(3);
        let mut a = [1.0, 2.0, 3.0, 4.0];
        line.process(&mut a);
        assert_eq!(a, [0.0, 0.0, 0.0, 1.0]);
        let mut b = [5.0, 6.0];
        line.process(&mut b);
        assert_eq!(b, [2.0, 3.0]);
        let mut c = [0.0; 4];
        line.process(&mut c);
        assert_eq!(c, [4.0, 5.0, 6.0, 0.0]);
    }

    #[test]
    fn zero_delay_is_identity() {
        let mut line = DelayLine::new(0);
        let mut a = [1.0, -1.0];
        line.process(&mut a);
        assert_eq!(a, [1.0, -1.0]);
    }
}
