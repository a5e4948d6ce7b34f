//! Bounded FIFO of render powers.

use std::collections::VecDeque;

/// FIFO that forgets its oldest value when full.
#[derive(Debug, Clone)]
pub(crate) struct CircularBuffer {
    values: VecDeque<f32>,
    capacity: usize,
}

impl CircularBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn push(&mut self, value: f32) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub(crate) fn pop(&mut self) -> Option<f32> {
        self.values.pop_front()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_insertion_order() {
        let mut buf = CircularBuffer::new(3);
        buf.push(1.0);
        buf.push(2.0);
        assert_eq!(buf.pop(), Some(1.0));
        assert_eq!(buf.pop(), Some(2.0));
        assert_eq!(buf.pop(), None);
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut buf = CircularBuffer::new(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            buf.push(v);
        }
        assert_eq!(buf.pop(), Some(2.0));
        assert_eq!(buf.pop(), Some(3.0));
        assert_eq!(buf.pop(), Some(4.0));
        assert!(buf.is_empty());
    }

    #[test]
    fn clear_empties() {
        let mut buf = CircularBuffer::new(2);
        buf.push(5.0);
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.pop(), None);
    }
}
