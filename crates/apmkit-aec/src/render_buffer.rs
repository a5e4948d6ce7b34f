//! Ring buffer of recent render frames.
//!
//! Frames are keyed by a monotonically increasing `u64` index. A lookup for
//! an index that was never pushed or has already been evicted returns a
//! shared all-zero frame, so missing render behaves exactly like silence.

use crate::error::InvalidDelay;

#[derive(derive_more::Debug)]
pub struct RenderRingBuffer {
    num_bands: usize,
    band_length: usize,
    max_delay_ms: i32,
    alignment_frames: usize,
    next_index: u64,
    #[debug(skip)]
    slots: Vec<Slot>,
    #[debug(skip)]
    zero_frame: Vec<Vec<f32>>,
}

#[derive(Debug, Clone)]
struct Slot {
    index: Option<u64>,
    bands: Vec<Vec<f32>>,
}

impl RenderRingBuffer {
    /// Buffer holding enough frames to look `max_delay_ms` plus
    /// `filter_length_frames` back.
    pub fn new(
        num_bands: usize,
        band_length: usize,
        max_delay_ms: i32,
        filter_length_frames: usize,
    ) -> Self {
        let max_delay_frames = usize::try_from(max_delay_ms / 10).unwrap_or(0);
        let capacity = max_delay_frames + filter_length_frames + 2;
        let zero_frame = vec![vec![0.0; band_length]; num_bands];
        Self {
            num_bands,
            band_length,
            max_delay_ms,
            alignment_frames: 0,
            next_index: 0,
            slots: vec![
                Slot {
                    index: None,
                    bands: zero_frame.clone(),
                };
                capacity
            ],
            zero_frame,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Store one split-band render frame, evicting the oldest when full.
    /// Returns the index assigned to the frame.
    ///
    /// # Panics
    ///
    /// Panics if the band count or band length differs from the layout the
    /// buffer was created with.
    pub fn push_render_frame(&mut self, bands: &[Vec<f32>]) -> u64 {
        assert_eq!(bands.len(), self.num_bands, "render band count mismatch");
        let index = self.next_index;
        let capacity = self.slots.len() as u64;
        let slot = &mut self.slots[(index % capacity) as usize];
        for (dst, src) in slot.bands.iter_mut().zip(bands) {
            assert_eq!(src.len(), self.band_length, "render band length mismatch");
            dst.copy_from_slice(src);
        }
        slot.index = Some(index);
        self.next_index += 1;
        index
    }

    /// Index of the most recently pushed frame.
    pub fn latest_index(&self) -> Option<u64> {
        self.next_index.checked_sub(1)
    }

    /// Frame stored under `index`, or the zero frame.
    pub fn get(&self, index: u64) -> &[Vec<f32>] {
        let capacity = self.slots.len() as u64;
        let slot = &self.slots[(index % capacity) as usize];
        if slot.index == Some(index) {
            &slot.bands
        } else {
            &self.zero_frame
        }
    }

    /// Frame `lookback` frames before the one aligned with
    /// `capture_frame_index`.
    pub fn get_at_lookback(&self, capture_frame_index: u64, lookback: usize) -> &[Vec<f32>] {
        match capture_frame_index.checked_sub((self.alignment_frames + lookback) as u64) {
            Some(index) => self.get(index),
            None => &self.zero_frame,
        }
    }

    /// Render frame aligned with the capture frame `capture_frame_index`.
    pub fn get_aligned_render(&self, capture_frame_index: u64) -> &[Vec<f32>] {
        self.get_at_lookback(capture_frame_index, 0)
    }

    /// Check a delay without applying it. Returns the delay in band
    /// samples.
    pub fn validate_delay_ms(&self, delay_ms: i32) -> Result<usize, InvalidDelay> {
        if !(0..=self.max_delay_ms).contains(&delay_ms) {
            return Err(InvalidDelay {
                delay_ms,
                max_delay_ms: self.max_delay_ms,
            });
        }
        let delay_ms = usize::try_from(delay_ms).unwrap_or(0);
        Ok(delay_ms * self.band_length / 10)
    }

    /// Alignment, in frames, that places a render-to-capture delay of
    /// `delay_samples` inside the filter window.
    ///
    /// The aligned frame sits one frame ahead of the delay so the intra-frame
    /// offset is covered by the filter taps.
    pub fn alignment_for_delay(&self, delay_samples: usize) -> usize {
        let max = usize::try_from(self.max_delay_ms / 10).unwrap_or(0);
        (delay_samples / self.band_length).saturating_sub(1).min(max)
    }

    pub fn alignment_frames(&self) -> usize {
        self.alignment_frames
    }

    /// Set the alignment directly, capped at the maximum delay.
    pub fn set_alignment_frames(&mut self, frames: usize) {
        let max = usize::try_from(self.max_delay_ms / 10).unwrap_or(0);
        self.alignment_frames = frames.min(max);
    }

    pub fn max_delay_ms(&self) -> i32 {
        self.max_delay_ms
    }

    pub fn num_bands(&self) -> usize {
        self.num_bands
    }

    pub fn band_length(&self) -> usize {
        self.band_length
    }
}
