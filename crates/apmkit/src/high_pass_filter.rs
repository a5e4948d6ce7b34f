//! 80 Hz high-pass filter on the full-band capture signal.

use apmkit_common_audio::cascaded_biquad_filter::{BiQuadCoefficients, CascadedBiQuadFilter};

const CUTOFF_HZ: f32 = 80.0;

/// Fourth-order Butterworth high-pass, one filter per channel.
#[derive(Debug, Clone)]
pub(crate) struct HighPassFilter {
    filters: Vec<CascadedBiQuadFilter>,
}

impl HighPassFilter {
    pub(crate) fn new(sample_rate_hz: u32, num_channels: usize) -> Self {
        let coefficients = BiQuadCoefficients::butterworth_high_pass(CUTOFF_HZ, sample_rate_hz);
        Self {
            filters: (0..num_channels)
                .map(|_| CascadedBiQuadFilter::new(&coefficients))
                .collect(),
        }
    }

    pub(crate) fn process(&mut self, channels: &mut [Vec<f32>]) {
        debug_assert_eq!(channels.len(), self.filters.len());
        for (filter, channel) in self.filters.iter_mut().zip(channels.iter_mut()) {
            filter.process_in_place(channel);
        }
    }
}
