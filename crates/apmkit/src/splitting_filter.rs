//! Band splitting for rates above 16 kHz.
//!
//! 32 kHz frames go through a two-band all-pass QMF (320 samples to two
//! bands of 160). 48 kHz frames go through the three-band filter bank.

use apmkit_common_audio::audio_util::{clamp_to_s16_range, flush_denormal};

use crate::three_band_filter_bank::{
    FULL_BAND_SIZE, NUM_BANDS as THREE_BANDS, SPLIT_BAND_SIZE, ThreeBandFilterBank,
};

/// All-pass coefficients of the odd-sample branch.
const ALL_PASS_1: [f32; 3] = [0.097_930_908_2, 0.564_300_537_1, 0.873_733_520_5];
/// All-pass coefficients of the even-sample branch.
const ALL_PASS_2: [f32; 3] = [0.325_515_747_07, 0.748_626_708_98, 0.961_456_298_82];

/// Previous input and output of each of the three first-order sections.
type AllPassState = [[f32; 2]; 3];

/// Three cascaded first-order sections `y[n] = x[n-1] + a (x[n] - y[n-1])`,
/// in place.
fn all_pass_cascade(data: &mut [f32], coefficients: &[f32; 3], state: &mut AllPassState) {
    for (&a, section) in coefficients.iter().zip(state.iter_mut()) {
        let [mut x1, mut y1] = *section;
        for v in data.iter_mut() {
            let x = *v;
            let y = flush_denormal(x1 + a * (x - y1));
            x1 = x;
            y1 = y;
            *v = y;
        }
        *section = [x1, y1];
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TwoBandQmf {
    analysis: [AllPassState; 2],
    synthesis: [AllPassState; 2],
    odd: Vec<f32>,
    even: Vec<f32>,
}

impl TwoBandQmf {
    pub(crate) fn new(band_length: usize) -> Self {
        Self {
            analysis: [[[0.0; 2]; 3]; 2],
            synthesis: [[[0.0; 2]; 3]; 2],
            odd: vec![0.0; band_length],
            even: vec![0.0; band_length],
        }
    }

    pub(crate) fn analysis(&mut self, input: &[f32], low: &mut [f32], high: &mut [f32]) {
        debug_assert_eq!(input.len(), 2 * self.odd.len());
        for ((pair, odd), even) in input
            .chunks_exact(2)
            .zip(self.odd.iter_mut())
            .zip(self.even.iter_mut())
        {
            *even = pair[0];
            *odd = pair[1];
        }
        let [state_odd, state_even] = &mut self.analysis;
        all_pass_cascade(&mut self.odd, &ALL_PASS_1, state_odd);
        all_pass_cascade(&mut self.even, &ALL_PASS_2, state_even);
        for (((l, h), &o), &e) in low
            .iter_mut()
            .zip(high.iter_mut())
            .zip(&self.odd)
            .zip(&self.even)
        {
            *l = (o + e) * 0.5;
            *h = (o - e) * 0.5;
        }
    }

    pub(crate) fn synthesis(&mut self, low: &[f32], high: &[f32], output: &mut [f32]) {
        debug_assert_eq!(output.len(), 2 * self.odd.len());
        for (((o, e), &l), &h) in self
            .odd
            .iter_mut()
            .zip(self.even.iter_mut())
            .zip(low)
            .zip(high)
        {
            *o = l + h;
            *e = l - h;
        }
        let [state_odd, state_even] = &mut self.synthesis;
        all_pass_cascade(&mut self.odd, &ALL_PASS_2, state_odd);
        all_pass_cascade(&mut self.even, &ALL_PASS_1, state_even);
        for ((pair, &o), &e) in output.chunks_exact_mut(2).zip(&self.odd).zip(&self.even) {
            pair[0] = e;
            pair[1] = o;
        }
        clamp_to_s16_range(output);
    }
}

/// Per-channel band splitter.
#[derive(Debug, Clone)]
pub(crate) enum BandSplitter {
    TwoBand(TwoBandQmf),
    ThreeBand(Box<ThreeBandFilterBank>),
}

impl BandSplitter {
    /// Splitter for `num_bands` bands of `band_length`, or `None` when the
    /// stream runs as a single band.
    pub(crate) fn new(num_bands: usize, band_length: usize) -> Option<Self> {
        match num_bands {
            2 => Some(Self::TwoBand(TwoBandQmf::new(band_length))),
            3 => Some(Self::ThreeBand(Box::new(ThreeBandFilterBank::new()))),
            _ => None,
        }
    }

    /// Split `full_band` into `bands`.
    pub(crate) fn analysis(&mut self, full_band: &[f32], bands: &mut [Vec<f32>]) {
        match self {
            Self::TwoBand(qmf) => {
                if let [low, high] = bands {
                    qmf.analysis(full_band, low, high);
                }
            }
            Self::ThreeBand(bank) => {
                let Ok(input) = <&[f32; FULL_BAND_SIZE]>::try_from(full_band) else {
                    return;
                };
                let mut output = [[0.0f32; SPLIT_BAND_SIZE]; THREE_BANDS];
                bank.analysis(input, &mut output);
                for (band, out) in bands.iter_mut().zip(&output) {
                    band.copy_from_slice(out);
                }
            }
        }
    }

    /// Merge `bands` back into `full_band`.
    pub(crate) fn synthesis(&mut self, bands: &[Vec<f32>], full_band: &mut [f32]) {
        match self {
            Self::TwoBand(qmf) => {
                if let [low, high] = bands {
                    qmf.synthesis(low, high, full_band);
                }
            }
            Self::ThreeBand(bank) => {
                let Ok(output) = <&mut [f32; FULL_BAND_SIZE]>::try_from(full_band) else {
                    return;
                };
                let mut input = [[0.0f32; SPLIT_BAND_SIZE]; THREE_BANDS];
                for (inp, band) in input.iter_mut().zip(bands) {
                    inp.copy_from_slice(band);
                }
                bank.synthesis(&input, output);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use super::*;

    fn tone(freq_hz: f32, rate: f32, frame: usize, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq_hz * (frame * len + i) as f32 / rate).sin())
            .collect()
    }

    fn energy(x: &[f32]) -> f32 {
        x.iter().map(|v| v * v).sum()
    }

    #[test]
    fn single_band_rates_have_no_splitter() {
        assert!(BandSplitter::new(1, 160).is_none());
        assert!(BandSplitter::new(1, 80).is_none());
    }

    #[test]
    fn two_band_split_separates_low_and_high() {
        for (freq, low_expected) in [(500.0, true), (12_000.0, false)] {
            let mut splitter = BandSplitter::new(2, 160).unwrap();
            let mut bands = vec![vec![0.0f32; 160]; 2];
            for frame in 0..4 {
                splitter.analysis(&tone(freq, 32_000.0, frame, 320, 4096.0), &mut bands);
            }
            let (low, high) = (energy(&bands[0]), energy(&bands[1]));
            if low_expected {
                assert!(low > 10.0 * high, "{freq} Hz: low {low} high {high}");
            } else {
                assert!(high > 10.0 * low, "{freq} Hz: low {low} high {high}");
            }
        }
    }

    #[test]
    fn two_band_round_trip_preserves_energy() {
        let mut splitter = BandSplitter::new(2, 160).unwrap();
        let mut bands = vec![vec![0.0f32; 160]; 2];
        let mut output = vec![0.0f32; 320];
        let mut input = Vec::new();
        for frame in 0..10 {
            input = tone(1000.0, 32_000.0, frame, 320, 1000.0);
            splitter.analysis(&input, &mut bands);
            splitter.synthesis(&bands, &mut output);
        }
        let ratio = energy(&output) / energy(&input);
        assert!((0.8..1.2).contains(&ratio), "energy ratio {ratio}");
    }

    #[test]
    fn two_band_tail_reaches_exact_zero() {
        let mut splitter = BandSplitter::new(2, 160).unwrap();
        let mut bands = vec![vec![0.0f32; 160]; 2];
        let mut output = vec![0.0f32; 320];
        for frame in 0..10 {
            splitter.analysis(&tone(3000.0, 32_000.0, frame, 320, 30_000.0), &mut bands);
            splitter.synthesis(&bands, &mut output);
        }
        let silence = vec![0.0f32; 320];
        for frame in 0..100 {
            splitter.analysis(&silence, &mut bands);
            splitter.synthesis(&bands, &mut output);
            assert!(output.iter().all(|v| !v.is_subnormal()));
            if frame >= 50 {
                assert!(output.iter().all(|&v| v == 0.0), "frame {frame}");
                assert!(bands.iter().flatten().all(|&v| v == 0.0));
            }
        }
    }

    #[test]
    fn three_band_split_through_the_splitter() {
        let mut splitter = BandSplitter::new(3, 160).unwrap();
        let mut bands = vec![vec![0.0f32; 160]; 3];
        for frame in 0..4 {
            splitter.analysis(&tone(18_000.0, 48_000.0, frame, 480, 8192.0), &mut bands);
        }
        assert!(energy(&bands[2]) > 100.0 * energy(&bands[0]));
        let mut output = vec![0.0f32; 480];
        splitter.synthesis(&bands, &mut output);
        assert!(energy(&output) > 0.0);
    }

    #[test]
    fn zero_input_stays_zero() {
        for num_bands in [2, 3] {
            let mut splitter = BandSplitter::new(num_bands, 160).unwrap();
            let mut bands = vec![vec![1.0f32; 160]; num_bands];
            splitter.analysis(&vec![0.0; 160 * num_bands], &mut bands);
            assert!(bands.iter().flatten().all(|&v| v == 0.0));
            let mut output = vec![1.0f32; 160 * num_bands];
            splitter.synthesis(&bands, &mut output);
            assert!(output.iter().all(|&v| v == 0.0));
        }
    }
}
