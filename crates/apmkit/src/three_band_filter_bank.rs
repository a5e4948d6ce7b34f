//! Three-band FIR filter bank with DCT modulation.
//!
//! A 480-sample frame at 48 kHz is decimated by three into ten polyphase
//! branches. Each branch runs a four-tap sparse FIR and the branch outputs
//! are combined with a cosine modulation into three 160-sample bands
//! covering 0-8, 8-16 and 16-24 kHz. Synthesis is the transpose.

/// Number of bands produced.
pub(crate) const NUM_BANDS: usize = 3;
/// Samples of one full-band frame.
pub(crate) const FULL_BAND_SIZE: usize = 480;
/// Samples of one band.
pub(crate) const SPLIT_BAND_SIZE: usize = FULL_BAND_SIZE / NUM_BANDS;

const SQRT_3: f32 = 1.732_050_8;
const STRIDE: usize = 4;
const FILTER_SIZE: usize = 4;
/// History each branch needs: the reach of the strided taps.
const MEMORY_SIZE: usize = FILTER_SIZE * STRIDE - 1;
const NUM_FILTERS: usize = 10;

#[rustfmt::skip]
const FILTER_COEFFS: [[f32; FILTER_SIZE]; NUM_FILTERS] = [
    [-0.00047749, -0.00496888, 0.16547118,  0.00425496],
    [-0.00173287, -0.01585778, 0.14989004,  0.00994113],
    [-0.00304815, -0.02536082, 0.12154542,  0.01157993],
    [-0.00346946, -0.02587886, 0.04760441,  0.00607594],
    [-0.00154717, -0.01136076, 0.01387458,  0.00186353],
    [ 0.00186353,  0.01387458,-0.01136076, -0.00154717],
    [ 0.00607594,  0.04760441,-0.02587886, -0.00346946],
    [ 0.00983212,  0.08543175,-0.02982767, -0.00383509],
    [ 0.00994113,  0.14989004,-0.01585778, -0.00173287],
    [ 0.00425496,  0.16547118,-0.00496888, -0.00047749],
];

#[rustfmt::skip]
const DCT_MODULATION: [[f32; NUM_BANDS]; NUM_FILTERS] = [
    [ 2.0,     2.0,    2.0],
    [ SQRT_3,  0.0,   -SQRT_3],
    [ 1.0,    -2.0,    1.0],
    [-1.0,     2.0,   -1.0],
    [-SQRT_3,  0.0,    SQRT_3],
    [-2.0,    -2.0,   -2.0],
    [-SQRT_3,  0.0,    SQRT_3],
    [-1.0,     2.0,   -1.0],
    [ 1.0,    -2.0,    1.0],
    [ SQRT_3,  0.0,   -SQRT_3],
];

/// `(phase, shift, filter)` for every non-zero polyphase branch. The phase
/// selects the decimated input (or upsampled output) position, the shift
/// the fractional offset of the strided taps. Combinations 3 and 9 of
/// `phase + 3 * shift` have all-zero filters and are left out.
const BRANCHES: [(usize, usize, usize); NUM_FILTERS] = [
    (0, 0, 0),
    (1, 0, 1),
    (2, 0, 2),
    (1, 1, 3),
    (2, 1, 4),
    (0, 2, 5),
    (1, 2, 6),
    (2, 2, 7),
    (1, 3, 8),
    (2, 3, 9),
];

/// Strided FIR: `out[k] = sum_i filter[i] * x[k - shift - STRIDE * i]`, where
/// `x` is `input` preceded by the branch history in `state`.
fn filter_branch(
    filter: &[f32; FILTER_SIZE],
    input: &[f32; SPLIT_BAND_SIZE],
    shift: usize,
    output: &mut [f32; SPLIT_BAND_SIZE],
    state: &mut [f32; MEMORY_SIZE],
) {
    debug_assert!(shift < STRIDE);
    let mut extended = [0.0f32; MEMORY_SIZE + SPLIT_BAND_SIZE];
    extended[..MEMORY_SIZE].copy_from_slice(state);
    extended[MEMORY_SIZE..].copy_from_slice(input);

    for (k, out) in output.iter_mut().enumerate() {
        let newest = MEMORY_SIZE + k - shift;
        *out = filter
            .iter()
            .enumerate()
            .map(|(i, &c)| c * extended[newest - STRIDE * i])
            .sum();
    }
    state.copy_from_slice(&input[SPLIT_BAND_SIZE - MEMORY_SIZE..]);
}

/// Analysis and synthesis state for one channel.
#[derive(Debug, Clone)]
pub(crate) struct ThreeBandFilterBank {
    analysis_state: [[f32; MEMORY_SIZE]; NUM_FILTERS],
    synthesis_state: [[f32; MEMORY_SIZE]; NUM_FILTERS],
}

impl ThreeBandFilterBank {
    pub(crate) fn new() -> Self {
        Self {
            analysis_state: [[0.0; MEMORY_SIZE]; NUM_FILTERS],
            synthesis_state: [[0.0; MEMORY_SIZE]; NUM_FILTERS],
        }
    }

    /// Split one full-band frame into three bands.
    pub(crate) fn analysis(
        &mut self,
        input: &[f32; FULL_BAND_SIZE],
        bands: &mut [[f32; SPLIT_BAND_SIZE]; NUM_BANDS],
    ) {
        for band in bands.iter_mut() {
            band.fill(0.0);
        }
        let mut decimated = [0.0f32; SPLIT_BAND_SIZE];
        let mut filtered = [0.0f32; SPLIT_BAND_SIZE];
        for &(phase, shift, filter) in &BRANCHES {
            for (k, d) in decimated.iter_mut().enumerate() {
                *d = input[NUM_BANDS - 1 - phase + NUM_BANDS * k];
            }
            filter_branch(
                &FILTER_COEFFS[filter],
                &decimated,
                shift,
                &mut filtered,
                &mut self.analysis_state[filter],
            );
            for (band, &m) in bands.iter_mut().zip(&DCT_MODULATION[filter]) {
                for (b, &f) in band.iter_mut().zip(&filtered) {
                    *b += m * f;
                }
            }
        }
    }

    /// Merge three bands into one full-band frame.
    pub(crate) fn synthesis(
        &mut self,
        bands: &[[f32; SPLIT_BAND_SIZE]; NUM_BANDS],
        output: &mut [f32; FULL_BAND_SIZE],
    ) {
        output.fill(0.0);
        let mut modulated = [0.0f32; SPLIT_BAND_SIZE];
        let mut filtered = [0.0f32; SPLIT_BAND_SIZE];
        for &(phase, shift, filter) in &BRANCHES {
            modulated.fill(0.0);
            for (band, &m) in bands.iter().zip(&DCT_MODULATION[filter]) {
                for (d, &b) in modulated.iter_mut().zip(band) {
                    *d += m * b;
                }
            }
            filter_branch(
                &FILTER_COEFFS[filter],
                &modulated,
                shift,
                &mut filtered,
                &mut self.synthesis_state[filter],
            );
            for (k, &f) in filtered.iter().enumerate() {
                output[phase + NUM_BANDS * k] += NUM_BANDS as f32 * f;
            }
        }
    }
}
