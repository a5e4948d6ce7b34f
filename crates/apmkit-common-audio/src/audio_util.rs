//! Sample format conversions and level helpers.
//!
//! # Format conventions
//!
//! | Name      | Type    | Range                          |
//! |-----------|---------|--------------------------------|
//! | S16       | `i16`   | \[-32768, 32767\]              |
//! | Float     | `f32`   | \[-1.0, 1.0\]                  |
//! | FloatS16  | `f32`   | \[-32768.0, 32768.0\]          |
//! | Dbfs      | `f32`   | \[-90.31, 0\] (approx)         |
//!
//! Every processing stage works on FloatS16.

/// Minimum value of a FloatS16 sample.
pub const MIN_FLOAT_S16_VALUE: f32 = -32768.0;
/// Maximum value of a FloatS16 sample that still fits S16.
pub const MAX_FLOAT_S16_VALUE: f32 = 32767.0;
/// Full-scale magnitude of a FloatS16 sample.
pub const MAX_ABS_FLOAT_S16_VALUE: f32 = 32768.0;
/// Level of one S16 step relative to full scale (`20 * log10(1 / 32768)`).
pub const MIN_DBFS: f32 = -90.309;

/// Magnitude below which recursive filter state is flushed to zero.
pub const DENORMAL_FLOOR: f32 = 1e-30;

const S16_TO_FLOAT_SCALING: f32 = 1.0 / 32768.0;

// ── Scalar conversions ──────────────────────────────────────────────

#[inline]
pub fn s16_to_float_s16(v: i16) -> f32 {
    f32::from(v)
}

/// Round a FloatS16 sample to S16, saturating at the type limits.
#[inline]
pub fn float_s16_to_s16(v: f32) -> i16 {
    let v = v.clamp(MIN_FLOAT_S16_VALUE, MAX_FLOAT_S16_VALUE);
    (v + f32::copysign(0.5, v)) as i16
}

/// Scale a Float sample to FloatS16, clamping to \[-1, 1\] first.
#[inline]
pub fn float_to_float_s16(v: f32) -> f32 {
    v.clamp(-1.0, 1.0) * MAX_ABS_FLOAT_S16_VALUE
}

#[inline]
pub fn float_s16_to_float(v: f32) -> f32 {
    v.clamp(MIN_FLOAT_S16_VALUE, MAX_ABS_FLOAT_S16_VALUE) * S16_TO_FLOAT_SCALING
}

// ── Levels ──────────────────────────────────────────────────────────

/// `10^(v / 20)`.
#[inline]
pub fn db_to_ratio(v: f32) -> f32 {
    10.0_f32.powf(v / 20.0)
}

#[inline]
pub fn dbfs_to_float_s16(v: f32) -> f32 {
    db_to_ratio(v) * MAX_ABS_FLOAT_S16_VALUE
}

/// Convert a FloatS16 amplitude (>= 0) to dBFS.
#[inline]
pub fn float_s16_to_dbfs(v: f32) -> f32 {
    debug_assert!(v >= 0.0);
    if v <= 1.0 {
        return MIN_DBFS;
    }
    20.0 * v.log10() + MIN_DBFS
}

/// Convert a mean-square FloatS16 power to dBFS, floored at [`MIN_DBFS`].
#[inline]
pub fn power_to_dbfs(mean_square: f32) -> f32 {
    if mean_square <= 1.0 {
        return MIN_DBFS;
    }
    10.0 * mean_square.log10() + MIN_DBFS
}

/// Sum of squares.
#[inline]
pub fn energy(x: &[f32]) -> f32 {
    x.iter().map(|&v| v * v).sum()
}

/// Mean of squares; zero for an empty slice.
#[inline]
pub fn mean_square(x: &[f32]) -> f32 {
    if x.is_empty() {
        return 0.0;
    }
    energy(x) / x.len() as f32
}

/// Largest absolute sample value.
#[inline]
pub fn peak_abs(x: &[f32]) -> f32 {
    x.iter().fold(0.0f32, |m, &v| m.max(v.abs()))
}

/// Zero for values that would decay into subnormals, `v` otherwise.
#[inline]
pub fn flush_denormal(v: f32) -> f32 {
    if v.abs() < DENORMAL_FLOOR { 0.0 } else { v }
}

/// Clamp every sample to the FloatS16 range representable as S16.
pub fn clamp_to_s16_range(x: &mut [f32]) {
    for v in x.iter_mut() {
        *v = v.clamp(MIN_FLOAT_S16_VALUE, MAX_FLOAT_S16_VALUE);
    }
}
