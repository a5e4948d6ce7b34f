//! Constants shared by the gain control stages.

/// Duration of one audio frame in milliseconds.
pub const FRAME_DURATION_MS: i32 = 10;

/// Number of sub-frames per frame used for gain interpolation. Every
/// supported band length (80, 160, 320, 480) is a multiple of it.
pub const SUB_FRAMES_IN_FRAME: usize = 20;

/// Lowest analog input level.
pub const MIN_ANALOG_LEVEL: i32 = 0;
/// Highest analog input level.
pub const MAX_ANALOG_LEVEL: i32 = 255;

/// Level a limiter keeps peaks under, in dBFS.
pub const LIMITER_THRESHOLD_DBFS: f32 = -1.0;

/// Frames quieter than this are digital silence and carry no level
/// information.
pub const SILENCE_THRESHOLD_DBFS: f32 = -80.0;
