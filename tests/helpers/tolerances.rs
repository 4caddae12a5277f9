//! Tolerance constants for signal tests.

/// Rounding errors on exact operations (passthrough, unity gain).
pub const FLOAT_EPSILON: f32 = 1e-6;

/// Values below this are considered silent.
pub const SILENCE_THRESHOLD: f32 = 1e-9;
