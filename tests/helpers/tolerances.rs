//! Tolerance constants for timing and automation tests.

/// Floating point rounding errors on parameter values.
pub const FLOAT_EPSILON: f32 = 1e-6;

/// Interpolated values, where f64 time is narrowed to f32.
pub const CURVE_EPSILON: f32 = 1e-4;

/// Click and transport times in seconds (beat arithmetic accumulates in f64).
pub const TIME_EPSILON: f64 = 1e-9;
