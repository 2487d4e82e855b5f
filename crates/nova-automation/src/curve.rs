//! Segment curve laws.

use serde::{Deserialize, Deserializer, Serialize};

/// Interpolation law between two automation points.
///
/// The law stored on a point shapes the segment that starts at that point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveType {
    #[default]
    Linear,
    /// Fast start, slow finish.
    Exponential,
    /// Slow start, fast finish.
    Logarithmic,
    /// Smoothstep ease in/out.
    SCurve,
    /// Step: holds the first value until the segment end.
    Hold,
}

impl CurveType {
    /// Evaluate the segment from `v1` to `v2` at normalized position `t`.
    ///
    /// `t` is clamped to `[0, 1]`; NaN is treated as 0.
    #[inline]
    pub fn evaluate(&self, v1: f32, v2: f32, t: f64) -> f32 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let shaped = match self {
            CurveType::Linear => t,
            CurveType::Exponential => 1.0 - (1.0 - t).powi(3),
            CurveType::Logarithmic => t.powi(3),
            CurveType::SCurve => t * t * (3.0 - 2.0 * t),
            CurveType::Hold => {
                return if t < 1.0 { v1 } else { v2 };
            }
        };
        v1 + (v2 - v1) * shaped as f32
    }

    /// Parse a curve name from external data. Unknown names are `Linear`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "exponential" | "exp" => CurveType::Exponential,
            "logarithmic" | "log" => CurveType::Logarithmic,
            "s_curve" | "scurve" | "s-curve" | "smooth" => CurveType::SCurve,
            "hold" | "step" => CurveType::Hold,
            _ => CurveType::Linear,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CurveType::Linear => "linear",
            CurveType::Exponential => "exponential",
            CurveType::Logarithmic => "logarithmic",
            CurveType::SCurve => "s_curve",
            CurveType::Hold => "hold",
        }
    }
}

impl<'de> Deserialize<'de> for CurveType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(CurveType::from_name(&name))
    }
}
