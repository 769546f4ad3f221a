//! Shared enums for grid resampling.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Interpolation used when a regular source is resampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    /// Value of the closest source cell centre.
    Nearest,
    /// Weighted mean of the 2x2 neighbourhood, renormalised around NaN cells.
    #[default]
    Bilinear,
    /// Catmull-Rom over the 4x4 neighbourhood. Falls back to bilinear near NaNs.
    Cubic,
}

impl FromStr for InterpolationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "bilinear" | "linear" => Ok(Self::Bilinear),
            "cubic" | "bicubic" => Ok(Self::Cubic),
            other => Err(format!("unknown interpolation method '{}'", other)),
        }
    }
}

impl InterpolationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Bilinear => "bilinear",
            Self::Cubic => "cubic",
        }
    }
}

impl std::fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
