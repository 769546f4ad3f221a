//! Axis-aligned extents in CRS units.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Extent of a grid or a subset request, `x_min, y_min, x_max, y_max`.
///
/// Units follow the CRS: degrees for geographic systems, meters otherwise.
/// Serialises as the 4-element array used in cube configurations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn from_array([min_x, min_y, max_x, max_y]: [f64; 4]) -> Self {
        Self::new(min_x, min_y, max_x, max_y)
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Finite corners with a positive extent on both axes.
    pub fn is_valid(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite()) && self.width() > 0.0 && self.height() > 0.0
    }

    /// Overlap with a non-zero area. Touching edges do not count.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x.max(other.min_x) < self.max_x.min(other.max_x)
            && self.min_y.max(other.min_y) < self.max_y.min(other.max_y)
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(v: [f64; 4]) -> Self {
        Self::from_array(v)
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        b.to_array()
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}, {}]", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}
