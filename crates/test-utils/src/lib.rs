//! Shared test utilities for the cube generation workspace.
//!
//! Cube values encode their own position (see [`cell_value`]), so a test can
//! check where a resampled cell came from without a reference implementation.
//! Pools come in two flavours: [`memory_pool`] for fast pipeline tests and
//! [`zarr_pool`] for runs that touch the disk.
//!
//! ```ignore
//! use test_utils::{bbox, daily_times, memory_pool, test_dataset};
//!
//! let cube = test_dataset(bbox::NORTH_SEA, 1.0, daily_times("2024-06-01", 3), &["chl"]);
//! let (pool, input, output) = memory_pool(vec![("cube.zarr", cube)]);
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::*;
pub use generators::*;

/// Assert `|left - right| <= epsilon` after widening both sides to `f64`.
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: {} differs from {} by {} (epsilon {})",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Approximate equality of two bounding boxes given as `[x_min, y_min, x_max, y_max]`.
#[macro_export]
macro_rules! assert_bbox_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: [f64; 4] = $left;
        let right: [f64; 4] = $right;
        for i in 0..4 {
            $crate::assert_approx_eq!(left[i], right[i], $epsilon);
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_approx_eq_within_epsilon() {
        assert_approx_eq!(51.00004_f32, 51.0, 1e-4);
        assert_approx_eq!(-0.0, 0.0, 0.0);
        assert_approx_eq!(6_700_000.2, 6_700_000.0, 0.5);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_approx_eq_outside_epsilon() {
        assert_approx_eq!(0.25, 0.2, 0.01);
    }

    #[test]
    fn test_assert_bbox_approx_eq_passes() {
        assert_bbox_approx_eq!([0.0, 1.0, 2.0, 3.0], [0.0001, 1.0, 2.0, 2.9999], 0.001);
    }
}
