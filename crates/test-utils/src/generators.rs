//! Synthetic cubes with predictable values.
//!
//! Values encode their position so that tests can check that data moved
//! through a pipeline without being shuffled.

use chrono::{DateTime, Duration, TimeZone, Utc};
use cube_common::{CrsCode, Dataset, Variable};

/// Value of the cell at (`t`, `row`, `col`): `t * 1_000_000 + col * 1000 + row`.
///
/// # Example
///
/// ```
/// use test_utils::cell_value;
///
/// assert_eq!(cell_value(0, 0, 1), 1000.0);
/// assert_eq!(cell_value(2, 3, 0), 2_000_003.0);
/// ```
pub fn cell_value(t: usize, row: usize, col: usize) -> f32 {
    (t * 1_000_000 + col * 1000 + row) as f32
}

/// A `[time, y, x]` array filled with [`cell_value`].
pub fn create_test_cube(width: usize, height: usize, time_steps: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height * time_steps);
    for t in 0..time_steps {
        for row in 0..height {
            for col in 0..width {
                data.push(cell_value(t, row, col));
            }
        }
    }
    data
}

/// Temperature-like values in Kelvin, warming from top-left to bottom-right
/// and by one degree per time step.
pub fn create_temperature_cube(width: usize, height: usize, time_steps: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height * time_steps);
    for t in 0..time_steps {
        for row in 0..height {
            for col in 0..width {
                let x_factor = col as f32 / width.max(1) as f32;
                let y_factor = row as f32 / height.max(1) as f32;
                data.push(250.0 + x_factor * 30.0 + y_factor * 30.0 + t as f32);
            }
        }
    }
    data
}

/// `count` daily time stamps at midnight starting on `start`
/// (`YYYY-MM-DD`).
///
/// # Panics
///
/// Panics if `start` is not a valid date.
pub fn daily_times(start: &str, count: usize) -> Vec<DateTime<Utc>> {
    let date = chrono::NaiveDate::parse_from_str(start, "%Y-%m-%d")
        .unwrap_or_else(|e| panic!("invalid start date '{}': {}", start, e));
    let first = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight"));
    (0..count).map(|i| first + Duration::days(i as i64)).collect()
}

/// A north-up regular dataset covering `bbox` at `res`, without variables.
///
/// # Panics
///
/// Panics if the bbox is not a whole number of cells.
pub fn regular_dataset(crs: CrsCode, bbox: [f64; 4], res: f64, time: Vec<DateTime<Utc>>) -> Dataset {
    let width = ((bbox[2] - bbox[0]) / res).round() as usize;
    let height = ((bbox[3] - bbox[1]) / res).round() as usize;
    assert!(width > 0 && height > 0, "bbox {:?} holds no cell at {}", bbox, res);
    let x = (0..width).map(|i| bbox[0] + (i as f64 + 0.5) * res).collect();
    let y = (0..height).map(|j| bbox[3] - (j as f64 + 0.5) * res).collect();
    Dataset::rectilinear(crs, x, y, time).expect("valid rectilinear dataset")
}

/// [`regular_dataset`] with one [`create_test_cube`] variable per name.
pub fn test_dataset(bbox: [f64; 4], res: f64, time: Vec<DateTime<Utc>>, var_names: &[&str]) -> Dataset {
    let mut ds = regular_dataset(CrsCode::Epsg4326, bbox, res, time);
    let data = create_test_cube(ds.width, ds.height, ds.time.len());
    for name in var_names {
        ds.add_var(*name, Variable::new(data.clone()).with_attr("units", "1"))
            .expect("variable matches dataset shape");
    }
    ds
}
