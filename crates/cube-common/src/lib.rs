//! Common types shared across the cube generation crates.

pub mod bbox;
pub mod crs;
pub mod dataset;
pub mod error;
pub mod time;

pub use bbox::BoundingBox;
pub use crs::{can_transform, transform_point, CrsCode, CrsParseError};
pub use dataset::{Attrs, Dataset, Variable, XyCoords};
pub use error::{DatasetError, DatasetResult};
pub use time::{format_datetime, parse_datetime, PeriodUnit, TimeParseError, TimePeriod, TimeRange};
