//! Errors raised by the in-memory dataset model.

use thiserror::Error;

pub type DatasetResult<T> = Result<T, DatasetError>;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Variable '{name}' has {actual} values, expected {expected}")]
    ShapeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Coordinate '{axis}' has {actual} values, expected {expected}")]
    CoordinateMismatch {
        axis: String,
        expected: usize,
        actual: usize,
    },

    #[error("Dataset must have at least one column and one row")]
    EmptyGrid,

    #[error("Variable not found: {0}")]
    UnknownVariable(String),

    #[error("Invalid index window: {0}")]
    InvalidWindow(String),
}

impl DatasetError {
    pub fn shape(name: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            name: name.into(),
            expected,
            actual,
        }
    }
}
