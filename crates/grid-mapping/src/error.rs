//! Error types for grid mappings.

use cube_common::{CrsCode, DatasetError};
use thiserror::Error;

/// Errors that can occur while deriving or applying grid mappings.
#[derive(Error, Debug)]
pub enum GridError {
    /// A grid needs at least one cell on each axis.
    #[error("invalid grid size {width}x{height}")]
    InvalidSize { width: usize, height: usize },

    /// Resolutions must be finite and positive.
    #[error("invalid grid resolution ({0}, {1})")]
    InvalidResolution(f64, f64),

    /// The spacing of a coordinate axis cannot be determined.
    #[error("cannot derive grid from coordinates: {0}")]
    Degenerate(String),

    /// Irregular coordinates contain NaN or infinite values.
    #[error("coordinate variable '{0}' contains non-finite values")]
    NonFiniteCoordinates(String),

    /// No point transform exists between the two CRSs.
    #[error("cannot transform coordinates from {from} to {to}")]
    UnsupportedTransform { from: CrsCode, to: CrsCode },

    /// An operation that requires a regular grid was given an irregular one.
    #[error("grid must be regular: {0}")]
    NotRegular(String),

    /// The dataset does not fit the grid it is resampled from.
    #[error("dataset of size {actual:?} does not match grid of size {expected:?}")]
    SizeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

impl GridError {
    pub fn degenerate(msg: impl Into<String>) -> Self {
        Self::Degenerate(msg.into())
    }

    pub fn not_regular(msg: impl Into<String>) -> Self {
        Self::NotRegular(msg.into())
    }
}

/// Result type for grid mapping operations.
pub type Result<T> = std::result::Result<T, GridError>;
