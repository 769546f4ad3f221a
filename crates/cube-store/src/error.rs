//! Error types for data stores.

use cube_common::DatasetError;
use thiserror::Error;

/// Errors raised by stores and the store pool.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No store is registered under this identifier.
    #[error("unknown store: {0}")]
    StoreNotFound(String),

    /// The store has no dataset with this identifier.
    #[error("data resource '{data_id}' not found in store '{store_id}'")]
    DataNotFound { store_id: String, data_id: String },

    /// Writing would overwrite an existing dataset.
    #[error("data resource '{0}' already exists")]
    AlreadyExists(String),

    /// Data identifiers must be relative names without parent references.
    #[error("invalid data id: {0}")]
    InvalidDataId(String),

    /// Unsupported or malformed open parameters.
    #[error("invalid open parameters: {0}")]
    InvalidParams(String),

    /// Stored metadata cannot be interpreted.
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Zarr format error.
    #[error("Zarr format error: {0}")]
    Zarr(String),

    /// Store pool configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Lock poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

impl StoreError {
    pub fn zarr(msg: impl Into<String>) -> Self {
        Self::Zarr(msg.into())
    }

    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    pub fn not_found(store_id: impl Into<String>, data_id: impl Into<String>) -> Self {
        Self::DataNotFound {
            store_id: store_id.into(),
            data_id: data_id.into(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidMetadata(err.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
