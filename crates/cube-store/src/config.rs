//! Store pool configuration.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Compression codec for Zarr variable arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZarrCompression {
    /// No compression.
    None,
    /// Blosc with LZ4.
    BloscLz4,
    /// Blosc with Zstd.
    #[default]
    BloscZstd,
}

impl ZarrCompression {
    /// Get the codec name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::BloscLz4 => "blosc_lz4",
            Self::BloscZstd => "blosc_zstd",
        }
    }
}

impl FromStr for ZarrCompression {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "lz4" | "blosc_lz4" => Ok(Self::BloscLz4),
            "zstd" | "blosc_zstd" => Ok(Self::BloscZstd),
            other => Err(format!("unknown Zarr compression '{}'", other)),
        }
    }
}

impl std::fmt::Display for ZarrCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn default_compression_level() -> u8 {
    1
}

fn default_shuffle() -> bool {
    true
}

/// Settings of a Zarr filesystem store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZarrStoreConfig {
    /// Directory holding one Zarr group per data id.
    pub root: PathBuf,

    #[serde(default)]
    pub compression: ZarrCompression,

    /// Blosc level, 1 to 9.
    #[serde(default = "default_compression_level")]
    pub compression_level: u8,

    /// Byte shuffle before compressing.
    #[serde(default = "default_shuffle")]
    pub shuffle: bool,
}

impl ZarrStoreConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            compression: ZarrCompression::default(),
            compression_level: default_compression_level(),
            shuffle: default_shuffle(),
        }
    }

    pub fn with_compression(mut self, compression: ZarrCompression) -> Self {
        self.compression = compression;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.compression_level == 0 || self.compression_level > 9 {
            return Err("compression_level must be 1-9".to_string());
        }
        Ok(())
    }
}

/// Kind and settings of one store in the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    Memory,
    Zarr(ZarrStoreConfig),
}

/// Stores available to a generator, keyed by store id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorePoolConfig {
    #[serde(default)]
    pub stores: BTreeMap<String, StoreConfig>,
}

impl StorePoolConfig {
    pub fn with_store(mut self, store_id: impl Into<String>, config: StoreConfig) -> Self {
        self.stores.insert(store_id.into(), config);
        self
    }

    /// Parse a YAML document. JSON is accepted as well.
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        serde_yaml::from_str(s).map_err(|e| StoreError::Config(e.to_string()))
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| StoreError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }
}
