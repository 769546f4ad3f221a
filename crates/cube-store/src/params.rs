//! References to input and output datasets within the store pool.

use cube_common::Attrs;
use serde::{Deserialize, Serialize};

/// One source dataset: store id, data id and store-specific open options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    pub store_id: String,
    pub data_id: String,
    #[serde(default, skip_serializing_if = "Attrs::is_empty")]
    pub open_params: Attrs,
}

impl InputConfig {
    pub fn new(store_id: impl Into<String>, data_id: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
            data_id: data_id.into(),
            open_params: Attrs::new(),
        }
    }

    pub fn with_open_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.open_params.insert(key.into(), value);
        self
    }
}

/// Where the generated cube is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub store_id: String,
    /// Generated as `<uuid>.zarr` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_id: Option<String>,
    #[serde(default)]
    pub replace: bool,
    #[serde(default, skip_serializing_if = "Attrs::is_empty")]
    pub write_params: Attrs,
}

impl OutputConfig {
    pub fn new(store_id: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
            data_id: None,
            replace: false,
            write_params: Attrs::new(),
        }
    }

    pub fn with_data_id(mut self, data_id: impl Into<String>) -> Self {
        self.data_id = Some(data_id.into());
        self
    }

    pub fn with_replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }
}
