use super::TransformedCube;
use crate::error::StageResult;
use cube_store::{OutputConfig, StorePool, ZarrCompression};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Writes the final cube to the output store.
#[derive(Debug, Clone)]
pub struct Writer {
    store_pool: Arc<StorePool>,
    output: OutputConfig,
}

impl Writer {
    /// A configured `compression` becomes the default write parameter; an
    /// explicit one in the output config takes precedence.
    pub fn new(store_pool: Arc<StorePool>, mut output: OutputConfig, compression: Option<ZarrCompression>) -> Self {
        if let Some(compression) = compression {
            output
                .write_params
                .entry("compression".to_string())
                .or_insert_with(|| json!(compression.as_str()));
        }
        Self { store_pool, output }
    }

    pub fn output(&self) -> &OutputConfig {
        &self.output
    }

    /// Write the cube and return the data id it was stored under.
    pub fn write_cube(&self, cube: &TransformedCube) -> StageResult<String> {
        let data_id = self.store_pool.write(&cube.dataset, &self.output)?;
        info!(
            store_id = %self.output.store_id,
            data_id = %data_id,
            variables = cube.dataset.data_vars.len(),
            "Cube written"
        );
        Ok(data_id)
    }
}
