//! The process-wide pool of data stores.

use crate::config::{StoreConfig, StorePoolConfig};
use crate::error::{Result, StoreError};
use crate::memory::MemoryStore;
use crate::params::{InputConfig, OutputConfig};
use crate::store::DataStore;
use crate::zarr::ZarrStore;
use cube_common::Dataset;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{info, instrument};
use uuid::Uuid;

/// Stores keyed by id, shared by all generator runs.
///
/// Opening and writing only take the read lock, so concurrent runs never
/// block each other on the pool itself.
#[derive(Default)]
pub struct StorePool {
    stores: RwLock<HashMap<String, Arc<dyn DataStore>>>,
}

impl StorePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pool from its configuration.
    pub fn from_config(config: &StorePoolConfig) -> Result<Self> {
        let pool = Self::new();
        for (store_id, store_config) in &config.stores {
            let store: Arc<dyn DataStore> = match store_config {
                StoreConfig::Memory => Arc::new(MemoryStore::new()),
                StoreConfig::Zarr(zarr) => Arc::new(ZarrStore::new(zarr.clone())?),
            };
            pool.add_store(store_id.clone(), store)?;
        }
        info!(stores = config.stores.len(), "Store pool initialized");
        Ok(pool)
    }

    pub fn add_store(&self, store_id: impl Into<String>, store: Arc<dyn DataStore>) -> Result<()> {
        self.stores
            .write()
            .map_err(|_| StoreError::Poisoned)?
            .insert(store_id.into(), store);
        Ok(())
    }

    pub fn get_store(&self, store_id: &str) -> Result<Arc<dyn DataStore>> {
        self.stores
            .read()
            .map_err(|_| StoreError::Poisoned)?
            .get(store_id)
            .cloned()
            .ok_or_else(|| StoreError::StoreNotFound(store_id.to_string()))
    }

    pub fn has_store(&self, store_id: &str) -> bool {
        self.stores
            .read()
            .map(|s| s.contains_key(store_id))
            .unwrap_or(false)
    }

    pub fn store_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .stores
            .read()
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Open the dataset an input refers to.
    #[instrument(skip(self, input), fields(store_id = %input.store_id, data_id = %input.data_id))]
    pub fn open(&self, input: &InputConfig) -> Result<Dataset> {
        let store = self.get_store(&input.store_id)?;
        store
            .open_data(&input.data_id, &input.open_params)
            .map_err(|e| match e {
                StoreError::DataNotFound { data_id, .. } => {
                    StoreError::not_found(input.store_id.clone(), data_id)
                }
                other => other,
            })
    }

    /// Write a dataset to the output store and return its data id.
    ///
    /// A missing output data id becomes `<uuid>.zarr`.
    #[instrument(skip(self, dataset, output), fields(store_id = %output.store_id))]
    pub fn write(&self, dataset: &Dataset, output: &OutputConfig) -> Result<String> {
        let store = self.get_store(&output.store_id)?;
        let data_id = output
            .data_id
            .clone()
            .unwrap_or_else(|| format!("{}.zarr", Uuid::new_v4()));
        store.write_data(dataset, &data_id, output.replace, &output.write_params)
    }
}

impl std::fmt::Debug for StorePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorePool")
            .field("stores", &self.store_ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ZarrStoreConfig;
    use cube_common::{CrsCode, Variable};
    use tempfile::TempDir;

    fn dataset() -> Dataset {
        Dataset::rectilinear(CrsCode::Epsg4326, vec![0.5, 1.5], vec![0.5], vec![])
            .unwrap()
            .with_var("a", Variable::new(vec![]))
            .unwrap()
    }

    #[test]
    fn test_from_config() {
        let dir = TempDir::new().unwrap();
        let config = StorePoolConfig::default()
            .with_store("mem", StoreConfig::Memory)
            .with_store("zarr", StoreConfig::Zarr(ZarrStoreConfig::new(dir.path())));
        let pool = StorePool::from_config(&config).unwrap();
        assert_eq!(pool.store_ids(), vec!["mem".to_string(), "zarr".to_string()]);
        assert!(pool.has_store("zarr"));
    }

    #[test]
    fn test_unknown_store() {
        let pool = StorePool::new();
        let err = pool.open(&InputConfig::new("nope", "x")).unwrap_err();
        assert!(matches!(err, StoreError::StoreNotFound(_)));
    }

    #[test]
    fn test_write_generates_data_id() {
        let pool = StorePool::new();
        pool.add_store("mem", Arc::new(MemoryStore::new())).unwrap();
        let id = pool.write(&dataset(), &OutputConfig::new("mem")).unwrap();
        assert!(id.ends_with(".zarr"));
        assert_eq!(id.len(), 36 + 5);

        let opened = pool.open(&InputConfig::new("mem", id)).unwrap();
        assert_eq!(opened, dataset());
    }

    #[test]
    fn test_not_found_names_store() {
        let pool = StorePool::new();
        pool.add_store("mem", Arc::new(MemoryStore::new())).unwrap();
        let err = pool.open(&InputConfig::new("mem", "missing")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "data resource 'missing' not found in store 'mem'"
        );
    }
}
