//! A store keeping datasets in memory.

use crate::error::{Result, StoreError};
use crate::store::{check_params, requested_variables, validate_data_id, DataStore};
use cube_common::{Attrs, Dataset};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
pub struct MemoryStore {
    datasets: RwLock<HashMap<String, Dataset>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a dataset.
    pub fn insert(&self, data_id: impl Into<String>, dataset: Dataset) -> Result<()> {
        self.datasets
            .write()
            .map_err(|_| StoreError::Poisoned)?
            .insert(data_id.into(), dataset);
        Ok(())
    }

    /// A copy of a stored dataset, if any.
    pub fn get(&self, data_id: &str) -> Option<Dataset> {
        self.datasets.read().ok()?.get(data_id).cloned()
    }
}

impl DataStore for MemoryStore {
    fn open_data(&self, data_id: &str, open_params: &Attrs) -> Result<Dataset> {
        let variables = requested_variables(open_params)?;
        let datasets = self.datasets.read().map_err(|_| StoreError::Poisoned)?;
        let dataset = datasets
            .get(data_id)
            .ok_or_else(|| StoreError::not_found("memory", data_id))?;

        debug!(data_id = %data_id, variables = dataset.data_vars.len(), "Opened in-memory dataset");
        Ok(match variables {
            Some(names) => dataset.select_vars(&names),
            None => dataset.clone(),
        })
    }

    fn write_data(
        &self,
        dataset: &Dataset,
        data_id: &str,
        replace: bool,
        write_params: &Attrs,
    ) -> Result<String> {
        validate_data_id(data_id)?;
        // Datasets are kept uncompressed; the hint is accepted and ignored.
        check_params(write_params, &["compression"])?;

        let mut datasets = self.datasets.write().map_err(|_| StoreError::Poisoned)?;
        if datasets.contains_key(data_id) && !replace {
            return Err(StoreError::AlreadyExists(data_id.to_string()));
        }
        datasets.insert(data_id.to_string(), dataset.clone());
        debug!(data_id = %data_id, "Stored dataset in memory");
        Ok(data_id.to_string())
    }

    fn has_data(&self, data_id: &str) -> bool {
        self.datasets
            .read()
            .map(|d| d.contains_key(data_id))
            .unwrap_or(false)
    }

    fn list_data_ids(&self) -> Result<Vec<String>> {
        let datasets = self.datasets.read().map_err(|_| StoreError::Poisoned)?;
        let mut ids: Vec<String> = datasets.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
