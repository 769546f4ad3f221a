use super::TransformedCube;
use crate::config::CubeConfig;
use crate::error::StageResult;
use cube_store::{InputConfig, StorePool};
use grid_mapping::Grid;
use std::sync::Arc;
use tracing::debug;

/// Opens inputs from the store pool and derives their grid mapping.
#[derive(Debug, Clone)]
pub struct Opener {
    store_pool: Arc<StorePool>,
    config: Arc<CubeConfig>,
}

impl Opener {
    pub fn new(store_pool: Arc<StorePool>, config: Arc<CubeConfig>) -> Self {
        Self { store_pool, config }
    }

    pub fn open_cube(&self, input: &InputConfig) -> StageResult<TransformedCube> {
        let dataset = self.store_pool.open(input)?;
        let grid = Grid::from_dataset(&dataset)?;
        debug!(
            store_id = %input.store_id,
            data_id = %input.data_id,
            width = dataset.width,
            height = dataset.height,
            time_steps = dataset.time.len(),
            variables = dataset.data_vars.len(),
            regular = grid.is_regular(),
            "Opened input cube"
        );
        Ok(TransformedCube::new(dataset, grid, self.config.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StageError;
    use cube_common::{CrsCode, Dataset, Variable};
    use cube_store::{MemoryStore, StoreError};

    fn pool() -> Arc<StorePool> {
        let store = MemoryStore::new();
        let ds = Dataset::rectilinear(CrsCode::Epsg4326, vec![0.5, 1.5, 2.5], vec![1.5, 0.5], vec![])
            .unwrap()
            .with_var("a", Variable::new(vec![]))
            .unwrap();
        store.insert("source", ds).unwrap();
        let pool = StorePool::new();
        pool.add_store("mem", Arc::new(store)).unwrap();
        Arc::new(pool)
    }

    #[test]
    fn test_open_derives_grid() {
        let opener = Opener::new(pool(), Arc::new(CubeConfig::default()));
        let cube = opener.open_cube(&InputConfig::new("mem", "source")).unwrap();
        assert_eq!(cube.grid.size, (3, 2));
        assert!(cube.grid.is_regular());
        assert_eq!(cube.grid.xy_min, (0.0, 0.0));
        assert_eq!(cube.dataset.variable_names(), vec!["a".to_string()]);
    }

    #[test]
    fn test_open_missing_input() {
        let opener = Opener::new(pool(), Arc::new(CubeConfig::default()));
        let err = opener.open_cube(&InputConfig::new("mem", "nope")).unwrap_err();
        assert!(matches!(err, StageError::Store(StoreError::DataNotFound { .. })));
    }
}
