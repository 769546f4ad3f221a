//! Common fixtures for cube generation tests.

use cube_common::Dataset;
use cube_store::{MemoryStore, StorePool, ZarrStore, ZarrStoreConfig};
use std::sync::Arc;
use tempfile::TempDir;

/// Bounding boxes as `[x_min, y_min, x_max, y_max]`.
pub mod bbox {
    /// Global bounding box in degrees.
    pub const GLOBAL: [f64; 4] = [-180.0, -90.0, 180.0, 90.0];

    /// The North Sea in degrees, 10 x 5 cells at 1 degree.
    pub const NORTH_SEA: [f64; 4] = [0.0, 51.0, 10.0, 56.0];

    /// Western half of [`NORTH_SEA`].
    pub const NORTH_SEA_WEST: [f64; 4] = [0.0, 51.0, 5.0, 56.0];

    /// Inverted bbox (min > max).
    pub const INVALID: [f64; 4] = [10.0, 10.0, 5.0, 5.0];
}

/// CRS identifiers as they appear in cube configs.
pub mod crs {
    pub const EPSG_4326: &str = "EPSG:4326";
    pub const EPSG_3857: &str = "EPSG:3857";
    pub const CRS_84: &str = "OGC:CRS84";
}

/// Store ids used by the pool helpers.
pub mod stores {
    pub const INPUT: &str = "input";
    pub const OUTPUT: &str = "output";
}

/// A pool with an `input` memory store holding `datasets` and an empty
/// `output` memory store.
///
/// Returns the pool and both stores so tests can inspect them.
pub fn memory_pool(datasets: Vec<(&str, Dataset)>) -> (Arc<StorePool>, Arc<MemoryStore>, Arc<MemoryStore>) {
    let input = Arc::new(MemoryStore::new());
    for (data_id, dataset) in datasets {
        input.insert(data_id, dataset).expect("insert test dataset");
    }
    let output = Arc::new(MemoryStore::new());

    let pool = StorePool::new();
    pool.add_store(stores::INPUT, input.clone()).expect("add input store");
    pool.add_store(stores::OUTPUT, output.clone()).expect("add output store");
    (Arc::new(pool), input, output)
}

/// A pool whose `input` and `output` stores are Zarr stores under a fresh
/// temporary directory. The directory lives as long as the returned guard.
pub fn zarr_pool() -> (Arc<StorePool>, TempDir) {
    let dir = TempDir::new().expect("create temp dir");
    let pool = StorePool::new();
    for store_id in [stores::INPUT, stores::OUTPUT] {
        let store = ZarrStore::new(ZarrStoreConfig::new(dir.path().join(store_id))).expect("create zarr store");
        pool.add_store(store_id, Arc::new(store)).expect("add zarr store");
    }
    (Arc::new(pool), dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::{daily_times, test_dataset};

    #[test]
    fn test_bbox_fixtures() {
        assert!(bbox::NORTH_SEA[0] < bbox::NORTH_SEA[2]);
        assert!(bbox::INVALID[0] > bbox::INVALID[2]);
        assert_eq!(bbox::NORTH_SEA_WEST[2] * 2.0, bbox::NORTH_SEA[2]);
    }

    #[test]
    fn test_memory_pool() {
        let ds = test_dataset(bbox::NORTH_SEA, 1.0, daily_times("2024-01-01", 1), &["chl"]);
        let (pool, input, output) = memory_pool(vec![("cube", ds)]);
        assert!(pool.has_store(stores::INPUT));
        assert!(input.get("cube").is_some());
        assert!(output.get("cube").is_none());
    }

    #[test]
    fn test_zarr_pool() {
        let (pool, dir) = zarr_pool();
        assert_eq!(pool.store_ids().len(), 2);
        assert!(dir.path().exists());
    }
}
