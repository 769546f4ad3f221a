//! Data stores for gridded cubes.
//!
//! Generator runs open their inputs and write their output through a
//! [`StorePool`] of named [`DataStore`]s:
//!
//! - [`MemoryStore`]: datasets held in process memory
//! - [`ZarrStore`]: Zarr V3 groups on the local filesystem

pub mod config;
pub mod error;
pub mod memory;
pub mod params;
pub mod pool;
pub mod store;
pub mod zarr;

pub use config::{StoreConfig, StorePoolConfig, ZarrCompression, ZarrStoreConfig};
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use params::{InputConfig, OutputConfig};
pub use pool::StorePool;
pub use store::DataStore;
pub use zarr::ZarrStore;
