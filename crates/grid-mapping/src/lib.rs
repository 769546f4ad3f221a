//! Grid mappings for gridded data cubes.
//!
//! A [`Grid`] binds the array indices of a dataset to real-world
//! coordinates in a CRS. This crate provides:
//!
//! - **Derivation**: [`Grid::from_dataset`] inspects coordinate variables and
//!   produces a regular or irregular grid
//! - **Regularisation**: [`Grid::to_regular`] turns an irregular grid into the
//!   regular lattice it will be rectified onto
//! - **Target resolution**: [`Grid::to_target`] applies partial overrides
//!   (resolution, bbox, CRS) to a source grid
//! - **Resampling**: [`resample_in_space`] moves a dataset from one grid onto
//!   another
//!
//! # Architecture
//!
//! ```text
//! Dataset ──► Grid::from_dataset ──► Grid (regular | irregular)
//!                                        │
//!                                        ├─► to_regular()
//!                                        │
//!                                        └─► to_target(overrides)
//!                                                 │
//!                                                 ▼
//!                         resample_in_space(dataset, source, target)
//! ```

pub mod error;
pub mod grid;
pub mod interpolation;
pub mod regrid;
pub mod target;
pub mod types;

pub use error::{GridError, Result};
pub use grid::{Grid, GridKind, DEFAULT_TILE_SIZE};
pub use regrid::resample_in_space;
pub use target::GridOverrides;
pub use types::InterpolationMethod;
