//! Data cube generation.
//!
//! Turns one or more gridded source datasets into a single cube on a common
//! spatial and temporal grid and writes it to a store.
//!
//! # Pipeline
//!
//! ```text
//! for each input:  open ─► subset ─► resample in time ─► resample in space
//!                                         │
//!                                         ▼
//!                combine ─► rechunk ─► user code ─► rechunk ─► metadata ─► write
//! ```
//!
//! Failures either surface as [`GeneratorError`] or are degraded into an
//! error [`CubeGeneratorResult`], depending on
//! [`GeneratorConfig::raise_on_error`].
//!
//! # Example
//!
//! ```no_run
//! use cube_gen::{CubeGenerator, CubeGeneratorRequest, GeneratorConfig, LocalCubeGenerator};
//! use cube_store::{StorePool, StorePoolConfig};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let pool = StorePool::from_config(&StorePoolConfig::from_file(Path::new("stores.yaml"))?)?;
//! let generator = LocalCubeGenerator::new(Arc::new(pool), GeneratorConfig::from_env());
//! let request = CubeGeneratorRequest::from_file(Path::new("request.yaml"))?;
//! let result = generator.generate(request)?;
//! println!("{}", result.message());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod generator;
mod info;
pub mod progress;
pub mod request;
pub mod resampling;
pub mod response;
pub mod schema;
pub mod stages;
pub mod usercode;

pub use config::{CubeConfig, GeneratorConfig};
pub use error::{GeneratorError, Result, StageError};
pub use generator::{CubeGenerator, LocalCubeGenerator};
pub use progress::{LoggingProgressObserver, ProgressObserver, ProgressState, ProgressTracker};
pub use request::{CodeConfig, CubeGeneratorRequest};
pub use resampling::{needs_resampling, resolve_target_grid};
pub use response::{CubeGeneratorResult, CubeInfo, CubeInfoResult};
pub use schema::{ParamsSchema, SchemaViolation};
pub use stages::{StageKind, TransformedCube};
pub use usercode::{UserCode, UserCodeProcessor, UserCodeRegistry, ValidatedUserCode};
