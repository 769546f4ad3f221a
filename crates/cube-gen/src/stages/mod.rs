//! Pipeline stages.
//!
//! Every input runs through [`Opener`], then the cube-to-cube stages
//! subsetting, temporal and spatial resampling, bundled as [`InputStages`].
//! The [`Combiner`] merges the per-input cubes, which then pass rechunking,
//! user code, a second rechunking and metadata adjustment before the
//! [`Writer`] stores them.
//!
//! Cube-to-cube stages implement [`CubeTransformer`] and are selected once
//! per run as a [`Stage`]. A stage with nothing to do is [`Stage::Identity`],
//! so the pipeline never branches on whether a transform "really" ran.

mod combiner;
mod inputs;
mod metadata;
mod opener;
mod rechunker;
mod spatial_resampler;
mod subsetter;
mod time_resampler;
mod user_code;
mod writer;

pub use combiner::Combiner;
pub use inputs::InputStages;
pub use metadata::MetadataAdjuster;
pub use opener::Opener;
pub use rechunker::Rechunker;
pub use spatial_resampler::SpatialResampler;
pub use subsetter::Subsetter;
pub use time_resampler::TimeResampler;
pub use user_code::UserCodeExecutor;
pub use writer::Writer;

pub(crate) use metadata::grid_mapping_var;

use crate::config::CubeConfig;
use crate::error::{GeneratorError, Result, StageResult};
use cube_common::Dataset;
use grid_mapping::Grid;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A dataset, its grid mapping and the cube config it is generated under.
///
/// Stages consume a cube and return a new one.
#[derive(Debug, Clone)]
pub struct TransformedCube {
    pub dataset: Dataset,
    pub grid: Grid,
    pub config: Arc<CubeConfig>,
}

impl TransformedCube {
    pub fn new(dataset: Dataset, grid: Grid, config: Arc<CubeConfig>) -> Self {
        Self { dataset, grid, config }
    }

    /// An empty cube has no data variables.
    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// Same grid and config, different dataset.
    pub fn with_dataset(self, dataset: Dataset) -> Self {
        Self { dataset, ..self }
    }
}

/// The steps of a generator run, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Open,
    Subset,
    ResampleTime,
    ResampleSpace,
    Combine,
    Rechunk,
    UserCode,
    PostRechunk,
    AdjustMetadata,
    Write,
}

impl StageKind {
    pub fn label(&self) -> &'static str {
        match self {
            StageKind::Open => "opening",
            StageKind::Subset => "subsetting",
            StageKind::ResampleTime => "resampling in time",
            StageKind::ResampleSpace => "resampling in space",
            StageKind::Combine => "combining",
            StageKind::Rechunk => "rechunking",
            StageKind::UserCode => "executing user code",
            StageKind::PostRechunk => "post-rechunking",
            StageKind::AdjustMetadata => "adjusting metadata",
            StageKind::Write => "writing",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A cube-to-cube transformation.
pub trait CubeTransformer {
    fn transform(&self, cube: TransformedCube) -> StageResult<TransformedCube>;
}

/// The cube-to-cube stage chosen for one pipeline step.
#[derive(Debug)]
pub enum Stage {
    Identity,
    Subset(Subsetter),
    ResampleTime(TimeResampler),
    ResampleSpace(SpatialResampler),
    Rechunk(Rechunker),
    UserCode(UserCodeExecutor),
    AdjustMetadata(MetadataAdjuster),
}

impl CubeTransformer for Stage {
    fn transform(&self, cube: TransformedCube) -> StageResult<TransformedCube> {
        match self {
            Stage::Identity => Ok(cube),
            Stage::Subset(stage) => stage.transform(cube),
            Stage::ResampleTime(stage) => stage.transform(cube),
            Stage::ResampleSpace(stage) => stage.transform(cube),
            Stage::Rechunk(stage) => stage.transform(cube),
            Stage::UserCode(stage) => stage.transform(cube),
            Stage::AdjustMetadata(stage) => stage.transform(cube),
        }
    }
}

/// Run `stage` as pipeline step `kind`.
///
/// Empty cubes are passed through untouched.
pub fn transform_cube(cube: TransformedCube, stage: &Stage, kind: StageKind) -> Result<TransformedCube> {
    if cube.is_empty() {
        debug!(stage = %kind, "Stage skipped for empty cube");
        return Ok(cube);
    }
    debug!(stage = %kind, "Transforming cube");
    stage
        .transform(cube)
        .map_err(|e| GeneratorError::from_stage(kind, e))
}
