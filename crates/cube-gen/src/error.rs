//! Error types for cube generation.

use crate::stages::StageKind;
use cube_common::DatasetError;
use cube_store::StoreError;
use grid_mapping::GridError;
use std::error::Error as StdError;
use thiserror::Error;

/// Failures raised inside a single pipeline stage.
#[derive(Error, Debug)]
pub enum StageError {
    /// The cube configuration cannot be applied to the data at hand.
    #[error("{0}")]
    Configuration(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("Cannot combine cubes: {0}")]
    Combine(String),

    #[error("User code failed: {0}")]
    UserCode(String),
}

impl StageError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn combine(msg: impl Into<String>) -> Self {
        Self::Combine(msg.into())
    }

    /// True for failures caused by the request rather than by the data.
    fn is_configuration(&self) -> bool {
        matches!(
            self,
            StageError::Configuration(_)
                | StageError::Grid(GridError::UnsupportedTransform { .. })
                | StageError::Grid(GridError::InvalidSize { .. })
                | StageError::Grid(GridError::InvalidResolution(..))
        )
    }
}

/// Result type for stage operations.
pub type StageResult<T> = std::result::Result<T, StageError>;

/// Errors surfaced by a generator run.
#[derive(Error, Debug)]
pub enum GeneratorError {
    /// Malformed or contradictory request or cube configuration.
    #[error("Invalid cube configuration: {0}")]
    Configuration(String),

    /// User code parameters violate the processor's schema.
    #[error("{0}")]
    Validation(String),

    /// A stage failed while the pipeline was running.
    #[error("Failed while {stage}: {source}")]
    StageExecution {
        stage: StageKind,
        #[source]
        source: StageError,
    },
}

impl GeneratorError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Attribute a stage failure to the stage it happened in.
    ///
    /// Failures that stem from the configuration (an unsupported CRS pair,
    /// an empty target grid) are reported as configuration errors.
    pub fn from_stage(stage: StageKind, err: StageError) -> Self {
        if err.is_configuration() {
            return Self::Configuration(err.to_string());
        }
        Self::StageExecution { stage, source: err }
    }

    /// HTTP-style status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            GeneratorError::Configuration(_) => 400,
            GeneratorError::Validation(_) => 400,
            GeneratorError::StageExecution { .. } => 500,
        }
    }

    /// The stage the error occurred in, if it occurred inside one.
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            GeneratorError::StageExecution { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Render the error chain as a local traceback.
    pub fn traceback(&self) -> String {
        let mut lines = Vec::new();
        if let Some(stage) = self.stage() {
            lines.push(format!("in stage: {}", stage));
        }
        lines.push(format!("error: {}", self));
        let mut source = StdError::source(self);
        while let Some(cause) = source {
            lines.push(format!("caused by: {}", cause));
            source = cause.source();
        }
        lines.join("\n")
    }
}

/// Result type for generator operations.
pub type Result<T> = std::result::Result<T, GeneratorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use cube_common::CrsCode;

    #[test]
    fn test_status_codes() {
        assert_eq!(GeneratorError::configuration("x").status_code(), 400);
        assert_eq!(GeneratorError::validation("x").status_code(), 400);
        let err = GeneratorError::from_stage(
            StageKind::Write,
            StageError::Store(StoreError::AlreadyExists("cube.zarr".to_string())),
        );
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_grid_configuration_failures() {
        let err = GeneratorError::from_stage(
            StageKind::ResampleSpace,
            StageError::Grid(GridError::UnsupportedTransform {
                from: CrsCode::Epsg3413,
                to: CrsCode::Epsg3031,
            }),
        );
        assert!(matches!(err, GeneratorError::Configuration(_)));

        let err = GeneratorError::from_stage(
            StageKind::ResampleSpace,
            StageError::Grid(GridError::degenerate("flat axis")),
        );
        assert_eq!(err.stage(), Some(StageKind::ResampleSpace));
    }

    #[test]
    fn test_traceback_lists_stage_and_causes() {
        let err = GeneratorError::from_stage(
            StageKind::Open,
            StageError::Store(StoreError::not_found("mem", "missing")),
        );
        let traceback = err.traceback();
        let lines: Vec<&str> = traceback.lines().collect();
        assert_eq!(lines[0], "in stage: opening");
        assert!(lines[1].starts_with("error: Failed while opening:"));
        assert!(lines[2].starts_with("caused by: "));
        assert!(lines[2].contains("missing"));
    }
}
