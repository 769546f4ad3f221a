//! Whether and onto which grid inputs are resampled in space.

use crate::config::CubeConfig;
use crate::error::{StageError, StageResult};
use cube_store::InputConfig;
use grid_mapping::Grid;

/// True when the inputs must be resampled onto a common target grid.
///
/// This is the case when the cube config overrides the resolution, bbox or
/// CRS, and whenever more than one input has to be combined.
pub fn needs_resampling(inputs: &[InputConfig], cube_config: &CubeConfig) -> bool {
    inputs.len() > 1 || cube_config.has_spatial_overrides()
}

/// The grid all inputs are resampled onto, derived from `source`.
pub fn resolve_target_grid(source: &Grid, cube_config: &CubeConfig) -> StageResult<Grid> {
    let overrides = cube_config
        .overrides()
        .map_err(|e| StageError::configuration(e.to_string()))?;
    Ok(source.to_target(&overrides)?)
}
