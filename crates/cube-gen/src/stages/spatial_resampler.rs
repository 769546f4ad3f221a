use super::{CubeTransformer, TransformedCube};
use crate::error::StageResult;
use crate::resampling::resolve_target_grid;
use grid_mapping::{resample_in_space, Grid, InterpolationMethod};
use std::cell::OnceCell;
use tracing::debug;

/// Resamples every cube onto one target grid.
///
/// The target grid is resolved from the first cube this stage sees and
/// reused for all later ones.
#[derive(Debug, Default)]
pub struct SpatialResampler {
    method: InterpolationMethod,
    target: OnceCell<Grid>,
}

impl SpatialResampler {
    pub fn new(method: InterpolationMethod) -> Self {
        Self {
            method,
            target: OnceCell::new(),
        }
    }

    /// The resolved target grid, once a cube has been transformed.
    pub fn target_grid(&self) -> Option<&Grid> {
        self.target.get()
    }

    fn target_for(&self, cube: &TransformedCube) -> StageResult<Grid> {
        if let Some(target) = self.target.get() {
            return Ok(target.clone());
        }
        let target = resolve_target_grid(&cube.grid, &cube.config)?;
        debug!(
            width = target.size.0,
            height = target.size.1,
            crs = %target.crs,
            "Target grid resolved from first cube"
        );
        let _ = self.target.set(target.clone());
        Ok(target)
    }
}

impl CubeTransformer for SpatialResampler {
    fn transform(&self, cube: TransformedCube) -> StageResult<TransformedCube> {
        let target = self.target_for(&cube)?;
        let dataset = resample_in_space(&cube.dataset, &cube.grid, &target, self.method)?;
        Ok(TransformedCube::new(dataset, target, cube.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CubeConfig;
    use crate::error::StageError;
    use chrono::Utc;
    use cube_common::{CrsCode, Dataset, Variable};
    use grid_mapping::GridError;
    use std::sync::Arc;

    /// 4x2 cells of 1 degree from (x0, 0).
    fn cube(x0: f64, config: &Arc<CubeConfig>) -> TransformedCube {
        let x: Vec<f64> = (0..4).map(|i| x0 + i as f64 + 0.5).collect();
        let ds = Dataset::rectilinear(CrsCode::Epsg4326, x, vec![1.5, 0.5], vec![Utc::now()])
            .unwrap()
            .with_var("a", Variable::new((0..8).map(|v| v as f32).collect()))
            .unwrap();
        let grid = Grid::from_dataset(&ds).unwrap();
        TransformedCube::new(ds, grid, config.clone())
    }

    #[test]
    fn test_target_from_first_cube() {
        let config = Arc::new(CubeConfig::new());
        let resampler = SpatialResampler::new(InterpolationMethod::Nearest);

        let first = resampler.transform(cube(0.0, &config)).unwrap();
        assert_eq!(first.grid.xy_min, (0.0, 0.0));
        assert_eq!(first.dataset.var("a").unwrap().data, (0..8).map(|v| v as f32).collect::<Vec<_>>());

        // The second cube is shifted by two cells and lands on the first grid.
        let second = resampler.transform(cube(2.0, &config)).unwrap();
        assert_eq!(second.grid, first.grid);
        let data = &second.dataset.var("a").unwrap().data;
        assert_eq!(&data[2..4], &[0.0, 1.0]);
        assert!(data[0].is_nan());
    }

    #[test]
    fn test_spatial_res_override() {
        let config = Arc::new(CubeConfig::new().with_bbox([0.0, 0.0, 4.0, 2.0]).with_spatial_res(2.0));
        let resampler = SpatialResampler::new(InterpolationMethod::Bilinear);
        let output = resampler.transform(cube(0.0, &config)).unwrap();
        assert_eq!(output.grid.size, (2, 1));
        assert_eq!((output.dataset.width, output.dataset.height), (2, 1));
        assert_eq!(resampler.target_grid().map(|g| g.size), Some((2, 1)));
    }

    #[test]
    fn test_unsupported_crs() {
        let config = Arc::new(CubeConfig::new().with_crs("EPSG:3031"));
        let resampler = SpatialResampler::new(InterpolationMethod::Nearest);
        let err = resampler.transform(cube(0.0, &config)).unwrap_err();
        assert!(matches!(err, StageError::Grid(GridError::UnsupportedTransform { .. })));
    }
}
