use super::{CubeTransformer, TransformedCube};
use crate::error::{StageError, StageResult};
use tracing::debug;

/// Pixels kept around a bbox crop so that interpolation at its edges still
/// finds neighbours.
const CROP_MARGIN: usize = 1;

/// Drops unwanted variables, time steps and pixels before resampling.
#[derive(Debug, Clone, Copy, Default)]
pub struct Subsetter;

impl Subsetter {
    pub fn new() -> Self {
        Self
    }
}

impl CubeTransformer for Subsetter {
    fn transform(&self, cube: TransformedCube) -> StageResult<TransformedCube> {
        let config = cube.config.clone();
        let TransformedCube { mut dataset, mut grid, .. } = cube;

        if let Some(names) = &config.variable_names {
            let missing: Vec<&String> = names.iter().filter(|n| dataset.var(n).is_none()).collect();
            if !missing.is_empty() {
                debug!(missing = ?missing, "Ignoring requested variables missing from input");
            }
            dataset = dataset.select_vars(names);
        }

        let time_range = config
            .parsed_time_range()
            .map_err(|e| StageError::configuration(e.to_string()))?;
        if let Some(range) = time_range {
            dataset = dataset.select_time(|t| range.contains(t));
        }
        if dataset.time.is_empty() {
            dataset = dataset.without_data_vars();
        }

        let bbox = config
            .bounding_box()
            .map_err(|e| StageError::configuration(e.to_string()))?;
        let target_crs = config
            .crs_code()
            .map_err(|e| StageError::configuration(e.to_string()))?;
        let bbox_in_source_crs = target_crs.map_or(true, |crs| crs.is_equivalent(&grid.crs));

        if let Some(bbox) = bbox.filter(|_| bbox_in_source_crs && grid.is_regular()) {
            match grid.index_window(&bbox, CROP_MARGIN) {
                Some((cols, rows)) => {
                    if (cols.len(), rows.len()) != grid.size {
                        dataset = dataset.crop(cols.clone(), rows.clone())?;
                        grid = grid.crop(cols, rows)?;
                    }
                }
                None => {
                    debug!(bbox = ?bbox.to_array(), "Input does not intersect bbox");
                    dataset = dataset.without_data_vars();
                }
            }
        }

        debug!(
            variables = dataset.data_vars.len(),
            time_steps = dataset.time.len(),
            width = dataset.width,
            height = dataset.height,
            "Subset cube"
        );
        Ok(TransformedCube::new(dataset, grid, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CubeConfig;
    use chrono::{DateTime, TimeZone, Utc};
    use cube_common::{CrsCode, Dataset, Variable};
    use grid_mapping::Grid;
    use std::sync::Arc;

    fn days() -> Vec<DateTime<Utc>> {
        (1..=3).map(|d| Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()).collect()
    }

    /// 10x5 cells of 1 degree from (0, 0), three daily steps.
    fn cube(config: CubeConfig) -> TransformedCube {
        let x: Vec<f64> = (0..10).map(|i| i as f64 + 0.5).collect();
        let y: Vec<f64> = (0..5).rev().map(|j| j as f64 + 0.5).collect();
        let n = 3 * 10 * 5;
        let ds = Dataset::rectilinear(CrsCode::Epsg4326, x, y, days())
            .unwrap()
            .with_var("a", Variable::new((0..n).map(|v| v as f32).collect()))
            .unwrap()
            .with_var("b", Variable::filled(n, 1.0))
            .unwrap();
        let grid = Grid::from_dataset(&ds).unwrap();
        TransformedCube::new(ds, grid, Arc::new(config))
    }

    #[test]
    fn test_no_config_is_noop() {
        let input = cube(CubeConfig::new());
        let output = Subsetter.transform(input.clone()).unwrap();
        assert_eq!(output.dataset, input.dataset);
        assert_eq!(output.grid, input.grid);
    }

    #[test]
    fn test_variable_selection_ignores_missing() {
        let output = Subsetter
            .transform(cube(CubeConfig::new().with_variable_names(["b", "zz"])))
            .unwrap();
        assert_eq!(output.dataset.variable_names(), vec!["b".to_string()]);
    }

    #[test]
    fn test_time_range() {
        let output = Subsetter
            .transform(cube(CubeConfig::new().with_time_range(Some("2024-01-02"), None)))
            .unwrap();
        assert_eq!(output.dataset.time, days()[1..].to_vec());
        assert_eq!(output.dataset.var("a").unwrap().data.len(), 2 * 50);

        let output = Subsetter
            .transform(cube(CubeConfig::new().with_time_range(Some("2025-01-01"), None)))
            .unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_bbox_crop_with_margin() {
        let output = Subsetter
            .transform(cube(CubeConfig::new().with_bbox([2.0, 1.0, 4.0, 3.0])))
            .unwrap();
        assert_eq!(output.grid.size, (4, 4));
        assert_eq!(output.grid.xy_min, (1.0, 0.0));
        assert_eq!((output.dataset.width, output.dataset.height), (4, 4));
        // Row 0 of the crop is source row 1, column 0 is source column 1.
        assert_eq!(output.dataset.var("a").unwrap().data[0], 11.0);
    }

    #[test]
    fn test_bbox_outside_source() {
        let output = Subsetter
            .transform(cube(CubeConfig::new().with_bbox([20.0, 20.0, 30.0, 30.0])))
            .unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_bbox_in_other_crs_is_not_cropped() {
        let config = CubeConfig::new()
            .with_crs("EPSG:3857")
            .with_bbox([200_000.0, 100_000.0, 400_000.0, 300_000.0]);
        let output = Subsetter.transform(cube(config)).unwrap();
        assert_eq!(output.grid.size, (10, 5));
    }
}
