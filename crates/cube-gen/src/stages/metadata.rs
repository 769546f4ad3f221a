use super::{CubeTransformer, TransformedCube};
use crate::error::StageResult;
use chrono::Utc;
use cube_common::{format_datetime, transform_point, Attrs, CrsCode, Dataset};
use grid_mapping::Grid;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use tracing::{debug, warn};

const CONVENTIONS: &str = "CF-1.7";
const DEFAULT_TITLE: &str = "Data cube";

/// Name of the grid mapping variable added to cubes that need one.
const GRID_MAPPING_VAR: &str = "crs";

/// Writes CF and ACDD attributes and merges configured metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataAdjuster;

impl MetadataAdjuster {
    pub fn new() -> Self {
        Self
    }
}

impl CubeTransformer for MetadataAdjuster {
    fn transform(&self, cube: TransformedCube) -> StageResult<TransformedCube> {
        let TransformedCube {
            mut dataset,
            grid,
            config,
        } = cube;
        let now = format_datetime(&Utc::now());
        let attrs = &mut dataset.attrs;

        attrs.insert("Conventions".to_string(), json!(CONVENTIONS));
        attrs
            .entry("title".to_string())
            .or_insert_with(|| json!(DEFAULT_TITLE));

        let entry = format!("{}: cube generated", now);
        let history = match attrs.get("history").and_then(Value::as_str) {
            Some(previous) if !previous.is_empty() => format!("{}\n{}", previous, entry),
            _ => entry,
        };
        attrs.insert("history".to_string(), json!(history));
        attrs.insert("date_modified".to_string(), json!(now));

        geospatial_attrs(attrs, grid.crs, grid.bbox().to_array(), grid.xy_res);

        match (dataset.time.iter().min(), dataset.time.iter().max()) {
            (Some(start), Some(end)) => {
                let (start, end) = (format_datetime(start), format_datetime(end));
                attrs.insert("time_coverage_start".to_string(), json!(start));
                attrs.insert("time_coverage_end".to_string(), json!(end));
            }
            _ => {
                attrs.remove("time_coverage_start");
                attrs.remove("time_coverage_end");
            }
        }

        for (key, value) in &config.metadata {
            attrs.insert(key.clone(), value.clone());
        }

        encode_grid_mapping(&mut dataset, &grid);
        for (name, var_attrs) in &config.variable_metadata {
            match dataset.data_vars.get_mut(name) {
                Some(var) => {
                    for (key, value) in var_attrs {
                        var.attrs.insert(key.clone(), value.clone());
                    }
                }
                None => warn!(variable = %name, "Metadata given for a variable not in the cube"),
            }
        }

        debug!(attributes = dataset.attrs.len(), "Adjusted cube metadata");
        Ok(TransformedCube::new(dataset, grid, config))
    }
}

/// The grid mapping variable a cube on `grid` gets. Geographic grids whose
/// coordinates and dimensions are both named `lon`/`lat` need none.
pub(crate) fn grid_mapping_var(grid: &Grid) -> Option<&'static str> {
    let lon_lat = ("lon".to_string(), "lat".to_string());
    let plain_lon_lat = grid.crs.is_geographic() && grid.xy_var_names == lon_lat && grid.xy_dim_names == lon_lat;
    (!plain_lon_lat).then_some(GRID_MAPPING_VAR)
}

/// Point every data variable at a CF grid mapping variable describing the
/// grid CRS.
///
/// Grid mapping variables the data variables already reference are replaced
/// under their existing name. References to variables that do not exist are
/// dropped.
fn encode_grid_mapping(dataset: &mut Dataset, grid: &Grid) {
    let referenced: BTreeSet<String> = dataset
        .data_vars
        .values()
        .filter_map(|var| var.attrs.get("grid_mapping").and_then(Value::as_str))
        .filter(|name| dataset.scalar_vars.contains_key(*name))
        .map(str::to_string)
        .collect();
    for name in &referenced {
        dataset.scalar_vars.remove(name);
    }

    let name = match referenced.into_iter().next() {
        Some(previous) => previous,
        None => match grid_mapping_var(grid) {
            Some(name) => name.to_string(),
            None => {
                for var in dataset.data_vars.values_mut() {
                    var.attrs.remove("grid_mapping");
                }
                return;
            }
        },
    };

    for var in dataset.data_vars.values_mut() {
        var.attrs.insert("grid_mapping".to_string(), json!(name));
    }
    dataset.scalar_vars.insert(name, grid.crs.cf_attrs());
}

/// ACDD `geospatial_*` attributes. Bounds are given in lon/lat whenever the
/// grid CRS can be transformed to WGS84.
fn geospatial_attrs(attrs: &mut Attrs, crs: CrsCode, bbox: [f64; 4], xy_res: (f64, f64)) {
    attrs.insert("geospatial_bounds_crs".to_string(), json!(crs.to_string()));

    let corners = [(bbox[0], bbox[1]), (bbox[2], bbox[3])];
    let lon_lat: Option<Vec<(f64, f64)>> = corners
        .iter()
        .map(|&(x, y)| transform_point(crs, CrsCode::Epsg4326, x, y))
        .collect();
    let Some(lon_lat) = lon_lat.filter(|c| c.iter().all(|(x, y)| x.is_finite() && y.is_finite())) else {
        return;
    };

    attrs.insert("geospatial_lon_min".to_string(), json!(lon_lat[0].0));
    attrs.insert("geospatial_lat_min".to_string(), json!(lon_lat[0].1));
    attrs.insert("geospatial_lon_max".to_string(), json!(lon_lat[1].0));
    attrs.insert("geospatial_lat_max".to_string(), json!(lon_lat[1].1));
    attrs.insert("geospatial_lon_units".to_string(), json!("degrees_east"));
    attrs.insert("geospatial_lat_units".to_string(), json!("degrees_north"));
    if crs.is_geographic() {
        attrs.insert("geospatial_lon_resolution".to_string(), json!(xy_res.0));
        attrs.insert("geospatial_lat_resolution".to_string(), json!(xy_res.1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CubeConfig;
    use chrono::{TimeZone, Utc};
    use cube_common::Variable;
    use std::sync::Arc;

    fn cube(config: CubeConfig) -> TransformedCube {
        let times = vec![
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 9, 0, 0, 0).unwrap(),
        ];
        let mut ds = Dataset::rectilinear(CrsCode::Epsg4326, vec![10.25, 10.75], vec![50.75, 50.25], times)
            .unwrap()
            .with_var("chl", Variable::filled(8, 1.0))
            .unwrap();
        ds.attrs.insert("history".to_string(), json!("ingested"));
        let grid = Grid::from_dataset(&ds).unwrap();
        TransformedCube::new(ds, grid, Arc::new(config))
    }

    #[test]
    fn test_cf_attributes() {
        let output = MetadataAdjuster.transform(cube(CubeConfig::new())).unwrap();
        let attrs = &output.dataset.attrs;
        assert_eq!(attrs["Conventions"], "CF-1.7");
        assert_eq!(attrs["title"], "Data cube");
        assert!(attrs["history"].as_str().unwrap().starts_with("ingested\n"));
        assert_eq!(attrs["geospatial_lon_min"], 10.0);
        assert_eq!(attrs["geospatial_lat_max"], 51.0);
        assert_eq!(attrs["geospatial_lon_resolution"], 0.5);
        assert_eq!(attrs["time_coverage_start"], "2024-01-01T00:00:00Z");
        assert_eq!(attrs["time_coverage_end"], "2024-01-09T00:00:00Z");
        // Plain lon/lat grids carry no grid mapping variable
        assert!(output.dataset.var("chl").unwrap().attrs.get("grid_mapping").is_none());
        assert!(output.dataset.scalar_vars.is_empty());
    }

    fn mercator_cube() -> TransformedCube {
        let times = vec![Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()];
        let ds = Dataset::rectilinear(CrsCode::Epsg3857, vec![500.0, 1500.0], vec![1500.0, 500.0], times)
            .unwrap()
            .with_var("chl", Variable::filled(4, 1.0))
            .unwrap()
            .with_var("tsm", Variable::filled(4, 2.0))
            .unwrap();
        let grid = Grid::from_dataset(&ds).unwrap();
        TransformedCube::new(ds, grid, Arc::new(CubeConfig::new()))
    }

    #[test]
    fn test_projected_grid_gets_crs_variable() {
        let output = MetadataAdjuster.transform(mercator_cube()).unwrap();
        let ds = &output.dataset;
        for var in ds.data_vars.values() {
            let name = var.attrs["grid_mapping"].as_str().unwrap();
            assert_eq!(name, "crs");
            assert!(ds.has_variable(name));
        }
        assert_eq!(ds.scalar_vars["crs"], CrsCode::Epsg3857.cf_attrs());
    }

    #[test]
    fn test_existing_grid_mapping_is_replaced() {
        let mut cube = mercator_cube();
        cube.dataset
            .scalar_vars
            .insert("spatial_ref".to_string(), CrsCode::Epsg4326.cf_attrs());
        for var in cube.dataset.data_vars.values_mut() {
            var.attrs.insert("grid_mapping".to_string(), json!("spatial_ref"));
        }
        let output = MetadataAdjuster.transform(cube).unwrap();
        let ds = &output.dataset;
        assert_eq!(ds.scalar_vars.len(), 1);
        assert_eq!(ds.scalar_vars["spatial_ref"]["grid_mapping_name"], "mercator");
        assert_eq!(ds.var("tsm").unwrap().attrs["grid_mapping"], "spatial_ref");
    }

    #[test]
    fn test_dangling_grid_mapping_dropped_on_lon_lat() {
        let mut cube = cube(CubeConfig::new());
        for var in cube.dataset.data_vars.values_mut() {
            var.attrs.insert("grid_mapping".to_string(), json!("latitude_longitude"));
        }
        let output = MetadataAdjuster.transform(cube).unwrap();
        assert!(output.dataset.var("chl").unwrap().attrs.get("grid_mapping").is_none());
        assert!(output.dataset.scalar_vars.is_empty());
    }

    #[test]
    fn test_configured_metadata_wins() {
        let config = CubeConfig::new()
            .with_metadata("title", "North Sea chlorophyll")
            .with_variable_metadata("chl", "units", "mg m-3")
            .with_variable_metadata("missing", "units", "1");
        let output = MetadataAdjuster.transform(cube(config)).unwrap();
        assert_eq!(output.dataset.attrs["title"], "North Sea chlorophyll");
        assert_eq!(output.dataset.var("chl").unwrap().attrs["units"], "mg m-3");
        assert!(output.dataset.var("missing").is_none());
    }

    #[test]
    fn test_mercator_bounds_in_degrees() {
        let mut attrs = Attrs::new();
        geospatial_attrs(&mut attrs, CrsCode::Epsg3857, [0.0, 0.0, 111_319.49, 111_325.14], (1000.0, 1000.0));
        assert_eq!(attrs["geospatial_bounds_crs"], "EPSG:3857");
        let lon_max = attrs["geospatial_lon_max"].as_f64().unwrap();
        let lat_max = attrs["geospatial_lat_max"].as_f64().unwrap();
        assert!((lon_max - 1.0).abs() < 1e-3);
        assert!((lat_max - 1.0).abs() < 1e-3);
        assert!(attrs.get("geospatial_lon_resolution").is_none());
    }

    #[test]
    fn test_polar_bounds_skipped() {
        let mut attrs = Attrs::new();
        geospatial_attrs(&mut attrs, CrsCode::Epsg3031, [0.0, 0.0, 1000.0, 1000.0], (1.0, 1.0));
        assert!(attrs.get("geospatial_lon_min").is_none());
        assert_eq!(attrs["geospatial_bounds_crs"], "EPSG:3031");
    }
}
