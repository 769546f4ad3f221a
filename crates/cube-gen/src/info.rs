//! Dry runs describing the cube a request would produce.

use crate::config::GeneratorConfig;
use crate::error::{GeneratorError, Result};
use crate::generator::PreparedRequest;
use crate::resampling::{needs_resampling, resolve_target_grid};
use crate::response::CubeInfo;
use crate::stages::{grid_mapping_var, InputStages, StageKind, TransformedCube};
use chrono::{DateTime, Utc};
use cube_common::Attrs;
use cube_store::StorePool;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// Open, subset and resample the inputs in time, then report the target
/// grid, dimensions, chunking and variables without resampling in space or
/// writing anything.
pub(crate) fn describe_cube(
    store_pool: &Arc<StorePool>,
    prepared: &PreparedRequest,
    config: &GeneratorConfig,
) -> Result<CubeInfo> {
    let cube_config = &prepared.cube_config;
    let inputs = &prepared.request.input_configs;

    let input_stages = InputStages::new(store_pool.clone(), cube_config.clone(), inputs, config.interpolation)?;
    let mut cubes: Vec<TransformedCube> = Vec::with_capacity(inputs.len());
    for input in inputs {
        cubes.push(input_stages.process(input, StageKind::ResampleTime, |_| {})?);
    }

    let first = cubes
        .iter()
        .find(|c| !c.is_empty())
        .or_else(|| cubes.first())
        .ok_or_else(|| GeneratorError::configuration("No input configuration given"))?;
    let grid = if needs_resampling(inputs, cube_config) {
        resolve_target_grid(&first.grid, cube_config)
            .map_err(|e| GeneratorError::from_stage(StageKind::ResampleSpace, e))?
    } else {
        first.grid.clone()
    };

    let times: BTreeSet<DateTime<Utc>> = cubes
        .iter()
        .filter(|c| !c.is_empty())
        .flat_map(|c| c.dataset.time.iter().copied())
        .collect();

    let (width, height) = grid.size;
    let (tile_w, tile_h) = match cube_config.tile_size {
        Some([w, h]) => (w, h),
        None => (
            grid.tile_size.0.min(config.default_tile_size),
            grid.tile_size.1.min(config.default_tile_size),
        ),
    };
    let (x_dim, y_dim) = grid.xy_dim_names.clone();

    let dims = BTreeMap::from([
        ("time".to_string(), times.len()),
        (y_dim.clone(), height),
        (x_dim.clone(), width),
    ]);
    let chunks = BTreeMap::from([
        ("time".to_string(), 1),
        (y_dim, tile_h.min(height).max(1)),
        (x_dim, tile_w.min(width).max(1)),
    ]);

    let mut data_vars: BTreeMap<String, Attrs> = BTreeMap::new();
    for cube in cubes.iter().filter(|c| !c.is_empty()) {
        for (name, var) in &cube.dataset.data_vars {
            data_vars.entry(name.clone()).or_insert_with(|| var.attrs.clone());
        }
    }
    let grid_mapping = cubes
        .iter()
        .filter(|c| !c.is_empty())
        .flat_map(|c| {
            c.dataset
                .data_vars
                .values()
                .filter_map(|var| var.attrs.get("grid_mapping").and_then(Value::as_str))
                .filter(move |name| c.dataset.scalar_vars.contains_key(*name))
        })
        .min()
        .or_else(|| grid_mapping_var(&grid))
        .map(str::to_string);
    for (name, attrs) in data_vars.iter_mut() {
        match &grid_mapping {
            Some(var) => {
                attrs.insert("grid_mapping".to_string(), json!(var));
            }
            None => {
                attrs.remove("grid_mapping");
            }
        }
        if let Some(extra) = cube_config.variable_metadata.get(name) {
            attrs.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }

    debug!(
        width = width,
        height = height,
        time_steps = times.len(),
        variables = data_vars.len(),
        "Described cube"
    );

    Ok(CubeInfo {
        dims,
        chunks,
        data_vars,
        crs: grid.crs.to_string(),
        bbox: grid.bbox().to_array(),
        spatial_res: grid.xy_res.0,
    })
}
