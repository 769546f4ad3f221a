use super::TransformedCube;
use crate::error::{StageError, StageResult};
use chrono::{DateTime, Utc};
use cube_common::Variable;
use tracing::{debug, warn};

/// Merges the per-input cubes into one.
///
/// Empty cubes are dropped. The remaining cubes must share one grid; their
/// variables are unioned and the time axis becomes the sorted union of all
/// time steps, with NaN where a variable has no data for a step. When two
/// inputs provide the same variable, the first one wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct Combiner;

impl Combiner {
    pub fn new() -> Self {
        Self
    }

    pub fn combine_cubes(&self, cubes: Vec<TransformedCube>) -> StageResult<TransformedCube> {
        let total = cubes.len();
        let mut non_empty: Vec<TransformedCube> = Vec::with_capacity(total);
        let mut first_empty = None;
        for cube in cubes {
            if cube.is_empty() {
                first_empty.get_or_insert(cube);
            } else {
                non_empty.push(cube);
            }
        }

        if non_empty.len() <= 1 {
            return non_empty
                .pop()
                .or(first_empty)
                .ok_or_else(|| StageError::combine("no cubes to combine"));
        }

        let first = &non_empty[0];
        for (index, cube) in non_empty.iter().enumerate().skip(1) {
            if !cube.grid.same_geometry(&first.grid)
                || (cube.dataset.width, cube.dataset.height) != (first.dataset.width, first.dataset.height)
            {
                return Err(StageError::combine(format!(
                    "cube {} is not on the grid of the first cube",
                    index
                )));
            }
        }

        let mut time: Vec<DateTime<Utc>> = non_empty
            .iter()
            .flat_map(|c| c.dataset.time.iter().copied())
            .collect();
        time.sort();
        time.dedup();

        let mut out = first.dataset.without_data_vars();
        out.time = time;
        let n = out.plane_len();

        for cube in &non_empty {
            let ds = &cube.dataset;
            for (key, value) in &ds.attrs {
                out.attrs.entry(key.clone()).or_insert_with(|| value.clone());
            }

            let positions: Vec<usize> = ds
                .time
                .iter()
                .map(|t| out.time.binary_search(t).unwrap_or_default())
                .collect();

            for (name, var) in &ds.data_vars {
                if out.data_vars.contains_key(name) {
                    warn!(variable = %name, "Variable provided by more than one input, keeping the first");
                    continue;
                }
                let mut data = vec![f32::NAN; out.time.len() * n];
                for (src_t, &dst_t) in positions.iter().enumerate() {
                    data[dst_t * n..(dst_t + 1) * n].copy_from_slice(&var.data[src_t * n..(src_t + 1) * n]);
                }
                out.add_var(
                    name.clone(),
                    Variable {
                        data,
                        attrs: var.attrs.clone(),
                        chunks: var.chunks,
                    },
                )?;
            }
        }

        debug!(
            inputs = total,
            combined = non_empty.len(),
            variables = out.data_vars.len(),
            time_steps = out.time.len(),
            "Combined cubes"
        );

        let first = non_empty.swap_remove(0);
        Ok(first.with_dataset(out))
    }
}
