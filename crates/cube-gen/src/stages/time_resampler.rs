use super::{CubeTransformer, TransformedCube};
use crate::error::{StageError, StageResult};
use chrono::{DateTime, Utc};
use cube_common::TimePeriod;
use std::collections::BTreeMap;
use tracing::debug;

/// Aggregates time steps into bins of the configured period.
///
/// Bins are consecutive, start at the time range start (or the first time
/// step) and are labelled by their start. Values are averaged ignoring NaN;
/// cells without any valid value stay NaN.
#[derive(Debug, Clone, Copy)]
pub struct TimeResampler {
    period: TimePeriod,
}

impl TimeResampler {
    pub fn new(period: TimePeriod) -> Self {
        Self { period }
    }
}

impl CubeTransformer for TimeResampler {
    fn transform(&self, cube: TransformedCube) -> StageResult<TransformedCube> {
        let range = cube
            .config
            .parsed_time_range()
            .map_err(|e| StageError::configuration(e.to_string()))?;
        let Some(first) = cube.dataset.time.iter().min().copied() else {
            return Ok(cube);
        };
        let origin = range.and_then(|r| r.start).unwrap_or(first);
        let period_secs = self.period.duration().num_seconds();

        let mut bins: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (index, t) in cube.dataset.time.iter().enumerate() {
            let bin = (*t - origin).num_seconds().div_euclid(period_secs);
            bins.entry(bin).or_default().push(index);
        }

        let labels: Vec<DateTime<Utc>> = bins
            .keys()
            .map(|&bin| origin + self.period.duration() * bin as i32)
            .collect();

        let ds = &cube.dataset;
        let n = ds.plane_len();
        let mut out = ds.without_data_vars();
        out.time = labels;

        for (name, var) in &ds.data_vars {
            let mut data = Vec::with_capacity(bins.len() * n);
            for indices in bins.values() {
                data.extend((0..n).map(|cell| {
                    let (sum, count) = indices
                        .iter()
                        .map(|&t| var.data[t * n + cell])
                        .filter(|v| !v.is_nan())
                        .fold((0.0_f64, 0_u32), |(s, c), v| (s + v as f64, c + 1));
                    if count == 0 {
                        f32::NAN
                    } else {
                        (sum / count as f64) as f32
                    }
                }));
            }
            out.add_var(name.clone(), var.with_data(data))?;
        }

        debug!(
            period = %self.period,
            steps_in = ds.time.len(),
            steps_out = out.time.len(),
            "Resampled cube in time"
        );
        Ok(cube.with_dataset(out))
    }
}
