use super::{transform_cube, Opener, SpatialResampler, Stage, StageKind, Subsetter, TimeResampler, TransformedCube};
use crate::config::CubeConfig;
use crate::error::{GeneratorError, Result};
use crate::resampling::needs_resampling;
use cube_store::{InputConfig, StorePool};
use grid_mapping::InterpolationMethod;
use std::sync::Arc;

/// Opening, subsetting and resampling in time and space.
///
/// Built once per run and applied to every input in turn, so the spatial
/// resampler resolves a single target grid for all of them.
#[derive(Debug)]
pub struct InputStages {
    opener: Opener,
    subset: Stage,
    resample_time: Stage,
    resample_space: Stage,
}

impl InputStages {
    pub fn new(
        store_pool: Arc<StorePool>,
        cube_config: Arc<CubeConfig>,
        inputs: &[InputConfig],
        interpolation: InterpolationMethod,
    ) -> Result<Self> {
        let resample_time = match cube_config.parsed_time_period()? {
            Some(period) => Stage::ResampleTime(TimeResampler::new(period)),
            None => Stage::Identity,
        };
        let resample_space = if needs_resampling(inputs, &cube_config) {
            Stage::ResampleSpace(SpatialResampler::new(interpolation))
        } else {
            Stage::Identity
        };
        Ok(Self {
            opener: Opener::new(store_pool, cube_config),
            subset: Stage::Subset(Subsetter::new()),
            resample_time,
            resample_space,
        })
    }

    /// Run the steps for one input, up to and including `last`.
    ///
    /// `on_step` is called before each step starts.
    pub fn process(
        &self,
        input: &InputConfig,
        last: StageKind,
        mut on_step: impl FnMut(StageKind),
    ) -> Result<TransformedCube> {
        on_step(StageKind::Open);
        let mut cube = self
            .opener
            .open_cube(input)
            .map_err(|e| GeneratorError::from_stage(StageKind::Open, e))?;
        if last == StageKind::Open {
            return Ok(cube);
        }

        let steps = [
            (StageKind::Subset, &self.subset),
            (StageKind::ResampleTime, &self.resample_time),
            (StageKind::ResampleSpace, &self.resample_space),
        ];
        for (kind, stage) in steps {
            on_step(kind);
            cube = transform_cube(cube, stage, kind)?;
            if kind == last {
                break;
            }
        }
        Ok(cube)
    }
}
