//! The pipeline orchestrator.
//!
//! A run moves through these states:
//!
//! ```text
//! Opening(i) ─► Subsetting(i) ─► ResamplingTime(i) ─► ResamplingSpace(i) ─┐
//!      ▲                                                                  │
//!      └──────────────────────────── next input ◄─────────────────────────┘
//!                                        │
//!                                        ▼
//! Combining ─► Rechunking ─► ExecutingUserCode ─► PostRechunking
//!           ─► AdjustingMetadata ─► Writing ─► Done | EmptyWarning | Failed
//! ```

use crate::config::{CubeConfig, GeneratorConfig};
use crate::error::{GeneratorError, Result};
use crate::info::describe_cube;
use crate::progress::{LoggingProgressObserver, ProgressObserver, ProgressTracker};
use crate::request::CubeGeneratorRequest;
use crate::response::{CubeGeneratorResult, CubeInfoResult};
use crate::stages::{
    transform_cube, Combiner, InputStages, MetadataAdjuster, Rechunker, Stage, StageKind,
    TransformedCube, UserCodeExecutor, Writer,
};
use crate::usercode::{UserCode, UserCodeRegistry};
use cube_store::StorePool;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

// Stage weights, in progress work units.
const OPEN_WEIGHT: f64 = 10.0;
const SUBSET_WEIGHT: f64 = 1.0;
const RESAMPLE_TIME_WEIGHT: f64 = 1.0;
const RESAMPLE_SPACE_WEIGHT: f64 = 20.0;
const COMBINE_WEIGHT_PER_INPUT: f64 = 1.0;
const RECHUNK_WEIGHT: f64 = 1.0;
const USER_CODE_WEIGHT: f64 = 1.0;
const POST_RECHUNK_WEIGHT: f64 = 1.0;
const METADATA_WEIGHT: f64 = 1.0;
const WRITE_WEIGHT: f64 = 100.0;

const INPUT_WEIGHT: f64 = OPEN_WEIGHT + SUBSET_WEIGHT + RESAMPLE_TIME_WEIGHT + RESAMPLE_SPACE_WEIGHT;

fn input_step_weight(kind: StageKind) -> f64 {
    match kind {
        StageKind::Open => OPEN_WEIGHT,
        StageKind::Subset => SUBSET_WEIGHT,
        StageKind::ResampleTime => RESAMPLE_TIME_WEIGHT,
        StageKind::ResampleSpace => RESAMPLE_SPACE_WEIGHT,
        _ => 0.0,
    }
}

/// Total work of a run over `num_inputs` inputs.
pub fn total_work(num_inputs: usize) -> f64 {
    let n = num_inputs as f64;
    n * INPUT_WEIGHT
        + n * COMBINE_WEIGHT_PER_INPUT
        + RECHUNK_WEIGHT
        + USER_CODE_WEIGHT
        + POST_RECHUNK_WEIGHT
        + METADATA_WEIGHT
        + WRITE_WEIGHT
}

/// Generates data cubes from requests.
pub trait CubeGenerator {
    /// Run the pipeline and write the cube.
    fn generate(&self, request: CubeGeneratorRequest) -> Result<CubeGeneratorResult>;

    /// Describe the cube `generate` would produce without writing it.
    fn cube_info(&self, request: CubeGeneratorRequest) -> Result<CubeInfoResult>;
}

/// A request that passed normalisation and validation.
pub(crate) struct PreparedRequest {
    pub request: CubeGeneratorRequest,
    pub cube_config: Arc<CubeConfig>,
    pub user_code: UserCode,
}

/// Runs the pipeline in the calling thread against a shared store pool.
pub struct LocalCubeGenerator {
    store_pool: Arc<StorePool>,
    registry: Arc<UserCodeRegistry>,
    config: GeneratorConfig,
    observers: Vec<Arc<dyn ProgressObserver>>,
}

impl LocalCubeGenerator {
    pub fn new(store_pool: Arc<StorePool>, config: GeneratorConfig) -> Self {
        let mut observers: Vec<Arc<dyn ProgressObserver>> = Vec::new();
        if config.verbosity > 0 {
            observers.push(Arc::new(LoggingProgressObserver));
        }
        Self {
            store_pool,
            registry: Arc::new(UserCodeRegistry::new()),
            config,
            observers,
        }
    }

    pub fn with_registry(mut self, registry: Arc<UserCodeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Register an observer for every run of this generator.
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Like [`CubeGenerator::generate`], with extra observers attached for
    /// this run only.
    pub fn generate_observed(
        &self,
        request: CubeGeneratorRequest,
        observers: &[Arc<dyn ProgressObserver>],
    ) -> Result<CubeGeneratorResult> {
        let observers: Vec<Arc<dyn ProgressObserver>> =
            self.observers.iter().chain(observers).cloned().collect();
        let outcome = self
            .prepare(request)
            .and_then(|prepared| self.run(prepared, &observers));
        self.settle(outcome, CubeGeneratorResult::from_error)
    }

    /// Normalise the request and validate everything that can be checked
    /// before data is touched.
    pub(crate) fn prepare(&self, request: CubeGeneratorRequest) -> Result<PreparedRequest> {
        self.config.validate().map_err(GeneratorError::configuration)?;
        let request = request.normalize()?;
        request.cube_config.validate()?;
        let user_code = UserCode::resolve(request.code_config.as_ref(), &self.registry)?;
        let cube_config = Arc::new(request.cube_config.clone());
        Ok(PreparedRequest {
            request,
            cube_config,
            user_code,
        })
    }

    #[instrument(skip_all, fields(inputs = prepared.request.input_configs.len()))]
    fn run(&self, prepared: PreparedRequest, observers: &[Arc<dyn ProgressObserver>]) -> Result<CubeGeneratorResult> {
        let PreparedRequest {
            request,
            cube_config,
            user_code,
        } = prepared;
        let inputs = &request.input_configs;
        info!(
            inputs = inputs.len(),
            output_store = %request.output_config.store_id,
            "Generating cube"
        );

        let input_stages = InputStages::new(
            self.store_pool.clone(),
            cube_config.clone(),
            inputs,
            self.config.interpolation,
        )?;
        let rechunker = Stage::Rechunk(Rechunker::new(self.config.default_tile_size));
        let (user_code_stage, post_rechunker) = match user_code {
            UserCode::None => (Stage::Identity, Stage::Identity),
            UserCode::Validated(code) => (
                Stage::UserCode(UserCodeExecutor::new(code)),
                Stage::Rechunk(Rechunker::new(self.config.default_tile_size)),
            ),
        };
        let metadata = Stage::AdjustMetadata(MetadataAdjuster::new());
        let writer = Writer::new(
            self.store_pool.clone(),
            request.output_config.clone(),
            self.config.zarr_compression,
        );

        let mut tracker = ProgressTracker::begin("Generating cube", total_work(inputs.len()), observers);

        let mut cubes: Vec<TransformedCube> = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.iter().enumerate() {
            debug!(input = index, data_id = %input.data_id, "Processing input");
            let mut scope = tracker.nested(INPUT_WEIGHT, INPUT_WEIGHT);

            let cube = input_stages.process(input, StageKind::ResampleSpace, |kind| {
                scope.begin_step(kind.label(), input_step_weight(kind))
            })?;
            scope.finish();
            cubes.push(cube);
        }

        tracker.begin_step(StageKind::Combine.label(), COMBINE_WEIGHT_PER_INPUT * inputs.len() as f64);
        debug!(stage = %StageKind::Combine, "Transforming cube");
        let cube = Combiner::new()
            .combine_cubes(cubes)
            .map_err(|e| GeneratorError::from_stage(StageKind::Combine, e))?;

        let post_combine = [
            (&rechunker, StageKind::Rechunk, RECHUNK_WEIGHT),
            (&user_code_stage, StageKind::UserCode, USER_CODE_WEIGHT),
            (&post_rechunker, StageKind::PostRechunk, POST_RECHUNK_WEIGHT),
            (&metadata, StageKind::AdjustMetadata, METADATA_WEIGHT),
        ];
        let mut cube = cube;
        for (stage, kind, weight) in post_combine {
            tracker.begin_step(kind.label(), weight);
            cube = transform_cube(cube, stage, kind)?;
        }

        if cube.is_empty() {
            let state = tracker.finish();
            info!(total_time = state.total_time, "Generated cube is empty, nothing written");
            return Ok(CubeGeneratorResult::empty(state.total_time));
        }

        tracker.begin_step(StageKind::Write.label(), WRITE_WEIGHT);
        let data_id = writer
            .write_cube(&cube)
            .map_err(|e| GeneratorError::from_stage(StageKind::Write, e))?;
        let state = tracker.finish();

        info!(data_id = %data_id, total_time = state.total_time, "Cube generated");
        Ok(CubeGeneratorResult::generated(data_id, state.total_time))
    }

    /// Return `outcome`, or degrade its error into a result document unless
    /// the generator raises errors.
    fn settle<T>(&self, outcome: Result<T>, degrade: impl FnOnce(&GeneratorError) -> T) -> Result<T> {
        match outcome {
            Ok(value) => Ok(value),
            Err(err) if self.config.raise_on_error => Err(err),
            Err(err) => {
                error!(error = %err, status_code = err.status_code(), "Cube generation failed");
                Ok(degrade(&err))
            }
        }
    }
}

impl CubeGenerator for LocalCubeGenerator {
    fn generate(&self, request: CubeGeneratorRequest) -> Result<CubeGeneratorResult> {
        self.generate_observed(request, &[])
    }

    fn cube_info(&self, request: CubeGeneratorRequest) -> Result<CubeInfoResult> {
        let outcome = self
            .prepare(request)
            .and_then(|prepared| describe_cube(&self.store_pool, &prepared, &self.config))
            .map(CubeInfoResult::Ok);
        self.settle(outcome, CubeInfoResult::from_error)
    }
}

impl std::fmt::Debug for LocalCubeGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCubeGenerator")
            .field("store_pool", &self.store_pool)
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("observers", &self.observers.len())
            .finish()
    }
}
