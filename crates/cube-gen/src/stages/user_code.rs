use super::{CubeTransformer, TransformedCube};
use crate::error::{StageError, StageResult};
use crate::usercode::ValidatedUserCode;
use grid_mapping::Grid;
use tracing::{debug, instrument};

/// Runs validated user code on the combined cube.
#[derive(Debug, Clone)]
pub struct UserCodeExecutor {
    code: ValidatedUserCode,
}

impl UserCodeExecutor {
    pub fn new(code: ValidatedUserCode) -> Self {
        Self { code }
    }
}

impl CubeTransformer for UserCodeExecutor {
    #[instrument(skip(self, cube), fields(callable_ref = %self.code.callable_ref))]
    fn transform(&self, cube: TransformedCube) -> StageResult<TransformedCube> {
        let TransformedCube {
            dataset,
            grid: input_grid,
            config,
        } = cube;

        let dataset = self
            .code
            .processor
            .process(dataset, &self.code.params)
            .map_err(|e| StageError::UserCode(format!("{:#}", e)))?;

        // User code may reshape the cube, so its grid is derived again.
        let grid = if dataset.is_empty() {
            input_grid
        } else {
            Grid::from_dataset(&dataset)?.with_tile_size(input_grid.tile_size)
        };

        debug!(variables = dataset.data_vars.len(), "User code finished");
        Ok(TransformedCube::new(dataset, grid, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CubeConfig;
    use crate::usercode::UserCodeProcessor;
    use chrono::Utc;
    use cube_common::{Attrs, CrsCode, Dataset, Variable};
    use std::sync::Arc;

    struct Doubler;

    impl UserCodeProcessor for Doubler {
        fn process(&self, mut dataset: Dataset, _params: &Attrs) -> anyhow::Result<Dataset> {
            let doubled: Vec<f32> = dataset.var("a").map(|v| v.data.iter().map(|x| x * 2.0).collect()).unwrap_or_default();
            dataset.add_var("a2", Variable::new(doubled))?;
            Ok(dataset)
        }
    }

    struct Failing;

    impl UserCodeProcessor for Failing {
        fn process(&self, _dataset: Dataset, _params: &Attrs) -> anyhow::Result<Dataset> {
            anyhow::bail!("division by zero")
        }
    }

    fn executor(processor: Arc<dyn UserCodeProcessor>) -> UserCodeExecutor {
        UserCodeExecutor::new(ValidatedUserCode {
            callable_ref: "test".to_string(),
            processor,
            params: Attrs::new(),
        })
    }

    fn cube() -> TransformedCube {
        let ds = Dataset::rectilinear(CrsCode::Epsg4326, vec![0.5, 1.5], vec![0.5], vec![Utc::now()])
            .unwrap()
            .with_var("a", Variable::new(vec![1.0, 2.0]))
            .unwrap();
        let grid = Grid::from_dataset(&ds).unwrap().with_tile_size((1, 1));
        TransformedCube::new(ds, grid, Arc::new(CubeConfig::default()))
    }

    #[test]
    fn test_processor_output() {
        let output = executor(Arc::new(Doubler)).transform(cube()).unwrap();
        assert_eq!(output.dataset.var("a2").unwrap().data, vec![2.0, 4.0]);
        assert_eq!(output.grid.tile_size, (1, 1));
    }

    #[test]
    fn test_processor_failure() {
        let err = executor(Arc::new(Failing)).transform(cube()).unwrap_err();
        assert_eq!(err.to_string(), "User code failed: division by zero");
    }
}
