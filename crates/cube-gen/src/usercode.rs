//! User code run on the combined cube.

use crate::error::{GeneratorError, Result};
use crate::request::CodeConfig;
use crate::schema::ParamsSchema;
use cube_common::{Attrs, Dataset};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A dataset transformation supplied by the user.
pub trait UserCodeProcessor: Send + Sync {
    /// Schema of the accepted parameters. Must be an object schema.
    fn params_schema(&self) -> ParamsSchema {
        ParamsSchema::object()
    }

    /// Transform `dataset` with parameters that passed the schema.
    fn process(&self, dataset: Dataset, params: &Attrs) -> anyhow::Result<Dataset>;
}

/// Processors available to requests, keyed by `callable_ref`.
#[derive(Default, Clone)]
pub struct UserCodeRegistry {
    processors: HashMap<String, Arc<dyn UserCodeProcessor>>,
}

impl UserCodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, callable_ref: impl Into<String>, processor: Arc<dyn UserCodeProcessor>) {
        self.processors.insert(callable_ref.into(), processor);
    }

    pub fn with_processor(mut self, callable_ref: impl Into<String>, processor: Arc<dyn UserCodeProcessor>) -> Self {
        self.register(callable_ref, processor);
        self
    }

    pub fn get(&self, callable_ref: &str) -> Option<Arc<dyn UserCodeProcessor>> {
        self.processors.get(callable_ref).cloned()
    }

    pub fn callable_refs(&self) -> Vec<String> {
        let mut refs: Vec<String> = self.processors.keys().cloned().collect();
        refs.sort();
        refs
    }
}

impl std::fmt::Debug for UserCodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCodeRegistry")
            .field("processors", &self.callable_refs())
            .finish()
    }
}

/// A processor whose parameters passed its schema.
#[derive(Clone)]
pub struct ValidatedUserCode {
    pub callable_ref: String,
    pub processor: Arc<dyn UserCodeProcessor>,
    pub params: Attrs,
}

impl std::fmt::Debug for ValidatedUserCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatedUserCode")
            .field("callable_ref", &self.callable_ref)
            .field("params", &self.params)
            .finish()
    }
}

/// The user code of a run, resolved once before any stage runs.
#[derive(Debug, Clone)]
pub enum UserCode {
    None,
    Validated(ValidatedUserCode),
}

impl UserCode {
    /// Look up the processor and validate its parameters.
    pub fn resolve(code_config: Option<&CodeConfig>, registry: &UserCodeRegistry) -> Result<Self> {
        let Some(code_config) = code_config else {
            return Ok(UserCode::None);
        };
        let callable_ref = &code_config.callable_ref;
        let processor = registry.get(callable_ref).ok_or_else(|| {
            GeneratorError::configuration(format!("Unknown user code '{}'", callable_ref))
        })?;

        let schema = processor.params_schema();
        if !schema.is_object() {
            return Err(GeneratorError::configuration(format!(
                "Parameter schema returned by '{}' must be an object schema",
                callable_ref
            )));
        }
        schema
            .validate(&Value::Object(code_config.callable_params.clone()))
            .map_err(|violation| {
                GeneratorError::validation(format!("Invalid processing parameters: {}", violation))
            })?;

        debug!(callable_ref = %callable_ref, "Validated user code parameters");
        Ok(UserCode::Validated(ValidatedUserCode {
            callable_ref: callable_ref.clone(),
            processor,
            params: code_config.callable_params.clone(),
        }))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, UserCode::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cube_common::{CrsCode, Variable};

    struct AddConstant;

    impl UserCodeProcessor for AddConstant {
        fn params_schema(&self) -> ParamsSchema {
            ParamsSchema::object()
                .with_property("value", ParamsSchema::integer().with_minimum(1.0))
                .with_required("value")
        }

        fn process(&self, mut dataset: Dataset, params: &Attrs) -> anyhow::Result<Dataset> {
            let value = params["value"].as_f64().unwrap_or_default() as f32;
            for var in dataset.data_vars.values_mut() {
                var.data.iter_mut().for_each(|v| *v += value);
            }
            Ok(dataset)
        }
    }

    struct BadSchema;

    impl UserCodeProcessor for BadSchema {
        fn params_schema(&self) -> ParamsSchema {
            ParamsSchema::integer()
        }

        fn process(&self, dataset: Dataset, _params: &Attrs) -> anyhow::Result<Dataset> {
            Ok(dataset)
        }
    }

    fn registry() -> UserCodeRegistry {
        UserCodeRegistry::new()
            .with_processor("add", Arc::new(AddConstant))
            .with_processor("bad", Arc::new(BadSchema))
    }

    #[test]
    fn test_no_code_config() {
        assert!(UserCode::resolve(None, &registry()).unwrap().is_none());
    }

    #[test]
    fn test_resolve_and_process() {
        let config = CodeConfig::new("add").with_param("value", 2);
        let UserCode::Validated(code) = UserCode::resolve(Some(&config), &registry()).unwrap() else {
            panic!("expected validated user code");
        };
        assert_eq!(code.callable_ref, "add");

        let ds = Dataset::rectilinear(CrsCode::Epsg4326, vec![0.5], vec![0.5], vec![chrono::Utc::now()])
            .unwrap()
            .with_var("a", Variable::new(vec![1.0]))
            .unwrap();
        let out = code.processor.process(ds, &code.params).unwrap();
        assert_eq!(out.var("a").unwrap().data, vec![3.0]);
    }

    #[test]
    fn test_invalid_params() {
        let config = CodeConfig::new("add").with_param("value", 0);
        let err = UserCode::resolve(Some(&config), &registry()).unwrap_err();
        assert!(matches!(err, GeneratorError::Validation(_)));
        assert!(err
            .to_string()
            .starts_with("Invalid processing parameters: 0 is less than the minimum of 1"));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_unknown_ref_and_bad_schema() {
        let err = UserCode::resolve(Some(&CodeConfig::new("nope")), &registry()).unwrap_err();
        assert!(matches!(err, GeneratorError::Configuration(_)));

        let err = UserCode::resolve(Some(&CodeConfig::new("bad")), &registry()).unwrap_err();
        assert!(matches!(err, GeneratorError::Configuration(_)));
        assert!(err.to_string().contains("must be an object schema"));
    }
}
