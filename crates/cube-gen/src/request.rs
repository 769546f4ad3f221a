//! Generator requests.

use crate::config::CubeConfig;
use crate::error::{GeneratorError, Result};
use cube_common::Attrs;
use cube_store::{InputConfig, OutputConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// User code to run on the combined cube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CodeConfig {
    /// Name under which the processor is registered.
    pub callable_ref: String,
    #[serde(default, skip_serializing_if = "Attrs::is_empty")]
    pub callable_params: Attrs,
}

impl CodeConfig {
    pub fn new(callable_ref: impl Into<String>) -> Self {
        Self {
            callable_ref: callable_ref.into(),
            callable_params: Attrs::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.callable_params.insert(key.into(), value.into());
        self
    }
}

/// A request to generate one cube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CubeGeneratorRequest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_configs: Vec<InputConfig>,

    /// Single-input shorthand, folded into `input_configs` by
    /// [`normalize`](Self::normalize).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_config: Option<InputConfig>,

    #[serde(default)]
    pub cube_config: CubeConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_config: Option<CodeConfig>,

    pub output_config: OutputConfig,
}

impl CubeGeneratorRequest {
    pub fn new(input_configs: Vec<InputConfig>, output_config: OutputConfig) -> Self {
        Self {
            input_configs,
            input_config: None,
            cube_config: CubeConfig::default(),
            code_config: None,
            output_config,
        }
    }

    pub fn with_cube_config(mut self, cube_config: CubeConfig) -> Self {
        self.cube_config = cube_config;
        self
    }

    pub fn with_code_config(mut self, code_config: CodeConfig) -> Self {
        self.code_config = Some(code_config);
        self
    }

    /// Resolve the input alias and check that there is something to open.
    pub fn normalize(mut self) -> Result<Self> {
        if let Some(input) = self.input_config.take() {
            if !self.input_configs.is_empty() {
                return Err(GeneratorError::configuration(
                    "only one of input_config and input_configs may be given",
                ));
            }
            self.input_configs.push(input);
        }
        if self.input_configs.is_empty() {
            return Err(GeneratorError::configuration(
                "at least one input configuration must be given",
            ));
        }
        Ok(self)
    }

    /// Parse a YAML document. JSON is accepted as well.
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        serde_yaml::from_str(s).map_err(|e| GeneratorError::configuration(e.to_string()))
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| GeneratorError::configuration(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GeneratorError::configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }
}
