//! Service configuration.

use anyhow::{Context, Result};
use cube_gen::GeneratorConfig;
use cube_store::{StorePool, StorePoolConfig};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Top-level cubegen configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CubegenConfig {
    /// Store pool document (YAML or JSON)
    pub stores_path: PathBuf,

    /// Generator runtime settings
    pub generator: GeneratorConfig,
}

impl CubegenConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let stores_path = env::var("CUBEGEN_STORES")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/etc/cubegen/stores.yaml"));

        Self {
            stores_path,
            generator: GeneratorConfig::from_env(),
        }
    }

    /// Check the configuration before any store is opened.
    pub fn validate(&self) -> Result<()> {
        self.generator
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid generator configuration: {}", e))
    }

    /// Build the store pool described by `stores_path`.
    pub fn store_pool(&self) -> Result<StorePool> {
        let pool_config = StorePoolConfig::from_file(&self.stores_path)
            .with_context(|| format!("failed to load store pool from {}", self.stores_path.display()))?;
        Ok(StorePool::from_config(&pool_config)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_store_pool_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("stores.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "stores:\n  mem:\n    type: memory\n  out:\n    type: zarr\n    root: {}",
            dir.path().join("out").display()
        )
        .unwrap();

        let config = CubegenConfig {
            stores_path: path,
            generator: GeneratorConfig::default(),
        };
        config.validate().unwrap();
        let pool = config.store_pool().unwrap();
        assert!(pool.has_store("mem"));
        assert!(pool.has_store("out"));
    }

    #[test]
    fn test_missing_store_file() {
        let config = CubegenConfig {
            stores_path: PathBuf::from("/nonexistent/stores.yaml"),
            generator: GeneratorConfig::default(),
        };
        let err = config.store_pool().unwrap_err();
        assert!(err.to_string().contains("failed to load store pool"));
    }
}
