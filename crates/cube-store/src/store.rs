//! The data store abstraction.

use crate::error::{Result, StoreError};
use cube_common::{Attrs, Dataset};

/// A store that opens and writes datasets by identifier.
///
/// Implementations must be safe to share between concurrent generator runs.
pub trait DataStore: Send + Sync {
    /// Open a dataset.
    ///
    /// Every store understands the `variable_names` open parameter (a list
    /// of names) restricting which data variables are loaded.
    fn open_data(&self, data_id: &str, open_params: &Attrs) -> Result<Dataset>;

    /// Write a dataset under `data_id` and return the id it was written to.
    fn write_data(
        &self,
        dataset: &Dataset,
        data_id: &str,
        replace: bool,
        write_params: &Attrs,
    ) -> Result<String>;

    fn has_data(&self, data_id: &str) -> bool;

    fn list_data_ids(&self) -> Result<Vec<String>>;
}

/// Extract the `variable_names` open parameter, rejecting unknown keys.
pub(crate) fn requested_variables(open_params: &Attrs) -> Result<Option<Vec<String>>> {
    check_params(open_params, &["variable_names"])?;
    let Some(value) = open_params.get("variable_names") else {
        return Ok(None);
    };
    let names: Vec<String> = serde_json::from_value(value.clone()).map_err(|_| {
        StoreError::InvalidParams("variable_names must be a list of strings".to_string())
    })?;
    Ok(Some(names))
}

/// Fail on parameter keys outside `allowed`.
pub(crate) fn check_params(params: &Attrs, allowed: &[&str]) -> Result<()> {
    let unknown: Vec<&str> = params
        .keys()
        .map(String::as_str)
        .filter(|k| !allowed.contains(k))
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(StoreError::InvalidParams(format!(
            "unsupported parameter(s): {}",
            unknown.join(", ")
        )))
    }
}

/// Reject empty ids, absolute paths and parent references.
pub(crate) fn validate_data_id(data_id: &str) -> Result<()> {
    let invalid = data_id.trim().is_empty()
        || data_id.starts_with('/')
        || data_id.starts_with('\\')
        || data_id.split(['/', '\\']).any(|part| part == "..");
    if invalid {
        return Err(StoreError::InvalidDataId(data_id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_requested_variables() {
        let mut params = Attrs::new();
        assert_eq!(requested_variables(&params).unwrap(), None);

        params.insert("variable_names".to_string(), json!(["a", "b"]));
        assert_eq!(
            requested_variables(&params).unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );

        params.insert("variable_names".to_string(), json!("a"));
        assert!(requested_variables(&params).is_err());
    }

    #[test]
    fn test_unknown_params_rejected() {
        let mut params = Attrs::new();
        params.insert("chunks".to_string(), json!({}));
        let err = requested_variables(&params).unwrap_err();
        assert!(err.to_string().contains("chunks"));
    }

    #[test]
    fn test_validate_data_id() {
        assert!(validate_data_id("cube.zarr").is_ok());
        assert!(validate_data_id("year/2024.zarr").is_ok());
        assert!(validate_data_id("").is_err());
        assert!(validate_data_id("/etc/passwd").is_err());
        assert!(validate_data_id("../escape.zarr").is_err());
    }
}
