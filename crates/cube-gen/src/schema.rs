//! Parameter schemas for user code.
//!
//! A small subset of JSON Schema, enough to describe the parameters a
//! processor accepts and to reject invalid ones before any data is opened.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParamsSchema {
    Object {
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        properties: BTreeMap<String, ParamsSchema>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        required: Vec<String>,
        #[serde(default = "default_additional_properties", rename = "additionalProperties")]
        additional_properties: bool,
    },
    Integer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<i64>,
    },
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
    },
    String {
        #[serde(default, skip_serializing_if = "Option::is_none", rename = "minLength")]
        min_length: Option<usize>,
    },
    Boolean,
    Array {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        items: Option<Box<ParamsSchema>>,
    },
}

fn default_additional_properties() -> bool {
    true
}

/// A value that does not satisfy a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaViolation {
    /// What is wrong with the value.
    pub message: String,
    /// The schema keyword that failed, e.g. `minimum`.
    pub keyword: &'static str,
    /// Location of the failing sub-schema, e.g. `["properties", "value"]`.
    pub schema_path: Vec<String>,
    /// The failing sub-schema.
    pub schema: Value,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path: String = self.schema_path.iter().map(|p| format!("['{}']", p)).collect();
        write!(
            f,
            "{}\n\nFailed validating '{}' in schema{}:\n    {}",
            self.message, self.keyword, path, self.schema
        )
    }
}

impl ParamsSchema {
    /// An object schema without properties that accepts anything.
    pub fn object() -> Self {
        ParamsSchema::Object {
            properties: BTreeMap::new(),
            required: Vec::new(),
            additional_properties: true,
        }
    }

    pub fn integer() -> Self {
        ParamsSchema::Integer {
            minimum: None,
            maximum: None,
        }
    }

    pub fn number() -> Self {
        ParamsSchema::Number {
            minimum: None,
            maximum: None,
        }
    }

    pub fn string() -> Self {
        ParamsSchema::String { min_length: None }
    }

    pub fn array(items: ParamsSchema) -> Self {
        ParamsSchema::Array {
            items: Some(Box::new(items)),
        }
    }

    /// Add a property to an object schema; other schemas are returned as is.
    pub fn with_property(mut self, name: impl Into<String>, schema: ParamsSchema) -> Self {
        if let ParamsSchema::Object { properties, .. } = &mut self {
            properties.insert(name.into(), schema);
        }
        self
    }

    pub fn with_required(mut self, name: impl Into<String>) -> Self {
        if let ParamsSchema::Object { required, .. } = &mut self {
            required.push(name.into());
        }
        self
    }

    pub fn deny_additional_properties(mut self) -> Self {
        if let ParamsSchema::Object {
            additional_properties, ..
        } = &mut self
        {
            *additional_properties = false;
        }
        self
    }

    /// Set the lower bound of an integer or number schema.
    pub fn with_minimum(mut self, value: f64) -> Self {
        match &mut self {
            ParamsSchema::Integer { minimum, .. } => *minimum = Some(value.ceil() as i64),
            ParamsSchema::Number { minimum, .. } => *minimum = Some(value),
            _ => {}
        }
        self
    }

    /// Set the upper bound of an integer or number schema.
    pub fn with_maximum(mut self, value: f64) -> Self {
        match &mut self {
            ParamsSchema::Integer { maximum, .. } => *maximum = Some(value.floor() as i64),
            ParamsSchema::Number { maximum, .. } => *maximum = Some(value),
            _ => {}
        }
        self
    }

    pub fn is_object(&self) -> bool {
        matches!(self, ParamsSchema::Object { .. })
    }

    fn type_name(&self) -> &'static str {
        match self {
            ParamsSchema::Object { .. } => "object",
            ParamsSchema::Integer { .. } => "integer",
            ParamsSchema::Number { .. } => "number",
            ParamsSchema::String { .. } => "string",
            ParamsSchema::Boolean => "boolean",
            ParamsSchema::Array { .. } => "array",
        }
    }

    /// Check `value` against this schema, reporting the first violation.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        self.validate_at(value, &mut Vec::new())
    }

    fn violation(&self, keyword: &'static str, message: String, path: &[String]) -> SchemaViolation {
        SchemaViolation {
            message,
            keyword,
            schema_path: path.to_vec(),
            schema: serde_json::to_value(self).unwrap_or(Value::Null),
        }
    }

    fn validate_at(&self, value: &Value, path: &mut Vec<String>) -> Result<(), SchemaViolation> {
        let wrong_type = || {
            self.violation(
                "type",
                format!("{} is not of type '{}'", value, self.type_name()),
                path,
            )
        };

        match self {
            ParamsSchema::Object {
                properties,
                required,
                additional_properties,
            } => {
                let object = value.as_object().ok_or_else(wrong_type)?;
                for name in required {
                    if !object.contains_key(name) {
                        return Err(self.violation(
                            "required",
                            format!("'{}' is a required property", name),
                            path,
                        ));
                    }
                }
                for (name, item) in object {
                    match properties.get(name) {
                        Some(schema) => {
                            path.push("properties".to_string());
                            path.push(name.clone());
                            schema.validate_at(item, path)?;
                            path.truncate(path.len() - 2);
                        }
                        None if !additional_properties => {
                            return Err(self.violation(
                                "additionalProperties",
                                format!("Additional properties are not allowed ('{}' was unexpected)", name),
                                path,
                            ));
                        }
                        None => {}
                    }
                }
                Ok(())
            }
            ParamsSchema::Integer { minimum, maximum } => {
                let number = value
                    .as_f64()
                    .filter(|n| n.fract() == 0.0)
                    .ok_or_else(wrong_type)?;
                self.check_bounds(value, number, minimum.map(|m| m as f64), maximum.map(|m| m as f64), path)
            }
            ParamsSchema::Number { minimum, maximum } => {
                let number = value.as_f64().ok_or_else(wrong_type)?;
                self.check_bounds(value, number, *minimum, *maximum, path)
            }
            ParamsSchema::String { min_length } => {
                let s = value.as_str().ok_or_else(wrong_type)?;
                match min_length {
                    Some(min) if s.chars().count() < *min => {
                        Err(self.violation("minLength", format!("{} is too short", value), path))
                    }
                    _ => Ok(()),
                }
            }
            ParamsSchema::Boolean => value.as_bool().map(|_| ()).ok_or_else(wrong_type),
            ParamsSchema::Array { items } => {
                let values = value.as_array().ok_or_else(wrong_type)?;
                if let Some(schema) = items {
                    for (index, item) in values.iter().enumerate() {
                        path.push("items".to_string());
                        let result = schema.validate_at(item, path);
                        path.pop();
                        result.map_err(|mut v| {
                            v.message = format!("{} (item {})", v.message, index);
                            v
                        })?;
                    }
                }
                Ok(())
            }
        }
    }

    fn check_bounds(
        &self,
        value: &Value,
        number: f64,
        minimum: Option<f64>,
        maximum: Option<f64>,
        path: &[String],
    ) -> Result<(), SchemaViolation> {
        if let Some(min) = minimum {
            if number < min {
                return Err(self.violation(
                    "minimum",
                    format!("{} is less than the minimum of {}", value, min),
                    path,
                ));
            }
        }
        if let Some(max) = maximum {
            if number > max {
                return Err(self.violation(
                    "maximum",
                    format!("{} is greater than the maximum of {}", value, max),
                    path,
                ));
            }
        }
        Ok(())
    }
}
