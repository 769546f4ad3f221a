//! Results returned to generator callers.

use crate::error::GeneratorError;
use cube_common::Attrs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const STATUS_CODE_CREATED: u16 = 201;
pub const STATUS_CODE_EMPTY: u16 = 422;
pub const STATUS_CODE_OK: u16 = 200;

/// Serialized shape shared by all results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultDocument<T> {
    pub status: String,
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_traceback: Option<String>,
}

impl<T> ResultDocument<T> {
    fn error(message: String, status_code: u16, traceback: Option<String>, remote_traceback: Option<String>) -> Self {
        Self {
            status: "error".to_string(),
            status_code,
            message: Some(message),
            result: None,
            traceback,
            remote_traceback,
        }
    }
}

/// Reference to a written cube.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CubeReference {
    pub data_id: String,
}

/// Outcome of a generator run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    into = "ResultDocument<CubeReference>",
    try_from = "ResultDocument<CubeReference>"
)]
pub enum CubeGeneratorResult {
    /// The cube was written.
    Ok { data_id: String, message: String },
    /// The cube was empty and nothing was written.
    Warning { message: String },
    /// The run failed.
    Error {
        message: String,
        status_code: u16,
        traceback: Option<String>,
        /// Only set by remote generators.
        remote_traceback: Option<String>,
    },
}

impl CubeGeneratorResult {
    pub fn generated(data_id: impl Into<String>, total_time: f64) -> Self {
        Self::Ok {
            data_id: data_id.into(),
            message: format!("Cube generated successfully after {:.2} seconds", total_time),
        }
    }

    pub fn empty(total_time: f64) -> Self {
        Self::Warning {
            message: format!(
                "An empty cube has been generated after {:.2} seconds. No data has been written at all.",
                total_time
            ),
        }
    }

    /// Degrade an error into a result carrying its local traceback.
    pub fn from_error(err: &GeneratorError) -> Self {
        Self::Error {
            message: err.to_string(),
            status_code: err.status_code(),
            traceback: Some(err.traceback()),
            remote_traceback: None,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Ok { .. } => "ok",
            Self::Warning { .. } => "warning",
            Self::Error { .. } => "error",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::Ok { .. } => STATUS_CODE_CREATED,
            Self::Warning { .. } => STATUS_CODE_EMPTY,
            Self::Error { status_code, .. } => *status_code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Ok { message, .. } | Self::Warning { message } | Self::Error { message, .. } => message,
        }
    }

    pub fn data_id(&self) -> Option<&str> {
        match self {
            Self::Ok { data_id, .. } => Some(data_id),
            _ => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

impl From<CubeGeneratorResult> for ResultDocument<CubeReference> {
    fn from(result: CubeGeneratorResult) -> Self {
        let status = result.status().to_string();
        let status_code = result.status_code();
        match result {
            CubeGeneratorResult::Ok { data_id, message } => Self {
                status,
                status_code,
                message: Some(message),
                result: Some(CubeReference { data_id }),
                traceback: None,
                remote_traceback: None,
            },
            CubeGeneratorResult::Warning { message } => Self {
                status,
                status_code,
                message: Some(message),
                result: None,
                traceback: None,
                remote_traceback: None,
            },
            CubeGeneratorResult::Error {
                message,
                status_code,
                traceback,
                remote_traceback,
            } => Self::error(message, status_code, traceback, remote_traceback),
        }
    }
}

impl TryFrom<ResultDocument<CubeReference>> for CubeGeneratorResult {
    type Error = String;

    fn try_from(doc: ResultDocument<CubeReference>) -> Result<Self, String> {
        let message = doc.message.unwrap_or_default();
        match doc.status.as_str() {
            "ok" => {
                let reference = doc
                    .result
                    .ok_or_else(|| "an ok result must reference a data id".to_string())?;
                Ok(Self::Ok {
                    data_id: reference.data_id,
                    message,
                })
            }
            "warning" => Ok(Self::Warning { message }),
            "error" => Ok(CubeGeneratorResult::Error {
                message,
                status_code: doc.status_code,
                traceback: doc.traceback,
                remote_traceback: doc.remote_traceback,
            }),
            other => Err(format!("unknown result status '{}'", other)),
        }
    }
}

/// Description of the cube a request would generate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubeInfo {
    /// Sizes of the `time`, y and x dimensions.
    pub dims: BTreeMap<String, usize>,
    /// Chunk sizes per dimension.
    pub chunks: BTreeMap<String, usize>,
    /// Attributes per output variable.
    pub data_vars: BTreeMap<String, Attrs>,
    pub crs: String,
    pub bbox: [f64; 4],
    pub spatial_res: f64,
}

/// Outcome of a cube info request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ResultDocument<CubeInfo>", try_from = "ResultDocument<CubeInfo>")]
pub enum CubeInfoResult {
    Ok(CubeInfo),
    Error {
        message: String,
        status_code: u16,
        traceback: Option<String>,
    },
}

impl CubeInfoResult {
    pub fn from_error(err: &GeneratorError) -> Self {
        Self::Error {
            message: err.to_string(),
            status_code: err.status_code(),
            traceback: Some(err.traceback()),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::Ok(_) => STATUS_CODE_OK,
            Self::Error { status_code, .. } => *status_code,
        }
    }

    pub fn info(&self) -> Option<&CubeInfo> {
        match self {
            Self::Ok(info) => Some(info),
            Self::Error { .. } => None,
        }
    }
}

impl From<CubeInfoResult> for ResultDocument<CubeInfo> {
    fn from(result: CubeInfoResult) -> Self {
        match result {
            CubeInfoResult::Ok(info) => Self {
                status: "ok".to_string(),
                status_code: STATUS_CODE_OK,
                message: None,
                result: Some(info),
                traceback: None,
                remote_traceback: None,
            },
            CubeInfoResult::Error {
                message,
                status_code,
                traceback,
            } => Self::error(message, status_code, traceback, None),
        }
    }
}

impl TryFrom<ResultDocument<CubeInfo>> for CubeInfoResult {
    type Error = String;

    fn try_from(doc: ResultDocument<CubeInfo>) -> Result<Self, String> {
        match (doc.status.as_str(), doc.result) {
            ("ok", Some(info)) => Ok(Self::Ok(info)),
            ("ok", None) => Err("an ok cube info result must carry a result".to_string()),
            ("error", _) => Ok(CubeInfoResult::Error {
                message: doc.message.unwrap_or_default(),
                status_code: doc.status_code,
                traceback: doc.traceback,
            }),
            (other, _) => Err(format!("unknown result status '{}'", other)),
        }
    }
}
