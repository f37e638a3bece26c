//! Typed response bodies for the MetaDefender v4 endpoints.
//!
//! Bodies are decoded once into these structures. Anything that does not fit
//! is reported by the caller as a transport error for the relevant stage.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError, Stage};

/// The `error` member the service returns instead of a result.
///
/// Usually `{"code":404003,"messages":["The hash was not found"]}`, but a
/// bare string is accepted too.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApiErrorBody {
    Message(String),
    Detailed {
        #[serde(default)]
        code: Option<i64>,
        #[serde(default)]
        messages: Vec<String>,
    },
    Other(serde_json::Value),
}

impl fmt::Display for ApiErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorBody::Message(msg) => f.write_str(msg),
            ApiErrorBody::Detailed { code, messages } => {
                let text = if messages.is_empty() {
                    "unspecified error".to_string()
                } else {
                    messages.join("; ")
                };
                match code {
                    Some(code) => write!(f, "{text} (code {code})"),
                    None => f.write_str(&text),
                }
            }
            ApiErrorBody::Other(serde_json::Value::Null) => f.write_str("unspecified error"),
            ApiErrorBody::Other(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineResult {
    pub threat_found: String,
    pub scan_time: f64,
    pub scan_result_i: f64,
    pub def_time: String,
}

impl EngineResult {
    /// An engine counts as a detection when it names a threat or reports a
    /// non-zero result code.
    pub fn is_detection(&self) -> bool {
        !self.threat_found.is_empty() || self.scan_result_i.round_ties_even() != 0.0
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanResults {
    #[serde(default)]
    pub progress_percentage: Option<f64>,
    #[serde(default)]
    pub scan_all_result_a: Option<String>,
    #[serde(default)]
    pub scan_details: Option<BTreeMap<String, EngineResult>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileInfo {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HashLookupResponse {
    #[serde(default, deserialize_with = "error_member")]
    pub error: Option<ApiErrorBody>,
    #[serde(default)]
    pub scan_results: Option<ScanResults>,
    #[serde(default)]
    pub file_info: Option<FileInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    #[serde(default, deserialize_with = "error_member")]
    pub error: Option<ApiErrorBody>,
    #[serde(default)]
    pub data_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollResponse {
    #[serde(default, deserialize_with = "error_member")]
    pub error: Option<ApiErrorBody>,
    #[serde(default)]
    pub scan_results: Option<ScanResults>,
    #[serde(default)]
    pub file_info: Option<FileInfo>,
}

/// An `error` key counts by presence alone, so `"error": null` still yields
/// `Some`. Only an absent key falls back to `None` through `#[serde(default)]`.
fn error_member<'de, D>(deserializer: D) -> std::result::Result<Option<ApiErrorBody>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    ApiErrorBody::deserialize(deserializer).map(Some)
}

/// Decode a response body, mapping any mismatch to a transport error.
pub fn decode<T: for<'de> Deserialize<'de>>(stage: Stage, body: &str) -> Result<T> {
    serde_json::from_str(body)
        .map_err(|e| ScanError::transport(stage, format!("unexpected response body: {e}")))
}
