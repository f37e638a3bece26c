//! Per-engine verdict for one file.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::api::{EngineResult, FileInfo, ScanResults};

/// Where a verdict came from. A verdict is built from exactly one response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerdictSource {
    CacheHit,
    Analysis { data_id: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanVerdict {
    pub engines: BTreeMap<String, EngineResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub source: VerdictSource,
}

impl ScanVerdict {
    /// Build from a completed `scan_results` block. Returns `None` when the
    /// block carries no `scan_details`.
    pub(crate) fn from_results(
        results: ScanResults,
        file_info: Option<FileInfo>,
        source: VerdictSource,
    ) -> Option<Self> {
        let engines = results.scan_details?;
        Some(Self {
            engines,
            overall: results.scan_all_result_a,
            display_name: file_info.and_then(|info| info.display_name),
            source,
        })
    }

    pub fn detections(&self) -> usize {
        self.engines.values().filter(|e| e.is_detection()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}
