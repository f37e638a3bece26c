//! Error taxonomy for the scan pipeline.
//!
//! Every variant is fatal. A cache miss on hash lookup is not an error and is
//! reported through [`crate::client::LookupOutcome::Miss`] instead.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Which remote call a transport failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Lookup,
    Upload,
    Poll,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Lookup => "hash lookup",
            Stage::Upload => "file upload",
            Stage::Poll => "result polling",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ScanError {
    /// Path does not exist or is not a regular file.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Connection failure, non-2xx status or a body that does not decode.
    #[error("{stage} failed: {message}")]
    Transport { stage: Stage, message: String },

    #[error("Upload rejected by the service: {0}")]
    UploadRejected(String),

    #[error("Scan result not ready after {attempts} attempts ({}s waited)", .waited.as_secs())]
    Timeout { attempts: u32, waited: Duration },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ScanError {
    pub fn transport(stage: Stage, message: impl Into<String>) -> Self {
        ScanError::Transport {
            stage,
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ScanError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
