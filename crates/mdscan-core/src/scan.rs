//! Scan orchestrator: digest, hash lookup, and on a miss upload + poll.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::client::{LookupOutcome, MetaDefenderClient};
use crate::digest::sha256_file;
use crate::error::Result;
use crate::poll::Sleeper;
use crate::transport::Transport;
use crate::verdict::ScanVerdict;

/// In-flight request for one file. The digest is filled in once computed.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub path: PathBuf,
    pub sha256: Option<String>,
}

impl ScanRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sha256: None,
        }
    }

    /// Hash the file and record the digest on the request.
    pub fn compute_digest(&mut self) -> Result<&str> {
        let digest = sha256_file(&self.path)?;
        Ok(self.sha256.insert(digest).as_str())
    }
}

/// Completed scan, ready for rendering.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub path: PathBuf,
    pub sha256: String,
    pub verdict: ScanVerdict,
}

/// Run the full pipeline for one file. Any error aborts the whole scan.
pub fn run_scan<T: Transport, S: Sleeper>(
    client: &MetaDefenderClient<T>,
    path: &Path,
    sleeper: &mut S,
) -> Result<ScanReport> {
    let mut request = ScanRequest::new(path);
    info!(file = %request.path.display(), "computing SHA-256");
    let sha256 = request.compute_digest()?.to_string();
    info!(%sha256, "digest computed");

    let verdict = match client.lookup_hash(&sha256)? {
        LookupOutcome::Hit(verdict) => {
            info!(%sha256, engines = verdict.engines.len(), "cached verdict found");
            verdict
        }
        LookupOutcome::Miss => {
            warn!(%sha256, "no record of this hash, uploading file");
            let job = client.upload_file(&request.path)?;
            info!(
                data_id = %job.data_id,
                status = job.status.as_deref().unwrap_or("unknown"),
                "file queued, polling for scan result"
            );
            client.poll_result(&job, sleeper)?
        }
    };

    Ok(ScanReport {
        path: request.path,
        sha256,
        verdict,
    })
}
