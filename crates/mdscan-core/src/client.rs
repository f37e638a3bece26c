//! MetaDefender Cloud v4 client: hash lookup, file upload and result polling.
//!
//! Every call is a single blocking request authenticated with the `apikey`
//! header. Only the lookup has a non-fatal negative answer ([`LookupOutcome::Miss`]).

use std::path::Path;

use tracing::{debug, info};

use crate::api::{decode, HashLookupResponse, UploadResponse};
use crate::config::ClientConfig;
use crate::error::{Result, ScanError, Stage};
use crate::poll::{Poller, Sleeper};
use crate::transport::{HttpTransport, Transport};
use crate::verdict::{ScanVerdict, VerdictSource};

#[derive(Debug)]
pub enum LookupOutcome {
    Hit(ScanVerdict),
    /// The service has no verdict for this hash yet.
    Miss,
}

/// A file accepted for analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteJob {
    pub data_id: String,
    pub status: Option<String>,
}

#[derive(Debug)]
pub struct MetaDefenderClient<T: Transport = HttpTransport> {
    transport: T,
    config: ClientConfig,
}

impl MetaDefenderClient<HttpTransport> {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self { transport, config })
    }
}

impl<T: Transport> MetaDefenderClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Look up a SHA-256 digest.
    /// Returns `Ok(Miss)` when the body carries an `error` member, whatever the
    /// HTTP status.
    pub fn lookup_hash(&self, sha256: &str) -> Result<LookupOutcome> {
        let resp = self.transport.get(Stage::Lookup, &format!("hash/{sha256}"))?;
        let parsed: Result<HashLookupResponse> = decode(Stage::Lookup, &resp.body);

        if let Ok(HashLookupResponse {
            error: Some(err), ..
        }) = &parsed
        {
            debug!(sha256, status = resp.status, "lookup miss: {err}");
            return Ok(LookupOutcome::Miss);
        }
        if !resp.is_success() {
            return Err(ScanError::transport(
                Stage::Lookup,
                format!("HTTP {}: {}", resp.status, resp.excerpt()),
            ));
        }

        let parsed = parsed?;
        let results = parsed
            .scan_results
            .ok_or_else(|| ScanError::transport(Stage::Lookup, "response has no scan_results"))?;
        let verdict = ScanVerdict::from_results(results, parsed.file_info, VerdictSource::CacheHit)
            .ok_or_else(|| ScanError::transport(Stage::Lookup, "response has no scan_details"))?;
        Ok(LookupOutcome::Hit(verdict))
    }

    /// Upload a file for analysis. The whole file is read into the request
    /// body before sending.
    pub fn upload_file(&self, path: &Path) -> Result<RemoteJob> {
        if !path.is_file() {
            return Err(ScanError::FileNotFound(path.to_path_buf()));
        }
        let contents = std::fs::read(path).map_err(|source| ScanError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        info!(file_name = %file_name, bytes = contents.len(), "uploading file for analysis");
        let resp = self.transport.post_file("file", &file_name, contents)?;
        let parsed: Result<UploadResponse> = decode(Stage::Upload, &resp.body);

        if let Ok(UploadResponse {
            error: Some(err), ..
        }) = &parsed
        {
            return Err(ScanError::UploadRejected(err.to_string()));
        }
        if !resp.is_success() {
            return Err(ScanError::transport(
                Stage::Upload,
                format!("HTTP {}: {}", resp.status, resp.excerpt()),
            ));
        }

        let parsed = parsed?;
        let data_id = parsed
            .data_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ScanError::transport(Stage::Upload, "response has no data_id"))?;
        Ok(RemoteJob {
            data_id,
            status: parsed.status,
        })
    }

    /// Poll until the job's analysis completes or the attempt budget runs out.
    pub fn poll_result<S: Sleeper>(&self, job: &RemoteJob, sleeper: &mut S) -> Result<ScanVerdict> {
        Poller::new(
            &self.transport,
            &job.data_id,
            self.config.poll_interval,
            self.config.max_poll_attempts,
            sleeper,
        )
        .run()
    }
}
