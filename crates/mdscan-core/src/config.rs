//! Client configuration.
//!
//! The API key is always supplied at runtime, either explicitly or from the
//! `METADEFENDER_API_KEY` environment variable.

use std::fmt;
use std::time::Duration;

use crate::error::{Result, ScanError};

pub const API_KEY_ENV: &str = "METADEFENDER_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://api.metadefender.com/v4";

/// Wait between two poll attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 6;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// API credential. `Debug` never prints the token.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Err(ScanError::Config("API key is empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(****)")
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: ApiKey,
    pub base_url: String,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    /// Per-request timeout; `None` leaves requests unbounded.
    pub request_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            api_key: ApiKey::new(api_key)?,
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        })
    }

    /// Create a config from the `METADEFENDER_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let key = std::env::var(API_KEY_ENV)
            .map_err(|_| ScanError::Config(format!("{API_KEY_ENV} environment variable not set")))?;
        Self::new(key).map_err(|_| ScanError::Config(format!("{API_KEY_ENV} is empty")))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_poll_attempts(mut self, attempts: u32) -> Result<Self> {
        if attempts == 0 {
            return Err(ScanError::Config(
                "max poll attempts must be at least 1".into(),
            ));
        }
        self.max_poll_attempts = attempts;
        Ok(self)
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Join an endpoint path such as `hash/<sha256>` onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}
