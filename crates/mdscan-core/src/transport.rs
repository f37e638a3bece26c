//! HTTP seam between the protocol clients and the network.

use reqwest::blocking::multipart::{Form, Part};
use tracing::debug;

use crate::config::{ApiKey, ClientConfig};
use crate::error::{Result, ScanError, Stage};

/// Raw response: status code plus body text. Status interpretation is left to
/// the caller because the service reports cache misses as 404 with a JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Short body excerpt for diagnostics.
    pub fn excerpt(&self) -> &str {
        let end = self
            .body
            .char_indices()
            .nth(200)
            .map(|(i, _)| i)
            .unwrap_or(self.body.len());
        &self.body[..end]
    }
}

pub trait Transport {
    /// Authenticated GET of an endpoint path relative to the base URL.
    fn get(&self, stage: Stage, path: &str) -> Result<HttpResponse>;

    /// Authenticated multipart POST carrying `contents` in a field named `file`.
    fn post_file(&self, path: &str, file_name: &str, contents: Vec<u8>) -> Result<HttpResponse>;
}

#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ScanError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn api_key(&self) -> &ApiKey {
        &self.config.api_key
    }

    fn finish(stage: Stage, resp: reqwest::blocking::Response) -> Result<HttpResponse> {
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .map_err(|e| ScanError::transport(stage, format!("cannot read response body: {e}")))?;
        debug!(%stage, status, bytes = body.len(), "response received");
        Ok(HttpResponse { status, body })
    }
}

impl Transport for HttpTransport {
    fn get(&self, stage: Stage, path: &str) -> Result<HttpResponse> {
        let url = self.config.endpoint(path);
        debug!(%stage, %url, "GET");
        let resp = self
            .client
            .get(&url)
            .header("apikey", self.api_key().expose())
            .send()
            .map_err(|e| ScanError::transport(stage, format!("request to {url} failed: {e}")))?;
        Self::finish(stage, resp)
    }

    fn post_file(&self, path: &str, file_name: &str, contents: Vec<u8>) -> Result<HttpResponse> {
        let url = self.config.endpoint(path);
        debug!(%url, file_name, bytes = contents.len(), "POST multipart");
        let part = Part::bytes(contents).file_name(file_name.to_string());
        let form = Form::new().part("file", part);
        let resp = self
            .client
            .post(&url)
            .header("apikey", self.api_key().expose())
            .multipart(form)
            .send()
            .map_err(|e| {
                ScanError::transport(Stage::Upload, format!("request to {url} failed: {e}"))
            })?;
        Self::finish(Stage::Upload, resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(404, "").is_success());
        assert!(!HttpResponse::new(500, "").is_success());
    }

    #[test]
    fn excerpt_truncates_on_char_boundary() {
        let body = "é".repeat(300);
        let resp = HttpResponse::new(500, body);
        assert_eq!(resp.excerpt().chars().count(), 200);
    }

    #[test]
    fn builds_with_and_without_timeout() {
        let config = ClientConfig::new("k").unwrap();
        assert!(HttpTransport::new(&config).is_ok());
        assert!(HttpTransport::new(&config.with_request_timeout(None)).is_ok());
    }
}
