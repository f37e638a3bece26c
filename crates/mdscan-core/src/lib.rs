//! mdscan-core — client library for the MetaDefender Cloud scanning API.
//!
//! Hashes a file, looks the digest up for a cached verdict, and on a miss
//! uploads the file and polls until the analysis completes. Rendering of
//! the resulting per-engine verdict lives in [`report`].

pub mod api;
pub mod client;
pub mod config;
pub mod digest;
pub mod error;
pub mod poll;
pub mod report;
pub mod scan;
pub mod transport;
pub mod verdict;

pub use client::{LookupOutcome, MetaDefenderClient, RemoteJob};
pub use config::ClientConfig;
pub use error::{Result, ScanError, Stage};
pub use scan::{run_scan, ScanReport, ScanRequest};
