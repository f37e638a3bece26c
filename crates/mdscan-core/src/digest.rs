//! File digest used as the cache key for prior verdicts.

use std::fs::File;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{Result, ScanError};

/// Compute the SHA-256 of a file as lowercase hex, streaming its contents.
pub fn sha256_file(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(ScanError::FileNotFound(path.to_path_buf()));
    }

    let read_err = |source| ScanError::FileRead {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(read_err)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(read_err)?;

    Ok(format!("{:x}", hasher.finalize()))
}
