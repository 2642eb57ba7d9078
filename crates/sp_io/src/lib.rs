//! crates/sp_io/src/lib.rs
//! File-facing half of the engine.
//!
//! - `csv_table`: CSV ⇄ `Table` (text cells unless a column is declared numeric)
//! - `manifest`: JSON merge manifest, offline path policy, digest checks
//! - `canonical_json`: sorted-key compact JSON and atomic writes
//! - `hasher`: lowercase SHA-256 hex over bytes, files and canonical JSON

#![forbid(unsafe_code)]

use thiserror::Error;

pub mod canonical_json;
pub mod csv_table;
pub mod hasher;
pub mod manifest;

pub use manifest::ManifestError;

/// Unified error for sp_io.
#[derive(Debug, Error)]
pub enum IoError {
    /// Filesystem / path errors (open, create_dir_all, rename, fsync).
    #[error("io/path error: {0}")]
    Path(String),

    /// CSV read/write failure, with the file it came from.
    #[error("csv error in {path}: {msg}")]
    Csv { path: String, msg: String },

    /// JSON serialization/deserialization errors.
    #[error("json error at {pointer}: {msg}")]
    Json { pointer: String, msg: String },

    #[error("manifest: {0}")]
    Manifest(#[from] ManifestError),

    #[error("hash error: {0}")]
    Hash(String),
}

pub type IoResult<T> = Result<T, IoError>;

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError::Path(e.to_string())
    }
}

impl From<serde_json::Error> for IoError {
    fn from(e: serde_json::Error) -> Self {
        // serde_json keeps a line/column, not a pointer; report at root.
        IoError::Json { pointer: "/".to_string(), msg: e.to_string() }
    }
}

/// Returns true if `s` looks like a URL (any `<scheme>://`, including `file://`).
#[inline]
pub fn looks_like_url_strict(s: &str) -> bool {
    let t = s.trim();
    t.contains("://") || t.starts_with("http:") || t.starts_with("https:")
}
