// crates/sp_io/src/manifest.rs
//
// Merge manifest: where the two tables live, how to read them, the merge
// configuration, and where outputs go.
//
// • Paths are relative to the manifest's directory unless absolute.
// • Offline-only: any path with a scheme ("://", "http:", "https:") is rejected.
// • Digests (if provided) must be 64-lower-hex and are checked against the raw
//   file bytes before anything is parsed.
// • Unknown fields are rejected at every level.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sp_core::{CollectionSpec, MergeConfig};

use crate::hasher::{is_lower_hex_64, sha256_file};
use crate::{looks_like_url_strict, IoError};

/// External manifest accepted by the loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeManifest {
    /// Optional, non-normative identifier echoed in logs.
    #[serde(default)]
    pub id: Option<String>,
    pub primary: TableSource,
    pub secondary: TableSource,
    pub config: MergeConfig,
    #[serde(default)]
    pub outputs: OutputNames,
}

/// One input table and how to turn it into a record collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableSource {
    pub path: String,
    pub collection: CollectionSpec,
    /// Columns parsed as numbers; everything else stays text.
    #[serde(default)]
    pub numeric_columns: Vec<String>,
    /// Replicate each record N times (N from this integer column) before matching.
    #[serde(default)]
    pub expand_by: Option<String>,
    /// Expected SHA-256 of the file bytes (lowercase hex).
    #[serde(default)]
    pub sha256: Option<String>,
}

/// Output file names, joined under the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputNames {
    pub primary: String,
    pub secondary: String,
    pub summary: String,
}

impl Default for OutputNames {
    fn default() -> Self {
        Self {
            primary: "primary.csv".into(),
            secondary: "secondary.csv".into(),
            summary: "summary.json".into(),
        }
    }
}

/// A manifest with its input paths resolved and checked.
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub manifest: MergeManifest,
    pub base_dir: PathBuf,
    pub primary_path: PathBuf,
    pub secondary_path: PathBuf,
    pub primary_sha256: String,
    pub secondary_sha256: String,
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("field must not be empty: {0}")]
    Empty(&'static str),
    #[error("path must be offline (no scheme) for {0}: {1}")]
    UrlPath(&'static str, String),
    #[error("cannot access {0}: {1}")]
    Io(&'static str, String),
    #[error("path is not a file for {0}: {1}")]
    NotAFile(&'static str, String),
    #[error("invalid sha256 format for {0}: {1}")]
    DigestShape(&'static str, String),
    #[error("sha256 mismatch for {0}: {1}")]
    DigestMismatch(&'static str, String),
    #[error("output names must be plain, distinct file names: {0}")]
    BadOutput(String),
}

// ---------- helpers (pure) ----------

#[inline]
fn join_under(base: &Path, rel: &str) -> PathBuf {
    let p = Path::new(rel);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

fn offline_check(label: &'static str, path: &str) -> Result<(), ManifestError> {
    if looks_like_url_strict(path) {
        return Err(ManifestError::UrlPath(label, path.to_string()));
    }
    Ok(())
}

fn is_plain_file_name(s: &str) -> bool {
    !s.is_empty() && !s.contains(['/', '\\']) && s != "." && s != ".."
}

// ---------- validation (shape & offline policy, no I/O) ----------

pub fn validate_manifest(man: &MergeManifest) -> Result<(), ManifestError> {
    for (label, src) in [("primary.path", &man.primary), ("secondary.path", &man.secondary)] {
        if src.path.trim().is_empty() {
            return Err(ManifestError::Empty(label));
        }
        offline_check(label, &src.path)?;
        if let Some(h) = &src.sha256 {
            if !is_lower_hex_64(h) {
                return Err(ManifestError::DigestShape(label, h.clone()));
            }
        }
    }
    let o = &man.outputs;
    let names = [&o.primary, &o.secondary, &o.summary];
    if let Some(bad) = names.iter().find(|n| !is_plain_file_name(n)) {
        return Err(ManifestError::BadOutput((*bad).clone()));
    }
    if o.primary == o.secondary || o.primary == o.summary || o.secondary == o.summary {
        return Err(ManifestError::BadOutput(format!("{} / {} / {}", o.primary, o.secondary, o.summary)));
    }
    Ok(())
}

// ---------- resolution (join base + existence/type checks + digests) ----------

fn must_exist_file(label: &'static str, p: &Path) -> Result<(), ManifestError> {
    let md = fs::metadata(p).map_err(|e| ManifestError::Io(label, format!("{} ({e})", p.display())))?;
    if !md.is_file() {
        return Err(ManifestError::NotAFile(label, p.display().to_string()));
    }
    Ok(())
}

fn checked_digest(label: &'static str, path: &Path, expect: Option<&str>) -> Result<String, IoError> {
    let got = sha256_file(path)?;
    if let Some(want) = expect {
        if want != got {
            return Err(ManifestError::DigestMismatch(label, format!("expected={want} got={got}")).into());
        }
    }
    Ok(got)
}

/// Parse a manifest from JSON text; `base_dir` anchors relative paths.
pub fn parse_manifest(text: &str, base_dir: &Path) -> Result<LoadedManifest, IoError> {
    let manifest: MergeManifest = serde_json::from_str(text)?;
    validate_manifest(&manifest)?;

    let primary_path = join_under(base_dir, &manifest.primary.path);
    let secondary_path = join_under(base_dir, &manifest.secondary.path);
    must_exist_file("primary.path", &primary_path)?;
    must_exist_file("secondary.path", &secondary_path)?;

    let primary_sha256 = checked_digest("primary.path", &primary_path, manifest.primary.sha256.as_deref())?;
    let secondary_sha256 = checked_digest("secondary.path", &secondary_path, manifest.secondary.sha256.as_deref())?;

    Ok(LoadedManifest {
        manifest,
        base_dir: base_dir.to_path_buf(),
        primary_path,
        secondary_path,
        primary_sha256,
        secondary_sha256,
    })
}

/// Read, validate and resolve the manifest at `path`.
pub fn load_manifest(path: &Path) -> Result<LoadedManifest, IoError> {
    let label = path.display().to_string();
    if looks_like_url_strict(&label) {
        return Err(ManifestError::UrlPath("manifest", label).into());
    }
    let text = fs::read_to_string(path).map_err(|e| ManifestError::Io("manifest", format!("{label} ({e})")))?;
    let base = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    parse_manifest(&text, &base)
}
