// crates/sp_cli/src/main.rs
//
// Wires up exit codes, typed error mapping, CLI parsing, logging, the
// validate-only short-circuit and the full run path
// (load → seed override → collections → merge → outputs → run record).

mod args;

mod exitcodes {
    pub const OK: i32 = 0;
    /// Manifest shape, schema and config validation failures.
    pub const VALIDATION: i32 = 2;
    /// Read/write/path failures.
    pub const IO: i32 = 4;
    /// Merge failed after validation passed.
    pub const MERGE: i32 = 5;
}

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use args::{parse_and_validate as parse_cli, Args};

use sp_core::{MergeConfig, RecordCollection};
use sp_io::canonical_json::write_canonical_file;
use sp_io::csv_table::{read_table, write_table};
use sp_io::hasher::{sha256_canonical, sha256_hex};
use sp_io::manifest::{load_manifest, LoadedManifest, TableSource};
use sp_io::{IoError, ManifestError};
use sp_pipeline::{merge, validate, Digests, EngineMeta, MergeError, RunRecord, Side};

/// Central error type for CLI → exit-code mapping.
#[derive(Debug)]
enum MainError {
    Validation(String),
    Io(String),
    Merge(String),
}

impl std::fmt::Display for MainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MainError::Validation(m) => write!(f, "validation: {m}"),
            MainError::Io(m) => write!(f, "io: {m}"),
            MainError::Merge(m) => write!(f, "merge: {m}"),
        }
    }
}

fn main() -> ExitCode {
    let args = match parse_cli() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("sp: error: {e}");
            return ExitCode::from(exitcodes::VALIDATION as u8);
        }
    };
    init_tracing(&args);

    let res = if args.validate_only { validate_only(&args) } else { run_once(&args) };
    let rc = match res {
        Ok(()) => exitcodes::OK,
        Err(e) => {
            eprintln!("sp: error: {e}");
            map_error(&e)
        }
    };
    ExitCode::from(rc as u8)
}

/// `RUST_LOG` wins; otherwise -q/-v pick the level. Logs go to stderr.
fn init_tracing(args: &Args) {
    let default = match (args.quiet, args.verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn map_error(e: &MainError) -> i32 {
    match e {
        MainError::Validation(_) => exitcodes::VALIDATION,
        MainError::Io(_) => exitcodes::IO,
        MainError::Merge(_) => exitcodes::MERGE,
    }
}

fn map_io_err(e: IoError) -> MainError {
    match e {
        IoError::Manifest(ManifestError::Io(..)) => MainError::Io(e.to_string()),
        IoError::Json { .. } | IoError::Manifest(_) => MainError::Validation(e.to_string()),
        IoError::Path(_) | IoError::Csv { .. } | IoError::Hash(_) => MainError::Io(e.to_string()),
    }
}

fn map_merge_err(e: MergeError) -> MainError {
    match e {
        MergeError::Core { .. } => MainError::Merge(e.to_string()),
        _ => MainError::Validation(e.to_string()),
    }
}

/// Load the manifest and apply the seed override.
fn load(args: &Args) -> Result<(LoadedManifest, MergeConfig), MainError> {
    let loaded = load_manifest(&args.manifest).map_err(map_io_err)?;
    let mut cfg = loaded.manifest.config.clone();
    if let Some(seed) = args.seed {
        debug!(manifest_seed = cfg.seed, seed, "seed override");
        cfg.seed = seed;
    }
    Ok((loaded, cfg))
}

/// Read one side's CSV and build its record collection (expanded if asked).
fn collection(side: Side, path: &Path, src: &TableSource) -> Result<RecordCollection, MainError> {
    let table = read_table(path, &src.numeric_columns).map_err(map_io_err)?;
    let coll = RecordCollection::new(table, src.collection.clone())
        .map_err(|e| map_merge_err(MergeError::collection(side, e)))?;
    match &src.expand_by {
        Some(col) => {
            let expanded =
                coll.expand_by_count(col).map_err(|e| map_merge_err(MergeError::collection(side, e)))?;
            debug!(%side, records = coll.len(), slots = expanded.len(), "expanded by count");
            Ok(expanded)
        }
        None => Ok(coll),
    }
}

fn collections(loaded: &LoadedManifest) -> Result<(RecordCollection, RecordCollection), MainError> {
    let m = &loaded.manifest;
    let primary = collection(Side::Primary, &loaded.primary_path, &m.primary)?;
    let secondary = collection(Side::Secondary, &loaded.secondary_path, &m.secondary)?;
    info!(
        id = m.id.as_deref().unwrap_or("-"),
        primary = primary.len(),
        secondary = secondary.len(),
        "inputs loaded"
    );
    Ok((primary, secondary))
}

/// Validate-only path: no matching, no outputs. The report goes to stdout.
fn validate_only(args: &Args) -> Result<(), MainError> {
    let (loaded, cfg) = load(args)?;
    let (primary, secondary) = collections(&loaded)?;
    let report = validate(&primary, &secondary, &cfg);

    let json = serde_json::to_string_pretty(&report).map_err(|e| MainError::Io(e.to_string()))?;
    println!("{json}");

    if report.pass {
        for w in report.warnings() {
            warn!(code = w.code, "{}", w.message);
        }
        Ok(())
    } else {
        Err(MainError::Validation(report.to_string()))
    }
}

/// Full run: merge, write both tables, then the run record last.
fn run_once(args: &Args) -> Result<(), MainError> {
    let (loaded, cfg) = load(args)?;
    let (primary, secondary) = collections(&loaded)?;

    let out = merge(&primary, &secondary, &cfg).map_err(map_merge_err)?;

    let out_dir: PathBuf = args.out.clone().unwrap_or_else(|| loaded.base_dir.clone());
    let names = &loaded.manifest.outputs;

    let mut outputs = BTreeMap::new();
    for (name, coll) in [(&names.primary, &out.primary), (&names.secondary, &out.secondary)] {
        let bytes = write_table(&out_dir.join(name), coll.table()).map_err(map_io_err)?;
        outputs.insert(name.clone(), sha256_hex(&bytes));
    }

    let record = RunRecord {
        engine: EngineMeta::default(),
        inputs: Digests {
            primary_sha256: loaded.primary_sha256.clone(),
            secondary_sha256: loaded.secondary_sha256.clone(),
            config_sha256: sha256_canonical(&cfg).map_err(map_io_err)?,
        },
        outputs,
        summary: out.summary,
    };
    let summary_path = out_dir.join(&names.summary);
    write_canonical_file(&summary_path, &record).map_err(map_io_err)?;

    info!(out = %out_dir.display(), "outputs written");
    Ok(())
}
