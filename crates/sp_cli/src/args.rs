// crates/sp_cli/src/args.rs
//
// Deterministic, offline CLI argument surface.
//
// - The manifest is the single source of inputs; it must be a local file.
// - No networked paths (reject any scheme:// like http/https/file).
// - Seed override accepts u64 decimal or 0x-hex up to 16 nybbles.
// - --validate-only runs the schema/config checks and stops before matching.

use clap::{ArgAction, Parser};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Parsed CLI arguments.
#[derive(Debug, Parser, Clone)]
#[command(
    name = "sp",
    version,
    disable_help_subcommand = true,
    about = "Graft donor attributes onto a primary record collection (offline, deterministic)"
)]
pub struct Args {
    /// Merge manifest JSON (tables, collection specs, merge config, output names).
    #[arg(long)]
    pub manifest: PathBuf,

    /// Output directory (default: the manifest's directory).
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Merge seed override. Accepts decimal u64 or 0x-hex (≤16 hex digits).
    #[arg(long, value_parser = parse_seed)]
    pub seed: Option<u64>,

    /// Load and validate only; do not match or write outputs.
    #[arg(long)]
    pub validate_only: bool,

    /// Only warnings and errors on stderr.
    #[arg(long, short = 'q', conflicts_with = "verbose")]
    pub quiet: bool,

    /// More log detail (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

/// Errors surfaced by argument validation. Messages are short and stable.
#[derive(Debug)]
pub enum CliError {
    NonLocalPath(String),
    NotFound(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::NonLocalPath(p) => write!(f, "path must be local file (no scheme): {p}"),
            CliError::NotFound(p) => write!(f, "file not found: {p}"),
        }
    }
}
impl std::error::Error for CliError {}

/// Seed parser: decimal u64 or 0x-hex (1..=16 nybbles).
pub fn parse_seed(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty seed".into());
    }
    if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if rest.is_empty() || rest.len() > 16 || !rest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err("hex seed must be 1..16 hex digits".into());
        }
        u64::from_str_radix(rest, 16).map_err(|_| "hex seed out of range".into())
    } else {
        s.parse::<u64>().map_err(|_| "decimal seed must be a valid u64".into())
    }
}

/// Parse argv and check the paths before anything is read.
pub fn parse_and_validate() -> Result<Args, CliError> {
    let args = Args::parse();
    ensure_local_path(&args.manifest)?;
    if let Some(out) = &args.out {
        ensure_local_path(out)?;
    }
    if !args.manifest.is_file() {
        return Err(CliError::NotFound(format!("--manifest {}", args.manifest.display())));
    }
    Ok(Args {
        manifest: absolute(&args.manifest),
        out: args.out.as_deref().map(absolute),
        ..args
    })
}

/// Offline posture: anything that looks like a URL is refused.
fn ensure_local_path(p: &Path) -> Result<(), CliError> {
    let shown = p.to_string_lossy();
    if sp_io::looks_like_url_strict(&shown) || shown.to_ascii_lowercase().starts_with("file:") {
        return Err(CliError::NonLocalPath(shown.into_owned()));
    }
    Ok(())
}

/// Canonical path when it exists, otherwise `p` anchored at the working directory.
fn absolute(p: &Path) -> PathBuf {
    if let Ok(c) = fs::canonicalize(p) {
        return c;
    }
    if p.is_absolute() {
        return p.to_path_buf();
    }
    env::current_dir().map(|d| d.join(p)).unwrap_or_else(|_| p.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn seed_parser_decimal_and_hex() {
        assert_eq!(parse_seed("42").unwrap(), 42u64);
        assert_eq!(parse_seed("0x2A").unwrap(), 42u64);
        assert!(parse_seed("0x").is_err());
        assert!(parse_seed("0xFFFFFFFFFFFFFFFFF").is_err()); // 17 nybbles
        assert!(parse_seed("-1").is_err());
    }

    #[test]
    fn ensure_local_path_rejects_schemes() {
        assert!(ensure_local_path(Path::new("http://x")).is_err());
        assert!(ensure_local_path(Path::new("file://C:/x.json")).is_err());
        assert!(ensure_local_path(Path::new("FILE:relative.json")).is_err());
        assert!(ensure_local_path(Path::new("/tmp/merge.json")).is_ok());
    }

    #[test]
    fn flags_parse() {
        Args::command().debug_assert();
        let a = Args::try_parse_from(["sp", "--manifest", "m.json", "--seed", "0x10", "-vv"]).unwrap();
        assert_eq!(a.seed, Some(16));
        assert_eq!(a.verbose, 2);
        assert!(Args::try_parse_from(["sp", "--manifest", "m.json", "-q", "-v"]).is_err());
        assert!(Args::try_parse_from(["sp"]).is_err());
    }

    #[test]
    fn missing_paths_are_anchored_at_cwd() {
        assert!(absolute(Path::new("does/not/exist.json")).is_absolute());
    }
}
