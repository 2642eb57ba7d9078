//! sp_core: Core types, geography ladder, record collections, and deterministic RNG.
//!
//! This crate is **I/O-free**. It defines stable types/APIs used across the
//! engine (`sp_algo`, `sp_pipeline`, `sp_io`, `sp_cli`).
//!
//! - Record keys and round names (`RecordKey`, `RoundName`)
//! - Typed cells (`Value`) and a column-major, copy-on-write `Table`
//! - Composable row predicates (column / operator / value, ANDed)
//! - Geography levels, truncation rules and the escalation ladder
//! - `RecordCollection`: table + unique key + geography + notes
//! - Merge parameters (`MergeConfig`, rounds, grafts, selection order)
//! - Seedable RNG (ChaCha20) with per-bucket seed derivation
//!
//! Serialization derives are gated behind the `serde` feature.

#![forbid(unsafe_code)]

pub mod collection;
pub mod determinism;
pub mod geography;
pub mod ids;
pub mod params;
pub mod predicate;
pub mod rng;
pub mod table;
pub mod value;

pub mod errors {
    use core::fmt;

    /// Error set for core-domain validation & parsing.
    #[derive(Clone, Debug, Eq, PartialEq)]
    pub enum CoreError {
        InvalidKey,
        InvalidToken,
        UnknownColumn(String),
        DuplicateColumn(String),
        LengthMismatch { column: String, expected: usize, got: usize },
        InvalidNumber { column: String, raw: String },
        UnknownGeoLevel(String),
        GeoTooShort { code: String, level: &'static str },
        GeoMissing { row: usize },
        EmptyLadder,
        LadderNotCoarsening,
        LevelNotOnLadder(&'static str),
    }

    impl fmt::Display for CoreError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                CoreError::InvalidKey => write!(f, "invalid record key"),
                CoreError::InvalidToken => write!(f, "invalid token"),
                CoreError::UnknownColumn(c) => write!(f, "unknown column: {c}"),
                CoreError::DuplicateColumn(c) => write!(f, "duplicate column: {c}"),
                CoreError::LengthMismatch { column, expected, got } => {
                    write!(f, "column {column}: expected {expected} values, got {got}")
                }
                CoreError::InvalidNumber { column, raw } => {
                    write!(f, "column {column}: not a number: {raw:?}")
                }
                CoreError::UnknownGeoLevel(s) => write!(f, "unknown geography level: {s}"),
                CoreError::GeoTooShort { code, level } => {
                    write!(f, "geography code {code:?} too short for level {level}")
                }
                CoreError::GeoMissing { row } => write!(f, "row {row}: geography code missing"),
                CoreError::EmptyLadder => write!(f, "geography ladder is empty"),
                CoreError::LadderNotCoarsening => {
                    write!(f, "geography ladder must run strictly finest to coarsest")
                }
                CoreError::LevelNotOnLadder(l) => write!(f, "level {l} is not on the ladder"),
            }
        }
    }

    impl std::error::Error for CoreError {}
}

pub use collection::{CollectionError, CollectionSpec, CollectionView, ColumnRole, GroupKey, RecordCollection};
pub use errors::CoreError;
pub use geography::{GeoLadder, GeoLevel, GeoRule};
pub use ids::{RecordKey, RoundName};
pub use params::{GraftField, MergeConfig, ProvenanceColumns, RoundSpec, SelectionOrder};
pub use predicate::{CmpOp, Condition, Operand, Predicate};
pub use table::Table;
pub use value::Value;
