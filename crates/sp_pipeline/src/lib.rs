//! sp_pipeline: deterministic merge surface (validate → filter → escalate → build outputs → summary).
//!
//! This crate stays I/O-free: collections come in built, collections and a
//! summary go out. Persistence and hashing live in `sp_io`.

#![forbid(unsafe_code)]

pub mod build_outputs;
pub mod escalate;
pub mod summary;
pub mod validate;

use thiserror::Error;
use tracing::{info, warn};

use sp_algo::DonorPool;
use sp_core::{CollectionError, ColumnRole, CoreError, MergeConfig, RecordCollection, RecordKey};

pub use escalate::{MatchState, StepTrace};
pub use summary::{Digests, EngineMeta, MergeSummary, RunRecord};
pub use validate::{validate, EntityRef, Severity, Side, ValidationIssue, ValidationReport};

/// Single error surface of a merge. Every variant is raised before the
/// first donor is consumed.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("{side}: missing {role} column `{column}`")]
    Schema { side: Side, column: String, role: ColumnRole },
    #[error("{side}: duplicate key `{key}`")]
    DuplicateKey { side: Side, key: String },
    #[error("{side}: row {row}: key missing or invalid")]
    NullKey { side: Side, row: usize },
    #[error("{side}: geography: {source}")]
    Geography { side: Side, source: CoreError },
    #[error("validation failed: {0}")]
    Validation(ValidationReport),
    #[error("{side}: {source}")]
    Core { side: Side, source: CoreError },
}

impl MergeError {
    /// Attach the side to a collection-level error.
    pub fn collection(side: Side, e: CollectionError) -> Self {
        match e {
            CollectionError::Schema { column, role } => MergeError::Schema { side, column, role },
            CollectionError::DuplicateKey { key } => MergeError::DuplicateKey { side, key },
            CollectionError::NullKey { row } => MergeError::NullKey { side, row },
            CollectionError::Geography(source) => MergeError::Geography { side, source },
            CollectionError::Core(source) => MergeError::Core { side, source },
        }
    }
}

/// Final per-record outcome, in primary row order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub key: RecordKey,
    pub state: MatchState,
    pub donor: Option<RecordKey>,
}

#[derive(Clone, Debug)]
pub struct MergeOutputs {
    /// Input primary plus graft and provenance columns.
    pub primary: RecordCollection,
    /// Input secondary plus consumption columns.
    pub secondary: RecordCollection,
    pub summary: MergeSummary,
    pub outcomes: Vec<Outcome>,
}

/// Graft `cfg.grafts` from `secondary` onto `primary`.
///
/// Neither input is modified; the outputs share unchanged columns with them.
pub fn merge(
    primary: &RecordCollection,
    secondary: &RecordCollection,
    cfg: &MergeConfig,
) -> Result<MergeOutputs, MergeError> {
    let report = validate(primary, secondary, cfg);
    if !report.pass {
        return Err(MergeError::Validation(report));
    }
    for w in report.warnings() {
        warn!(code = w.code, "{}", w.message);
    }

    let participants = primary
        .filter(&cfg.primary_filter)
        .map_err(|e| MergeError::collection(Side::Primary, e))?
        .into_rows();
    let eligible = secondary
        .filter(&cfg.donor_filter)
        .map_err(|e| MergeError::collection(Side::Secondary, e))?
        .into_rows();

    let mut pool = DonorPool::new(secondary, &eligible);
    let esc = escalate::escalate(primary, &participants, &mut pool, cfg)?;

    let primary_out = build_outputs::build_primary(primary, secondary, &esc, cfg)?;
    let secondary_out = build_outputs::build_secondary(secondary, &pool, cfg)?;
    let summary = MergeSummary::build(&esc, &pool, cfg, report.warnings().cloned().collect());

    info!(
        primary_notes = primary.notes(),
        secondary_notes = secondary.notes(),
        records = summary.primary_records,
        matched = summary.matched,
        unmatched = summary.unmatched,
        excluded = summary.excluded,
        donors_consumed = summary.donors_consumed,
        "merge complete"
    );

    let outcomes = esc
        .states
        .into_iter()
        .zip(esc.donor_of)
        .enumerate()
        .map(|(row, (state, donor))| Outcome {
            key: primary.key(row).clone(),
            state,
            donor: donor.map(|d| secondary.key(d).clone()),
        })
        .collect();

    Ok(MergeOutputs { primary: primary_out, secondary: secondary_out, summary, outcomes })
}
