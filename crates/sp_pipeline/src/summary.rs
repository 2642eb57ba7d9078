//! Merge summary and run record.
//!
//! `MergeSummary` is computed by the pipeline from the escalation alone.
//! `RunRecord` wraps it with input/output digests supplied by the caller
//! (the pipeline does no hashing or I/O).

use std::collections::BTreeMap;

use serde::Serialize;

use sp_algo::{DonorPool, DonorState};
use sp_core::MergeConfig;

use crate::escalate::{Escalation, MatchState, StepTrace};
use crate::validate::ValidationIssue;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub seed: u64,
    pub primary_records: usize,
    pub participants: usize,
    pub excluded: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub donors: usize,
    pub donors_eligible: usize,
    pub donors_consumed: usize,
    /// Matched count per round name, zero for rounds that matched nothing.
    pub matched_by_round: BTreeMap<String, usize>,
    pub steps: Vec<StepTrace>,
    pub warnings: Vec<ValidationIssue>,
}

impl MergeSummary {
    pub fn build(esc: &Escalation, pool: &DonorPool<'_>, cfg: &MergeConfig, warnings: Vec<ValidationIssue>) -> Self {
        let mut matched_by_round: BTreeMap<String, usize> =
            cfg.rounds.iter().map(|r| (r.name.to_string(), 0)).collect();
        let (mut matched, mut unmatched, mut excluded) = (0, 0, 0);
        for st in &esc.states {
            match st {
                MatchState::MatchedInRound { round, .. } => {
                    matched += 1;
                    *matched_by_round.entry(cfg.rounds[*round].name.to_string()).or_default() += 1;
                }
                MatchState::Excluded => excluded += 1,
                _ => unmatched += 1,
            }
        }
        let states = pool.states();
        Self {
            seed: cfg.seed,
            primary_records: esc.states.len(),
            participants: esc.states.len() - excluded,
            excluded,
            matched,
            unmatched,
            donors: states.len(),
            donors_eligible: states.iter().filter(|s| **s != DonorState::Ineligible).count(),
            donors_consumed: states.iter().filter(|s| matches!(s, DonorState::Consumed { .. })).count(),
            matched_by_round,
            steps: esc.steps.clone(),
            warnings,
        }
    }
}

/// Identity of the engine build that produced a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EngineMeta {
    pub name: String,
    pub version: String,
}

impl Default for EngineMeta {
    fn default() -> Self {
        Self { name: "sp".into(), version: env!("CARGO_PKG_VERSION").into() }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Digests {
    pub primary_sha256: String,
    pub secondary_sha256: String,
    pub config_sha256: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunRecord {
    pub engine: EngineMeta,
    pub inputs: Digests,
    /// Output file name → SHA-256 hex.
    pub outputs: BTreeMap<String, String>,
    pub summary: MergeSummary,
}
