//! Materialize the two output collections from an escalation.
//!
//! Primary: one new column per graft (donor value, or the sentinel when the
//! record never matched or was excluded) plus round / level / donor-key
//! provenance. Secondary: consumed flag and the consuming primary key.
//! Row order and row count of both inputs are preserved.

use sp_core::{
    params::{EXCLUDED, UNCONSUMED, UNMATCHED},
    MergeConfig, RecordCollection, Value,
};
use sp_algo::{DonorPool, DonorState};

use crate::escalate::{Escalation, MatchState};
use crate::validate::Side;
use crate::MergeError;

pub fn build_primary(
    primary: &RecordCollection,
    secondary: &RecordCollection,
    esc: &Escalation,
    cfg: &MergeConfig,
) -> Result<RecordCollection, MergeError> {
    let mut out = primary.clone();

    for g in &cfg.grafts {
        let source = secondary.column(&g.source).map_err(|e| MergeError::collection(Side::Secondary, e))?;
        let values: Vec<Value> = esc
            .donor_of
            .iter()
            .map(|d| match d {
                Some(d) => source[*d].clone(),
                None => cfg.sentinel.clone(),
            })
            .collect();
        out = out.with_column(g.target_name(), values).map_err(|e| MergeError::collection(Side::Primary, e))?;
    }

    let rounds: Vec<Value> = esc
        .states
        .iter()
        .map(|st| match st {
            MatchState::MatchedInRound { round, .. } => Value::text(cfg.rounds[*round].name.as_str()),
            other => unresolved(other),
        })
        .collect();
    let levels: Vec<Value> = esc
        .states
        .iter()
        .map(|st| match st {
            MatchState::MatchedInRound { level, .. } => Value::text(level.as_str()),
            other => unresolved(other),
        })
        .collect();
    let donor_keys: Vec<Value> = esc
        .states
        .iter()
        .zip(&esc.donor_of)
        .map(|(st, d)| match d {
            Some(d) => Value::text(secondary.key(*d).as_str()),
            None => unresolved(st),
        })
        .collect();

    let p = &cfg.provenance;
    [(&p.round, rounds), (&p.geo_level, levels), (&p.donor_key, donor_keys)]
        .into_iter()
        .try_fold(out, |acc, (name, values)| acc.with_column(name, values))
        .map_err(|e| MergeError::collection(Side::Primary, e))
}

/// Provenance text for a record that has no donor.
fn unresolved(st: &MatchState) -> Value {
    Value::text(if *st == MatchState::Excluded { EXCLUDED } else { UNMATCHED })
}

pub fn build_secondary(secondary: &RecordCollection, pool: &DonorPool<'_>, cfg: &MergeConfig) -> Result<RecordCollection, MergeError> {
    let (consumed, consumed_by): (Vec<Value>, Vec<Value>) = pool
        .states()
        .iter()
        .map(|st| match st {
            DonorState::Consumed { by: Some(k) } => (Value::Bool(true), Value::text(k.as_str())),
            DonorState::Consumed { by: None } => (Value::Bool(true), Value::text(UNCONSUMED)),
            DonorState::Available | DonorState::Ineligible => (Value::Bool(false), Value::text(UNCONSUMED)),
        })
        .unzip();
    secondary
        .with_column(&cfg.provenance.consumed, consumed)
        .and_then(|s| s.with_column(&cfg.provenance.consumed_by, consumed_by))
        .map_err(|e| MergeError::collection(Side::Secondary, e))
}
