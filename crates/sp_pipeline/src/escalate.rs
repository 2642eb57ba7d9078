//! Escalation Controller: drives passes across rounds × geography levels.
//!
//! State per participating primary record:
//!
//! ```text
//!   Pending ──match──▶ MatchedInRound(r, g)                       (terminal)
//!      │
//!      └─ coarsest level of round r tried ─▶ ExhaustedGeography(r) ─▶ Pending (round r+1)
//!                                                   │
//!                                     last round ───┴──▶ ExhaustedAllRounds (terminal, sentinel)
//! ```
//!
//! Records outside the primary filter are `Excluded` from the start and never
//! enter a bucket. The pending set only shrinks from step to step.

use serde::Serialize;
use tracing::{debug, warn};

use sp_algo::{run_pass, DonorPool, PassSpec};
use sp_core::{GeoLevel, MergeConfig, RecordCollection, RoundName};

use crate::validate::{round_levels, Side};
use crate::MergeError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MatchState {
    Pending,
    MatchedInRound { round: usize, level: GeoLevel },
    ExhaustedGeography { round: usize },
    ExhaustedAllRounds,
    Excluded,
}

impl MatchState {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchState::MatchedInRound { .. })
    }
}

/// Counts for one (round, level) pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StepTrace {
    pub round: RoundName,
    pub level: GeoLevel,
    pub pending_before: usize,
    pub matched: usize,
    pub pending_after: usize,
    pub buckets: usize,
    pub short_buckets: usize,
    pub skipped_null: usize,
}

/// Result of driving every round: final state and donor row per primary row.
#[derive(Clone, Debug)]
pub struct Escalation {
    pub states: Vec<MatchState>,
    pub donor_of: Vec<Option<usize>>,
    pub steps: Vec<StepTrace>,
}

/// Run every configured round over `participants` (primary rows).
pub fn escalate(
    primary: &RecordCollection,
    participants: &[usize],
    pool: &mut DonorPool<'_>,
    cfg: &MergeConfig,
) -> Result<Escalation, MergeError> {
    let mut states = vec![MatchState::Excluded; primary.len()];
    for &r in participants {
        states[r] = MatchState::Pending;
    }
    let mut donor_of = vec![None; primary.len()];
    let mut steps = Vec::new();
    let mut pending: Vec<usize> = participants.to_vec();

    'rounds: for (ri, round) in cfg.rounds.iter().enumerate() {
        for &r in &pending {
            states[r] = MatchState::Pending;
        }
        for &level in round_levels(cfg, round) {
            if pending.is_empty() || pool.is_exhausted() {
                debug!(round = round.name.as_str(), pending = pending.len(), "stopping early");
                break 'rounds;
            }
            let spec = PassSpec {
                round: &round.name,
                group_vars: &round.group_vars,
                level,
                seed: cfg.seed,
                order: &cfg.selection,
            };
            let outcome = run_pass(primary, &pending, pool, &spec).map_err(|e| MergeError::collection(Side::Primary, e))?;
            for &(p, d) in &outcome.matches {
                states[p] = MatchState::MatchedInRound { round: ri, level };
                donor_of[p] = Some(d);
            }
            let before = pending.len();
            pending.retain(|&r| !states[r].is_matched());
            steps.push(StepTrace {
                round: round.name.clone(),
                level,
                pending_before: before,
                matched: outcome.matches.len(),
                pending_after: pending.len(),
                buckets: outcome.buckets,
                short_buckets: outcome.short_buckets,
                skipped_null: outcome.skipped_null,
            });
        }
        for &r in &pending {
            states[r] = MatchState::ExhaustedGeography { round: ri };
        }
    }

    for &r in &pending {
        states[r] = MatchState::ExhaustedAllRounds;
    }
    if !pending.is_empty() {
        let mut keys: Vec<&str> = pending.iter().map(|&r| primary.key(r).as_str()).collect();
        keys.sort_unstable();
        keys.truncate(5);
        warn!(
            unmatched = pending.len(),
            first_keys = ?keys,
            "records unmatched after all rounds; filled with sentinel"
        );
    }

    Ok(Escalation { states, donor_of, steps })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sp_core::{CollectionSpec, GeoRule, GraftField, RoundSpec, Table, Value};

    fn coll(key: &str, rows: &[(&str, &str, &str)]) -> RecordCollection {
        let table = Table::from_columns([
            (key, rows.iter().map(|r| Value::text(r.0)).collect::<Vec<_>>()),
            ("block", rows.iter().map(|r| Value::text(r.1)).collect()),
            ("sex", rows.iter().map(|r| Value::text(r.2)).collect()),
        ])
        .unwrap();
        RecordCollection::new(table, CollectionSpec::new(key, GeoRule::block_column("block"))).unwrap()
    }

    #[test]
    fn escalates_to_block_group_when_block_is_empty() {
        // p1's block has no donor; the neighbouring block in the same block group does.
        let p = coll("pid", &[("p1", "060014001001000", "M")]);
        let h = coll("hid", &[("h1", "060014001001999", "M")]);
        let mut pool = DonorPool::new(&h, &[0]);
        let cfg = MergeConfig::new(
            42,
            vec![RoundSpec::new("exact", &["sex"], GeoLevel::Block).unwrap()],
            vec![GraftField::same("hid")],
            "-1",
        );
        let esc = escalate(&p, &[0], &mut pool, &cfg).unwrap();
        assert_eq!(esc.states[0], MatchState::MatchedInRound { round: 0, level: GeoLevel::BlockGroup });
        assert_eq!(esc.donor_of[0], Some(0));
        assert_eq!(esc.steps.len(), 2);
        assert_eq!(esc.steps[0].matched, 0);
    }

    #[test]
    fn stop_level_caps_escalation_and_later_round_picks_up() {
        let p = coll("pid", &[("p1", "060014001001000", "M")]);
        let h = coll("hid", &[("h1", "060014002001000", "F")]);
        let mut pool = DonorPool::new(&h, &[0]);
        let cfg = MergeConfig::new(
            1,
            vec![
                RoundSpec::new("exact", &["sex"], GeoLevel::Block).unwrap(),
                RoundSpec::new("area", &[], GeoLevel::Block).unwrap().stop_at(GeoLevel::BlockGroup),
                RoundSpec::new("county", &[], GeoLevel::County).unwrap(),
            ],
            vec![],
            "-1",
        );
        let esc = escalate(&p, &[0], &mut pool, &cfg).unwrap();
        assert_eq!(esc.states[0], MatchState::MatchedInRound { round: 2, level: GeoLevel::County });
        let per_round: Vec<&str> = esc.steps.iter().map(|s| s.round.as_str()).collect();
        assert_eq!(per_round, vec!["exact", "exact", "exact", "exact", "area", "area", "county"]);
    }

    #[test]
    fn unmatched_and_excluded_end_states() {
        let p = coll("pid", &[("p1", "060014001001000", "M"), ("p2", "060014001001000", "M")]);
        let h = coll("hid", &[("h1", "060014001001000", "F")]);
        let mut pool = DonorPool::new(&h, &[0]);
        let cfg = MergeConfig::new(
            1,
            vec![RoundSpec::new("exact", &["sex"], GeoLevel::Block).unwrap()],
            vec![],
            "-1",
        );
        let esc = escalate(&p, &[1], &mut pool, &cfg).unwrap();
        assert_eq!(esc.states[0], MatchState::Excluded);
        assert_eq!(esc.states[1], MatchState::ExhaustedAllRounds);
        assert!(esc.steps.windows(2).all(|w| w[1].pending_before <= w[0].pending_before));
    }
}
