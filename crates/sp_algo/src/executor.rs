//! Match Round Executor: one (round, geography level) pass.
//!
//! Pending primaries are bucketed by (group key, geography key) exactly like
//! the donors, then each bucket draws donors from the pool. Every bucket gets
//! its own RNG stream derived from (seed, round name, level, bucket key), so
//! visiting buckets in a different order never changes what a bucket draws.
//!
//! Pairing inside a bucket:
//! - `Random`: primaries (key order) are shuffled on the bucket stream, then
//!   donors are taken and paired position by position.
//! - `SortBy`: primaries stay in key order and meet donors in preference order.
//!
//! When a bucket is short, the primaries left over stay pending.

use std::collections::BTreeMap;

use tracing::debug;

use sp_core::{
    determinism::sort_rows_by_key, rng::DrawRng, CollectionError, ColumnRole, GeoLevel, RecordCollection,
    RoundName, SelectionOrder,
};

use crate::donor_pool::{BucketKey, DonorPool};

/// Parameters of one pass.
#[derive(Clone, Copy, Debug)]
pub struct PassSpec<'a> {
    pub round: &'a RoundName,
    pub group_vars: &'a [String],
    pub level: GeoLevel,
    pub seed: u64,
    pub order: &'a SelectionOrder,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassOutcome {
    /// (primary row, donor row), in bucket order then pairing order.
    pub matches: Vec<(usize, usize)>,
    /// Buckets holding at least one pending primary.
    pub buckets: usize,
    /// Buckets with fewer donors than pending primaries.
    pub short_buckets: usize,
    /// Pending primaries left out for a null grouping value.
    pub skipped_null: usize,
}

/// Run one pass over `pending` (primary rows), consuming donors from `pool`.
pub fn run_pass(
    primary: &RecordCollection,
    pending: &[usize],
    pool: &mut DonorPool<'_>,
    spec: &PassSpec<'_>,
) -> Result<PassOutcome, CollectionError> {
    primary.require_columns(spec.group_vars.iter().map(String::as_str), ColumnRole::GroupVar)?;
    let donors_skipped = pool.rebucket(spec.group_vars, spec.level)?;

    let mut out = PassOutcome::default();
    let mut by_bucket: BTreeMap<BucketKey, Vec<usize>> = BTreeMap::new();
    for &row in pending {
        let group = primary.group_key(row, spec.group_vars)?;
        if group.has_null() {
            out.skipped_null += 1;
            continue;
        }
        let geo = primary.geo_key(row, spec.level).map_err(CollectionError::Geography)?.to_owned();
        by_bucket.entry(BucketKey { group, geo }).or_default().push(row);
    }
    out.buckets = by_bucket.len();

    for (bucket, mut rows) in by_bucket {
        let available = pool.available_in(&bucket);
        if available < rows.len() {
            out.short_buckets += 1;
        }
        if available == 0 {
            continue;
        }

        sort_rows_by_key(&mut rows, primary.keys());
        let mut rng = DrawRng::for_context(spec.seed, &[&spec.round.as_str(), &spec.level.as_str(), &bucket]);
        if matches!(spec.order, SelectionOrder::Random) {
            rng.shuffle_in_place(&mut rows);
        }

        let donors = pool.take(&bucket, rows.len(), spec.order, &mut rng)?;
        for (&p, &d) in rows.iter().zip(donors.iter()) {
            pool.record_consumer(d, primary.key(p));
            out.matches.push((p, d));
        }
    }

    debug!(
        round = spec.round.as_str(),
        level = spec.level.as_str(),
        pending = pending.len(),
        matched = out.matches.len(),
        buckets = out.buckets,
        short_buckets = out.short_buckets,
        skipped_null = out.skipped_null,
        donors_skipped_null = donors_skipped,
        donors_left = pool.remaining(),
        "match pass"
    );
    Ok(out)
}
