//! Donor Pool: the mutable state of the secondary collection during a merge.
//!
//! Every donor row is `Ineligible` (outside the donor filter), `Available`, or
//! `Consumed`. Consumption is one-way; the number of available donors never
//! grows. Buckets index the available donors by (group key, geography key)
//! for the grouping variables and level of the current pass; they are rebuilt
//! per pass from the state vector, so a donor consumed at a finer level is
//! absent from every coarser bucket.
//!
//! Within a bucket candidates are held in ascending donor-key order. That
//! order, plus the bucket's own RNG stream, fully determines what `take`
//! returns.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use sp_core::{
    determinism::{sort_rows_by_key, HashCanon},
    rng::DrawRng,
    CollectionError, ColumnRole, GeoLevel, GroupKey, RecordCollection, RecordKey, SelectionOrder, Value,
};

/// Bucket label: grouping-variable tuple plus geography key at one level.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey {
    pub group: GroupKey,
    pub geo: String,
}

impl HashCanon for BucketKey {
    fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = self.group.canonical_bytes();
        out.extend(self.geo.canonical_bytes());
        out
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DonorState {
    Ineligible,
    Available,
    /// `by` is filled in once the consuming primary is known.
    Consumed { by: Option<RecordKey> },
}

#[derive(Debug)]
pub struct DonorPool<'a> {
    donors: &'a RecordCollection,
    state: Vec<DonorState>,
    available: usize,
    buckets: BTreeMap<BucketKey, Vec<usize>>,
}

impl<'a> DonorPool<'a> {
    /// Pool over `donors` with only the rows in `eligible` available.
    pub fn new(donors: &'a RecordCollection, eligible: &[usize]) -> Self {
        let mut state = vec![DonorState::Ineligible; donors.len()];
        for &r in eligible {
            state[r] = DonorState::Available;
        }
        let available = state.iter().filter(|s| **s == DonorState::Available).count();
        Self { donors, state, available, buckets: BTreeMap::new() }
    }

    #[inline]
    pub fn donors(&self) -> &'a RecordCollection {
        self.donors
    }

    /// Donors not yet consumed (across all buckets).
    #[inline]
    pub fn remaining(&self) -> usize {
        self.available
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.available == 0
    }

    #[inline]
    pub fn state(&self, row: usize) -> &DonorState {
        &self.state[row]
    }

    pub fn states(&self) -> &[DonorState] {
        &self.state
    }

    /// Re-index available donors for a pass over `group_vars` at `level`.
    ///
    /// Donors with a null value in any grouping variable are left out of
    /// every bucket for this pass. Returns how many were left out.
    pub fn rebucket(&mut self, group_vars: &[String], level: GeoLevel) -> Result<usize, CollectionError> {
        self.donors
            .require_columns(group_vars.iter().map(String::as_str), ColumnRole::GroupVar)?;
        let mut buckets: BTreeMap<BucketKey, Vec<usize>> = BTreeMap::new();
        let mut skipped = 0usize;
        for (row, st) in self.state.iter().enumerate() {
            if *st != DonorState::Available {
                continue;
            }
            let group = self.donors.group_key(row, group_vars)?;
            if group.has_null() {
                skipped += 1;
                continue;
            }
            let geo = self.donors.geo_key(row, level).map_err(CollectionError::Geography)?.to_owned();
            buckets.entry(BucketKey { group, geo }).or_default().push(row);
        }
        for rows in buckets.values_mut() {
            sort_rows_by_key(rows, self.donors.keys());
        }
        self.buckets = buckets;
        Ok(skipped)
    }

    /// Candidates currently available in `bucket`.
    pub fn available_in(&self, bucket: &BucketKey) -> usize {
        self.buckets.get(bucket).map_or(0, Vec::len)
    }

    pub fn bucket_keys(&self) -> impl Iterator<Item = &BucketKey> {
        self.buckets.keys()
    }

    /// Take up to `count` donors from `bucket` and mark them consumed.
    ///
    /// `SortBy` picks in (value, key) order; `Random` shuffles the key-ordered
    /// candidates with `rng` and takes a prefix. Fewer than `count` rows come
    /// back when the bucket runs short.
    pub fn take(
        &mut self,
        bucket: &BucketKey,
        count: usize,
        order: &SelectionOrder,
        rng: &mut DrawRng,
    ) -> Result<Vec<usize>, CollectionError> {
        let donors = self.donors;
        let Some(candidates) = self.buckets.get_mut(bucket) else {
            return Ok(Vec::new());
        };
        if count == 0 || candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut ordered = std::mem::take(candidates);
        match order {
            SelectionOrder::Random => rng.shuffle_in_place(&mut ordered),
            SelectionOrder::SortBy { column, descending } => {
                let Ok(values) = donors.column(column) else {
                    *candidates = ordered;
                    return Err(CollectionError::Schema { column: column.clone(), role: ColumnRole::Selection });
                };
                ordered.sort_by(|&a, &b| {
                    let by_value = compare_for_selection(&values[a], &values[b]);
                    let by_value = if *descending { by_value.reverse() } else { by_value };
                    by_value.then_with(|| donors.key(a).as_str().cmp(donors.key(b).as_str()))
                });
            }
        }

        // The untaken tail goes back in key order.
        let mut rest = ordered.split_off(count.min(ordered.len()));
        sort_rows_by_key(&mut rest, donors.keys());
        *candidates = rest;
        let picked = ordered;

        for &r in &picked {
            self.state[r] = DonorState::Consumed { by: None };
        }
        self.available -= picked.len();
        Ok(picked)
    }

    /// Record which primary consumed `row`.
    pub fn record_consumer(&mut self, row: usize, primary: &RecordKey) {
        if let DonorState::Consumed { by } = &mut self.state[row] {
            *by = Some(primary.clone());
        }
    }
}

/// Nulls sort after every value regardless of direction; numbers compare
/// across Int/Float.
fn compare_for_selection(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.cmp_loose(b).unwrap_or_else(|| a.cmp(b)),
    }
}
