//! Merge parameters: rounds, grafted fields, selection order, sentinel, seed.
//!
//! Typed replacement for per-call configuration dictionaries. Unknown fields
//! are rejected on deserialization.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::geography::{GeoLadder, GeoLevel};
use crate::ids::RoundName;
use crate::predicate::Predicate;
use crate::value::Value;

/// Provenance value for records never matched.
pub const UNMATCHED: &str = "unmatched";
/// Provenance value for records outside the primary filter.
pub const EXCLUDED: &str = "excluded";
/// `consumed_by` value for donors nobody took.
pub const UNCONSUMED: &str = "unconsumed";

/// One match round: grouping variables (possibly none) and the geography
/// level it starts at. Escalation runs up to `stop_level` (default: the
/// coarsest ladder level).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
pub struct RoundSpec {
    pub name: RoundName,
    #[cfg_attr(feature = "serde", serde(default))]
    pub group_vars: Vec<String>,
    pub start_level: GeoLevel,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub stop_level: Option<GeoLevel>,
}

impl RoundSpec {
    pub fn new(name: &str, group_vars: &[&str], start_level: GeoLevel) -> Result<Self, CoreError> {
        Ok(Self {
            name: name.parse()?,
            group_vars: group_vars.iter().map(|s| (*s).to_owned()).collect(),
            start_level,
            stop_level: None,
        })
    }

    pub fn stop_at(mut self, level: GeoLevel) -> Self {
        self.stop_level = Some(level);
        self
    }
}

/// A secondary column copied onto matched primary records.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
pub struct GraftField {
    pub source: String,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub target: Option<String>,
}

impl GraftField {
    pub fn same(source: &str) -> Self {
        Self { source: source.to_owned(), target: None }
    }

    pub fn renamed(source: &str, target: &str) -> Self {
        Self { source: source.to_owned(), target: Some(target.to_owned()) }
    }

    /// Column name on the primary output.
    pub fn target_name(&self) -> &str {
        self.target.as_deref().unwrap_or(&self.source)
    }
}

/// How donors are picked out of a bucket.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum SelectionOrder {
    /// Seeded random draw among the bucket's remaining donors.
    #[default]
    Random,
    /// Deterministic preference by a donor column (ties: donor key ascending).
    SortBy {
        column: String,
        #[cfg_attr(feature = "serde", serde(default))]
        descending: bool,
    },
}

/// Names of the provenance / consumption columns added to the outputs.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct ProvenanceColumns {
    pub round: String,
    pub geo_level: String,
    pub donor_key: String,
    pub consumed: String,
    pub consumed_by: String,
}

impl Default for ProvenanceColumns {
    fn default() -> Self {
        Self {
            round: "match_round".into(),
            geo_level: "match_geo_level".into(),
            donor_key: "donor_key".into(),
            consumed: "consumed".into(),
            consumed_by: "consumed_by".into(),
        }
    }
}

/// Everything one merge invocation needs besides the two collections.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
pub struct MergeConfig {
    pub seed: u64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub ladder: GeoLadder,
    pub rounds: Vec<RoundSpec>,
    pub grafts: Vec<GraftField>,
    pub sentinel: Value,
    #[cfg_attr(feature = "serde", serde(default))]
    pub selection: SelectionOrder,
    #[cfg_attr(feature = "serde", serde(default))]
    pub primary_filter: Predicate,
    #[cfg_attr(feature = "serde", serde(default))]
    pub donor_filter: Predicate,
    #[cfg_attr(feature = "serde", serde(default))]
    pub provenance: ProvenanceColumns,
}

impl MergeConfig {
    /// Config with the census ladder, random selection, no filters and the
    /// default provenance column names.
    pub fn new(seed: u64, rounds: Vec<RoundSpec>, grafts: Vec<GraftField>, sentinel: impl Into<Value>) -> Self {
        Self {
            seed,
            ladder: GeoLadder::default(),
            rounds,
            grafts,
            sentinel: sentinel.into(),
            selection: SelectionOrder::Random,
            primary_filter: Predicate::default(),
            donor_filter: Predicate::default(),
            provenance: ProvenanceColumns::default(),
        }
    }

    pub fn with_ladder(mut self, ladder: GeoLadder) -> Self {
        self.ladder = ladder;
        self
    }

    pub fn with_selection(mut self, selection: SelectionOrder) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_primary_filter(mut self, p: Predicate) -> Self {
        self.primary_filter = p;
        self
    }

    pub fn with_donor_filter(mut self, p: Predicate) -> Self {
        self.donor_filter = p;
        self
    }
}
