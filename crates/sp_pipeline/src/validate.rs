//! crates/sp_pipeline/src/validate.rs
//! Structural validation of a merge before any donor is touched.
//! Deterministic output; no RNG; issues are stably sorted.
//!
//! Strict posture: a round naming a grouping variable that either collection
//! lacks is an Error, never a silently dropped column.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use sp_core::{GeoLevel, MergeConfig, RecordCollection, Value};

/// Which side of the merge an issue or error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Primary,
    Secondary,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Primary => "primary",
            Side::Secondary => "secondary",
        })
    }
}

/// Issue severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// Where the issue occurred. Variant order is the sort order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "at", rename_all = "snake_case")]
pub enum EntityRef {
    Root,
    Param(&'static str),
    Round(String),
    Graft(String),
    Column(Side, String),
}

/// One validation finding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    #[serde(rename = "where")]
    pub where_: EntityRef,
}

/// Deterministic report: pass = (no Error); ordering of issues is stable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub pass: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.errors().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", issue.code, issue.message)?;
        }
        Ok(())
    }
}

/// Top-level entry point.
pub fn validate(primary: &RecordCollection, secondary: &RecordCollection, cfg: &MergeConfig) -> ValidationReport {
    let mut issues: Vec<ValidationIssue> = Vec::new();

    issues.extend(check_ladder(primary, secondary, cfg));
    issues.extend(check_rounds(primary, secondary, cfg));
    issues.extend(check_grafts(primary, secondary, cfg));
    issues.extend(check_output_columns(primary, secondary, cfg));
    issues.extend(check_filters_and_selection(primary, secondary, cfg));
    issues.extend(check_sentinel(cfg));

    if secondary.is_empty() {
        issues.push(warning("Secondary.Empty", "secondary collection has no records".into(), EntityRef::Root));
    }

    sort_issues_stably(&mut issues);

    ValidationReport { pass: !issues.iter().any(|i| i.severity == Severity::Error), issues }
}

// ------------------------------------------------------------------------------------------------
// Checks
// ------------------------------------------------------------------------------------------------

/// Every ladder level must be derivable from both collections' geography.
fn check_ladder(primary: &RecordCollection, secondary: &RecordCollection, cfg: &MergeConfig) -> Vec<ValidationIssue> {
    let finest = cfg.ladder.finest();
    [(Side::Primary, primary), (Side::Secondary, secondary)]
        .into_iter()
        .filter(|(_, c)| finest < c.geo_rule().level())
        .map(|(side, c)| {
            error(
                "Ladder.FinerThanData",
                format!("{side} geography is at {} but the ladder starts at {finest}", c.geo_rule().level()),
                EntityRef::Param("ladder"),
            )
        })
        .collect()
}

/// Errors:
/// - "Round.DuplicateName"
/// - "Round.LevelNotOnLadder" (start or stop)
/// - "Round.StopBeforeStart"
/// - "Round.GroupVarMissing" (per side)
/// Warnings:
/// - "Config.NoRounds"
/// - "Round.GroupVarTypeMismatch" (non-null cell types differ between sides)
fn check_rounds(primary: &RecordCollection, secondary: &RecordCollection, cfg: &MergeConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if cfg.rounds.is_empty() {
        issues.push(warning(
            "Config.NoRounds",
            "no rounds configured; every participating record gets the sentinel".into(),
            EntityRef::Param("rounds"),
        ));
    }

    let mut seen = BTreeSet::new();
    for round in &cfg.rounds {
        let at = || EntityRef::Round(round.name.to_string());
        if !seen.insert(round.name.as_str()) {
            issues.push(error("Round.DuplicateName", format!("round {} appears twice", round.name), at()));
        }
        for level in std::iter::once(round.start_level).chain(round.stop_level) {
            if !cfg.ladder.contains(level) {
                issues.push(error("Round.LevelNotOnLadder", format!("level {level} is not on the ladder"), at()));
            }
        }
        if let Some(stop) = round.stop_level {
            if stop < round.start_level {
                issues.push(error(
                    "Round.StopBeforeStart",
                    format!("stop level {stop} is finer than start level {}", round.start_level),
                    at(),
                ));
            }
        }
        for var in &round.group_vars {
            let mut kinds = Vec::with_capacity(2);
            for (side, coll) in [(Side::Primary, primary), (Side::Secondary, secondary)] {
                match coll.column(var) {
                    Ok(cells) => kinds.push(cell_kinds(cells)),
                    Err(_) => issues.push(error(
                        "Round.GroupVarMissing",
                        format!("grouping variable {var} missing from {side}"),
                        at(),
                    )),
                }
            }
            if let [p, s] = kinds.as_slice() {
                if !p.is_empty() && !s.is_empty() && p != s {
                    issues.push(warning(
                        "Round.GroupVarTypeMismatch",
                        format!(
                            "grouping variable {var} holds {} in primary but {} in secondary; such buckets never meet",
                            join_kinds(p),
                            join_kinds(s)
                        ),
                        at(),
                    ));
                }
            }
        }
    }
    issues
}

/// Errors:
/// - "Graft.SourceMissing"
/// - "Graft.TargetExists" (target already a primary column)
/// - "Graft.DuplicateTarget"
/// Warnings:
/// - "Graft.None"
fn check_grafts(primary: &RecordCollection, secondary: &RecordCollection, cfg: &MergeConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if cfg.grafts.is_empty() {
        issues.push(warning(
            "Graft.None",
            "no graft fields; only provenance columns are added".into(),
            EntityRef::Param("grafts"),
        ));
    }
    let mut targets = BTreeSet::new();
    for g in &cfg.grafts {
        let at = || EntityRef::Graft(g.target_name().to_owned());
        if !secondary.table().has_column(&g.source) {
            issues.push(error("Graft.SourceMissing", format!("secondary has no column {}", g.source), at()));
        }
        if primary.table().has_column(g.target_name()) {
            issues.push(error("Graft.TargetExists", format!("primary already has column {}", g.target_name()), at()));
        }
        if !targets.insert(g.target_name()) {
            issues.push(error("Graft.DuplicateTarget", format!("two grafts write {}", g.target_name()), at()));
        }
    }
    issues
}

/// Provenance and consumption columns must be new and distinct from graft targets.
fn check_output_columns(
    primary: &RecordCollection,
    secondary: &RecordCollection,
    cfg: &MergeConfig,
) -> Vec<ValidationIssue> {
    let p = &cfg.provenance;
    let graft_targets: BTreeSet<&str> = cfg.grafts.iter().map(|g| g.target_name()).collect();
    let mut issues = Vec::new();
    let mut seen = BTreeSet::new();
    for name in [p.round.as_str(), p.geo_level.as_str(), p.donor_key.as_str()] {
        let at = || EntityRef::Column(Side::Primary, name.to_owned());
        if primary.table().has_column(name) || graft_targets.contains(name) || !seen.insert(name) {
            issues.push(error("Provenance.Collides", format!("primary output column {name} is already taken"), at()));
        }
    }
    let mut seen = BTreeSet::new();
    for name in [p.consumed.as_str(), p.consumed_by.as_str()] {
        let at = || EntityRef::Column(Side::Secondary, name.to_owned());
        if secondary.table().has_column(name) || !seen.insert(name) {
            issues.push(error(
                "Provenance.Collides",
                format!("secondary output column {name} is already taken"),
                at(),
            ));
        }
    }
    issues
}

fn check_filters_and_selection(
    primary: &RecordCollection,
    secondary: &RecordCollection,
    cfg: &MergeConfig,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for (side, coll, pred) in
        [(Side::Primary, primary, &cfg.primary_filter), (Side::Secondary, secondary, &cfg.donor_filter)]
    {
        for col in pred.columns() {
            if !coll.table().has_column(col) {
                issues.push(error(
                    "Filter.ColumnMissing",
                    format!("{side} filter uses unknown column {col}"),
                    EntityRef::Column(side, col.to_owned()),
                ));
            }
        }
    }
    if let sp_core::SelectionOrder::SortBy { column, .. } = &cfg.selection {
        if !secondary.table().has_column(column) {
            issues.push(error(
                "Selection.ColumnMissing",
                format!("sort column {column} missing from secondary"),
                EntityRef::Column(Side::Secondary, column.clone()),
            ));
        }
    }
    issues
}

fn check_sentinel(cfg: &MergeConfig) -> Vec<ValidationIssue> {
    if cfg.sentinel.is_null() {
        vec![error(
            "Sentinel.Null",
            "sentinel must be an explicit value, not null".into(),
            EntityRef::Param("sentinel"),
        )]
    } else {
        Vec::new()
    }
}

// ------------------------------------------------------------------------------------------------
// Utilities
// ------------------------------------------------------------------------------------------------

fn error(code: &'static str, message: String, where_: EntityRef) -> ValidationIssue {
    ValidationIssue { severity: Severity::Error, code, message, where_ }
}

fn warning(code: &'static str, message: String, where_: EntityRef) -> ValidationIssue {
    ValidationIssue { severity: Severity::Warning, code, message, where_ }
}

fn cell_kinds(cells: &[Value]) -> BTreeSet<&'static str> {
    cells.iter().filter(|v| !v.is_null()).map(Value::kind).collect()
}

fn join_kinds(kinds: &BTreeSet<&'static str>) -> String {
    kinds.iter().copied().collect::<Vec<_>>().join("/")
}

/// Levels a round will visit; empty when its levels are invalid.
pub(crate) fn round_levels<'a>(cfg: &'a MergeConfig, round: &sp_core::RoundSpec) -> &'a [GeoLevel] {
    cfg.ladder.span(round.start_level, round.stop_level).unwrap_or(&[])
}

fn sort_issues_stably(issues: &mut [ValidationIssue]) {
    issues.sort_by(|a, b| {
        a.code
            .cmp(b.code)
            .then_with(|| a.where_.cmp(&b.where_))
            .then_with(|| a.message.cmp(&b.message))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use sp_core::{CollectionSpec, GeoLadder, GeoRule, GraftField, RoundSpec, SelectionOrder, Table};

    fn coll(key: &str, extra: &[&str]) -> RecordCollection {
        let mut cols = vec![
            (key.to_owned(), vec![Value::text("r1")]),
            ("block".to_owned(), vec![Value::text("060014001001000")]),
        ];
        cols.extend(extra.iter().map(|c| ((*c).to_owned(), vec![Value::text("x")])));
        RecordCollection::new(Table::from_columns(cols).unwrap(), CollectionSpec::new(key, GeoRule::block_column("block")))
            .unwrap()
    }

    fn cfg(rounds: Vec<RoundSpec>, grafts: Vec<GraftField>) -> MergeConfig {
        MergeConfig::new(42, rounds, grafts, "-999")
    }

    fn codes(r: &ValidationReport) -> Vec<&'static str> {
        r.issues.iter().map(|i| i.code).collect()
    }

    #[test]
    fn clean_config_passes() {
        let p = coll("pid", &["sex"]);
        let s = coll("hid", &["sex", "hh"]);
        let c = cfg(vec![RoundSpec::new("r1", &["sex"], GeoLevel::Block).unwrap()], vec![GraftField::same("hh")]);
        let r = validate(&p, &s, &c);
        assert!(r.pass, "{r}");
        assert!(r.issues.is_empty());
    }

    #[test]
    fn missing_group_var_is_an_error_per_side() {
        let p = coll("pid", &[]);
        let s = coll("hid", &["hh"]);
        let c = cfg(vec![RoundSpec::new("r1", &["sex"], GeoLevel::Block).unwrap()], vec![GraftField::same("hh")]);
        let r = validate(&p, &s, &c);
        assert!(!r.pass);
        assert_eq!(codes(&r), vec!["Round.GroupVarMissing", "Round.GroupVarMissing"]);
    }

    #[test]
    fn group_var_typed_differently_per_side_warns() {
        let p = coll("pid", &[]);
        let p = p.with_column("size", vec![Value::Int(3)]).unwrap();
        let s = coll("hid", &["size", "hh"]);
        let c = cfg(vec![RoundSpec::new("r1", &["size"], GeoLevel::Block).unwrap()], vec![GraftField::same("hh")]);
        let r = validate(&p, &s, &c);
        assert!(r.pass, "a warning does not fail the report");
        assert_eq!(codes(&r), vec!["Round.GroupVarTypeMismatch"]);
        assert!(r.issues[0].message.contains("int in primary but text in secondary"), "{}", r.issues[0].message);

        // all-null on one side says nothing about its type
        let p = coll("pid", &[]).with_column("size", vec![Value::Null]).unwrap();
        assert!(validate(&p, &s, &c).issues.is_empty());
    }

    #[test]
    fn graft_and_provenance_collisions() {
        let p = coll("pid", &["hh", "match_round"]);
        let s = coll("hid", &["consumed"]);
        let c = cfg(vec![], vec![GraftField::same("hh"), GraftField::renamed("missing", "hh")]);
        let r = validate(&p, &s, &c);
        let got = codes(&r);
        for code in [
            "Config.NoRounds",
            "Graft.DuplicateTarget",
            "Graft.SourceMissing",
            "Graft.TargetExists",
            "Provenance.Collides",
        ] {
            assert!(got.contains(&code), "missing {code} in {got:?}");
        }
        let mut sorted = got.clone();
        sorted.sort();
        assert_eq!(got, sorted, "issues sorted by code");
    }

    #[test]
    fn ladder_and_round_levels() {
        let p = coll("pid", &[]);
        let s = coll("hid", &["hh"]);
        let c = cfg(
            vec![
                RoundSpec::new("r1", &[], GeoLevel::State).unwrap(),
                RoundSpec::new("r1", &[], GeoLevel::Tract).unwrap().stop_at(GeoLevel::Block),
            ],
            vec![GraftField::same("hh")],
        );
        let got = codes(&validate(&p, &s, &c));
        assert!(got.contains(&"Round.LevelNotOnLadder"));
        assert!(got.contains(&"Round.StopBeforeStart"));
        assert!(got.contains(&"Round.DuplicateName"));

        let coarse = RecordCollection::new(
            Table::from_columns([("pid", vec![Value::text("p")]), ("tract", vec![Value::text("06001400100")])]).unwrap(),
            CollectionSpec::new("pid", GeoRule::Column { column: "tract".into(), level: GeoLevel::Tract }),
        )
        .unwrap();
        let c = cfg(vec![RoundSpec::new("r", &[], GeoLevel::Tract).unwrap()], vec![GraftField::same("hh")]);
        assert!(codes(&validate(&coarse, &s, &c)).contains(&"Ladder.FinerThanData"));
        let c = c.with_ladder(GeoLadder::new(vec![GeoLevel::Tract, GeoLevel::County]).unwrap());
        assert!(validate(&coarse, &s, &c).pass);
    }

    #[test]
    fn sentinel_filter_and_selection_checks() {
        let p = coll("pid", &[]);
        let s = coll("hid", &["hh"]);
        let c = MergeConfig::new(1, vec![], vec![GraftField::same("hh")], Value::Null)
            .with_selection(SelectionOrder::SortBy { column: "size".into(), descending: false })
            .with_donor_filter(sp_core::Predicate::all(vec![sp_core::Condition::new(
                "vacant",
                sp_core::CmpOp::Eq,
                true,
            )]));
        let got = codes(&validate(&p, &s, &c));
        assert!(got.contains(&"Sentinel.Null"));
        assert!(got.contains(&"Selection.ColumnMissing"));
        assert!(got.contains(&"Filter.ColumnMissing"));
    }
}
