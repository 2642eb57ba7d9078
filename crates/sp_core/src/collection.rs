//! Record collections: a table plus its primary key, geography rule, declared
//! grouping variables and a provenance note.
//!
//! Construction validates the schema (key, geography and grouping columns
//! present) and key uniqueness. All derived collections (`with_column`,
//! `expand_by_count`) are new values; the source is never mutated.

use core::fmt;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::determinism::HashCanon;
use crate::errors::CoreError;
use crate::geography::{GeoLevel, GeoRule};
use crate::ids::RecordKey;
use crate::predicate::Predicate;
use crate::table::Table;
use crate::value::Value;

/// What a missing column was needed for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ColumnRole {
    Key,
    Geography,
    GroupVar,
    Graft,
    Filter,
    Selection,
    Count,
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ColumnRole::Key => "key",
            ColumnRole::Geography => "geography",
            ColumnRole::GroupVar => "grouping variable",
            ColumnRole::Graft => "graft source",
            ColumnRole::Filter => "filter",
            ColumnRole::Selection => "selection order",
            ColumnRole::Count => "count",
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CollectionError {
    /// A declared column is absent.
    Schema { column: String, role: ColumnRole },
    /// Primary key not unique.
    DuplicateKey { key: String },
    /// Primary key cell empty or not a valid key.
    NullKey { row: usize },
    /// Geography codes could not be derived.
    Geography(CoreError),
    /// Any other core failure (value parsing, table shape).
    Core(CoreError),
}

impl fmt::Display for CollectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionError::Schema { column, role } => write!(f, "missing {role} column: {column}"),
            CollectionError::DuplicateKey { key } => write!(f, "duplicate primary key: {key}"),
            CollectionError::NullKey { row } => write!(f, "row {row}: primary key missing or invalid"),
            CollectionError::Geography(e) => write!(f, "geography: {e}"),
            CollectionError::Core(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CollectionError {}

impl From<CoreError> for CollectionError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::UnknownColumn(column) => CollectionError::Schema { column, role: ColumnRole::Filter },
            other => CollectionError::Core(other),
        }
    }
}

/// Declared shape of a collection (everything except the table itself).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
pub struct CollectionSpec {
    pub key: String,
    pub geo: GeoRule,
    #[cfg_attr(feature = "serde", serde(default))]
    pub group_vars: Vec<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub notes: String,
}

impl CollectionSpec {
    pub fn new(key: &str, geo: GeoRule) -> Self {
        Self { key: key.to_owned(), geo, group_vars: Vec::new(), notes: String::new() }
    }

    pub fn group_vars(mut self, vars: &[&str]) -> Self {
        self.group_vars = vars.iter().map(|s| (*s).to_owned()).collect();
        self
    }

    pub fn notes(mut self, notes: &str) -> Self {
        self.notes = notes.to_owned();
        self
    }
}

/// Tuple of grouping-variable values; the bucket label within a round.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey(pub Vec<Value>);

impl GroupKey {
    pub fn has_null(&self) -> bool {
        self.0.iter().any(Value::is_null)
    }
}

impl HashCanon for GroupKey {
    fn canonical_bytes(&self) -> Vec<u8> {
        self.0.as_slice().canonical_bytes()
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct RecordCollection {
    table: Table,
    spec: CollectionSpec,
    keys: Arc<Vec<RecordKey>>,
    key_index: Arc<HashMap<RecordKey, usize>>,
    geo_codes: Arc<Vec<String>>,
}

impl RecordCollection {
    pub fn new(table: Table, spec: CollectionSpec) -> Result<Self, CollectionError> {
        let key_col = table
            .column(&spec.key)
            .ok_or_else(|| CollectionError::Schema { column: spec.key.clone(), role: ColumnRole::Key })?;
        for c in spec.geo.columns() {
            if !table.has_column(c) {
                return Err(CollectionError::Schema { column: c.to_owned(), role: ColumnRole::Geography });
            }
        }
        for g in &spec.group_vars {
            if !table.has_column(g) {
                return Err(CollectionError::Schema { column: g.clone(), role: ColumnRole::GroupVar });
            }
        }

        let mut keys = Vec::with_capacity(table.n_rows());
        let mut key_index = HashMap::with_capacity(table.n_rows());
        for (row, cell) in key_col.iter().enumerate() {
            if cell.is_null() {
                return Err(CollectionError::NullKey { row });
            }
            let key: RecordKey = cell.to_string().parse().map_err(|_| CollectionError::NullKey { row })?;
            if key_index.insert(key.clone(), row).is_some() {
                return Err(CollectionError::DuplicateKey { key: key.to_string() });
            }
            keys.push(key);
        }

        let geo_codes = spec.geo.codes(&table).map_err(CollectionError::Geography)?;

        Ok(Self {
            table,
            spec,
            keys: Arc::new(keys),
            key_index: Arc::new(key_index),
            geo_codes: Arc::new(geo_codes),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.table.n_rows()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn table(&self) -> &Table {
        &self.table
    }

    #[inline]
    pub fn spec(&self) -> &CollectionSpec {
        &self.spec
    }

    #[inline]
    pub fn key_column(&self) -> &str {
        &self.spec.key
    }

    #[inline]
    pub fn notes(&self) -> &str {
        &self.spec.notes
    }

    #[inline]
    pub fn group_vars(&self) -> &[String] {
        &self.spec.group_vars
    }

    #[inline]
    pub fn geo_rule(&self) -> &GeoRule {
        &self.spec.geo
    }

    #[inline]
    pub fn keys(&self) -> &[RecordKey] {
        &self.keys
    }

    #[inline]
    pub fn key(&self, row: usize) -> &RecordKey {
        &self.keys[row]
    }

    pub fn row_of(&self, key: &RecordKey) -> Option<usize> {
        self.key_index.get(key).copied()
    }

    /// Finest-level geography code of `row`.
    #[inline]
    pub fn geo_code(&self, row: usize) -> &str {
        &self.geo_codes[row]
    }

    /// Geography key of `row` at `level`, by truncation.
    pub fn geo_key(&self, row: usize, level: GeoLevel) -> Result<&str, CoreError> {
        level.truncate(&self.geo_codes[row])
    }

    pub fn column(&self, name: &str) -> Result<&[Value], CollectionError> {
        self.table
            .column(name)
            .ok_or_else(|| CollectionError::Schema { column: name.to_owned(), role: ColumnRole::Filter })
    }

    /// Fail with `Schema` on the first of `names` that is absent.
    pub fn require_columns<'a, I>(&self, names: I, role: ColumnRole) -> Result<(), CollectionError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        match names.into_iter().find(|n| !self.table.has_column(n)) {
            Some(column) => Err(CollectionError::Schema { column: column.to_owned(), role }),
            None => Ok(()),
        }
    }

    /// Grouping-variable values of `row` for `vars`.
    pub fn group_key(&self, row: usize, vars: &[String]) -> Result<GroupKey, CollectionError> {
        vars.iter()
            .map(|v| {
                self.table
                    .cell(row, v)
                    .cloned()
                    .ok_or_else(|| CollectionError::Schema { column: v.clone(), role: ColumnRole::GroupVar })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(GroupKey)
    }

    /// Rows per grouping-key tuple (rows ascending within each group).
    pub fn group_by(&self, vars: &[String]) -> Result<BTreeMap<GroupKey, Vec<usize>>, CollectionError> {
        self.require_columns(vars.iter().map(String::as_str), ColumnRole::GroupVar)?;
        let mut out: BTreeMap<GroupKey, Vec<usize>> = BTreeMap::new();
        for row in 0..self.len() {
            out.entry(self.group_key(row, vars)?).or_default().push(row);
        }
        Ok(out)
    }

    /// Read-only view of rows satisfying `pred`.
    pub fn filter(&self, pred: &Predicate) -> Result<CollectionView<'_>, CollectionError> {
        Ok(CollectionView { coll: self, rows: pred.select(&self.table)? })
    }

    /// New collection with column `name` set; the key column cannot be replaced.
    pub fn with_column(&self, name: &str, values: Vec<Value>) -> Result<Self, CollectionError> {
        if name == self.spec.key {
            return Err(CollectionError::Core(CoreError::DuplicateColumn(name.to_owned())));
        }
        let table = self.table.with_column(name, values)?;
        let geo_touched = self.spec.geo.columns().contains(&name);
        let geo_codes = if geo_touched {
            Arc::new(self.spec.geo.codes(&table).map_err(CollectionError::Geography)?)
        } else {
            Arc::clone(&self.geo_codes)
        };
        Ok(Self {
            table,
            spec: self.spec.clone(),
            keys: Arc::clone(&self.keys),
            key_index: Arc::clone(&self.key_index),
            geo_codes,
        })
    }

    /// One row per slot: each record is repeated N times (N from the integer
    /// column `count_column`; null or non-positive → dropped) and copy `i`
    /// gets key `"<key>#<i>"`, `i` starting at 1.
    pub fn expand_by_count(&self, count_column: &str) -> Result<Self, CollectionError> {
        let counts = self
            .table
            .column(count_column)
            .ok_or_else(|| CollectionError::Schema { column: count_column.to_owned(), role: ColumnRole::Count })?;

        let mut rows = Vec::new();
        let mut new_keys = Vec::new();
        for (row, cell) in counts.iter().enumerate() {
            let n = match cell {
                Value::Null => 0,
                v => v.as_i64().ok_or_else(|| {
                    CollectionError::Core(CoreError::InvalidNumber {
                        column: count_column.to_owned(),
                        raw: v.to_string(),
                    })
                })?,
            };
            for i in 1..=n.max(0) {
                rows.push(row);
                new_keys.push(Value::Text(format!("{}#{i}", self.keys[row])));
            }
        }
        let table = self.table.take_rows(&rows).with_column(&self.spec.key, new_keys)?;
        RecordCollection::new(table, self.spec.clone())
    }
}

/// Borrowed, read-only subset of a collection (rows ascending).
#[derive(Clone, Debug)]
pub struct CollectionView<'a> {
    coll: &'a RecordCollection,
    rows: Vec<usize>,
}

impl<'a> CollectionView<'a> {
    #[inline]
    pub fn collection(&self) -> &'a RecordCollection {
        self.coll
    }

    #[inline]
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &'a RecordKey> + '_ {
        self.rows.iter().map(move |&r| self.coll.key(r))
    }

    pub fn into_rows(self) -> Vec<usize> {
        self.rows
    }
}
