//! Column-major table with copy-on-write columns.
//!
//! Columns sit behind `Arc`, so `with_column` / `take_rows` hand out new
//! tables without touching the caller's copy. A merge never mutates a table it
//! was given.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::CoreError;
use crate::value::Value;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Arc<Vec<Value>>>,
    index: BTreeMap<String, usize>,
    n_rows: usize,
}

impl Table {
    /// Build from named columns; names must be unique and lengths equal.
    pub fn from_columns<I, S>(cols: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = (S, Vec<Value>)>,
        S: Into<String>,
    {
        let mut t = Table::default();
        let mut first = true;
        for (name, values) in cols {
            let name = name.into();
            if first {
                t.n_rows = values.len();
                first = false;
            }
            t.push_column(name, values)?;
        }
        Ok(t)
    }

    /// Build from a header and row-major cells (every row as wide as the header).
    pub fn from_rows(names: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, CoreError> {
        let width = names.len();
        let mut cols: Vec<Vec<Value>> = (0..width).map(|_| Vec::with_capacity(rows.len())).collect();
        for row in rows {
            if row.len() != width {
                return Err(CoreError::LengthMismatch {
                    column: "<row>".to_owned(),
                    expected: width,
                    got: row.len(),
                });
            }
            for (c, v) in row.into_iter().enumerate() {
                cols[c].push(v);
            }
        }
        let n_rows = cols.first().map_or(0, Vec::len);
        let mut t = Table { n_rows, ..Table::default() };
        for (name, values) in names.into_iter().zip(cols) {
            t.push_column(name, values)?;
        }
        Ok(t)
    }

    fn push_column(&mut self, name: String, values: Vec<Value>) -> Result<(), CoreError> {
        if self.index.contains_key(&name) {
            return Err(CoreError::DuplicateColumn(name));
        }
        if values.len() != self.n_rows {
            return Err(CoreError::LengthMismatch { column: name, expected: self.n_rows, got: values.len() });
        }
        self.index.insert(name.clone(), self.names.len());
        self.names.push(name);
        self.columns.push(Arc::new(values));
        Ok(())
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    #[inline]
    pub fn n_cols(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[inline]
    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.index.get(name).map(|&i| self.columns[i].as_slice())
    }

    pub fn cell(&self, row: usize, name: &str) -> Option<&Value> {
        self.column(name).and_then(|c| c.get(row))
    }

    /// New table with `name` set to `values` (replaced in place if present,
    /// appended otherwise). Other columns are shared with `self`.
    pub fn with_column(&self, name: &str, values: Vec<Value>) -> Result<Self, CoreError> {
        if values.len() != self.n_rows {
            return Err(CoreError::LengthMismatch {
                column: name.to_owned(),
                expected: self.n_rows,
                got: values.len(),
            });
        }
        let mut t = self.clone();
        match t.index.get(name) {
            Some(&i) => t.columns[i] = Arc::new(values),
            None => t.push_column(name.to_owned(), values)?,
        }
        Ok(t)
    }

    /// New table holding `rows` (in the order given; repeats allowed).
    pub fn take_rows(&self, rows: &[usize]) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|c| Arc::new(rows.iter().map(|&r| c[r].clone()).collect::<Vec<_>>()))
            .collect();
        Table {
            names: self.names.clone(),
            columns,
            index: self.index.clone(),
            n_rows: rows.len(),
        }
    }

    /// Cells of one row in column order.
    pub fn row(&self, row: usize) -> impl Iterator<Item = &Value> + '_ {
        self.columns.iter().map(move |c| &c[row])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_columns([
            ("id", vec![Value::text("a"), Value::text("b")]),
            ("n", vec![Value::Int(1), Value::Int(2)]),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_ragged_and_duplicate_columns() {
        let ragged = Table::from_columns([
            ("a", vec![Value::Int(1)]),
            ("b", vec![Value::Int(1), Value::Int(2)]),
        ]);
        assert!(matches!(ragged, Err(CoreError::LengthMismatch { .. })));

        let dup = Table::from_columns([("a", vec![Value::Int(1)]), ("a", vec![Value::Int(2)])]);
        assert_eq!(dup, Err(CoreError::DuplicateColumn("a".into())));
    }

    #[test]
    fn with_column_is_copy_on_write() {
        let t = sample();
        let t2 = t.with_column("n", vec![Value::Int(9), Value::Int(8)]).unwrap();
        let t3 = t.with_column("extra", vec![Value::Null, Value::Null]).unwrap();
        assert_eq!(t.column("n").unwrap(), &[Value::Int(1), Value::Int(2)]);
        assert_eq!(t2.column("n").unwrap(), &[Value::Int(9), Value::Int(8)]);
        assert!(!t.has_column("extra"));
        assert_eq!(t3.n_cols(), 3);
        assert!(t.with_column("n", vec![]).is_err());
    }

    #[test]
    fn take_rows_repeats_and_reorders() {
        let t = sample().take_rows(&[1, 1, 0]);
        assert_eq!(t.n_rows(), 3);
        assert_eq!(t.column("id").unwrap()[0], Value::text("b"));
        assert_eq!(t.column("id").unwrap()[2], Value::text("a"));
    }

    #[test]
    fn from_rows_matches_from_columns() {
        let t = Table::from_rows(
            vec!["id".into(), "n".into()],
            vec![vec![Value::text("a"), Value::Int(1)], vec![Value::text("b"), Value::Int(2)]],
        )
        .unwrap();
        assert_eq!(t, sample());
    }
}
