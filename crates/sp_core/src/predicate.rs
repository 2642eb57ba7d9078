//! Row predicates: typed `(column, operator, operand)` conditions combined with AND.
//!
//! Null cells never satisfy an ordering or equality test; `ne` and `not_in`
//! treat them as "different from the operand".

use core::cmp::Ordering;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::table::Table;
use crate::value::Value;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

/// Right-hand side of a condition: one value, or a list for `in` / `not_in`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Operand {
    Scalar(Value),
    List(Vec<Value>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Condition {
    pub column: String,
    pub op: CmpOp,
    pub value: Operand,
}

impl Condition {
    pub fn new(column: impl Into<String>, op: CmpOp, value: impl Into<Value>) -> Self {
        Self { column: column.into(), op, value: Operand::Scalar(value.into()) }
    }

    pub fn is_in(column: impl Into<String>, values: Vec<Value>) -> Self {
        Self { column: column.into(), op: CmpOp::In, value: Operand::List(values) }
    }

    pub fn not_in(column: impl Into<String>, values: Vec<Value>) -> Self {
        Self { column: column.into(), op: CmpOp::NotIn, value: Operand::List(values) }
    }

    fn test(&self, cell: &Value) -> bool {
        let list_contains = |xs: &[Value]| xs.iter().any(|x| cell.cmp_loose(x) == Some(Ordering::Equal));
        let ord = |x: &Value| cell.cmp_loose(x);
        match (self.op, &self.value) {
            (CmpOp::In, Operand::List(xs)) => list_contains(xs),
            (CmpOp::NotIn, Operand::List(xs)) => !list_contains(xs),
            // A list operand on a scalar operator never matches.
            (_, Operand::List(_)) => false,
            (CmpOp::Eq | CmpOp::In, Operand::Scalar(x)) => ord(x) == Some(Ordering::Equal),
            (CmpOp::Ne | CmpOp::NotIn, Operand::Scalar(x)) => ord(x) != Some(Ordering::Equal),
            (CmpOp::Lt, Operand::Scalar(x)) => ord(x) == Some(Ordering::Less),
            (CmpOp::Le, Operand::Scalar(x)) => matches!(ord(x), Some(Ordering::Less | Ordering::Equal)),
            (CmpOp::Gt, Operand::Scalar(x)) => ord(x) == Some(Ordering::Greater),
            (CmpOp::Ge, Operand::Scalar(x)) => matches!(ord(x), Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}

/// Conjunction of conditions. An empty predicate selects every row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Predicate {
    pub all: Vec<Condition>,
}

impl Predicate {
    pub fn all(conditions: Vec<Condition>) -> Self {
        Self { all: conditions }
    }

    pub fn and(mut self, c: Condition) -> Self {
        self.all.push(c);
        self
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.all.iter().map(|c| c.column.as_str())
    }

    /// Every referenced column must exist in `t`.
    pub fn check_columns(&self, t: &Table) -> Result<(), CoreError> {
        match self.columns().find(|c| !t.has_column(c)) {
            Some(c) => Err(CoreError::UnknownColumn(c.to_owned())),
            None => Ok(()),
        }
    }

    /// Row indices of `t` satisfying every condition, ascending.
    pub fn select(&self, t: &Table) -> Result<Vec<usize>, CoreError> {
        self.check_columns(t)?;
        let cols: Vec<(&Condition, &[Value])> = self
            .all
            .iter()
            .filter_map(|c| t.column(&c.column).map(|col| (c, col)))
            .collect();
        Ok((0..t.n_rows())
            .filter(|&r| cols.iter().all(|(c, col)| c.test(&col[r])))
            .collect())
    }
}
