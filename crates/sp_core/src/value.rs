//! Typed table cells.
//!
//! `Value` carries a **total** order (floats via `f64::total_cmp`) so cells can
//! key `BTreeMap` buckets and sort deterministically. Cross-type comparison for
//! predicates (`Int` vs `Float`) goes through [`Value::cmp_loose`] instead.

use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::determinism::HashCanon;
use crate::errors::CoreError;

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    #[inline]
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Variant name, as shown in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(x) if x.fract() == 0.0 && x.is_finite() => Some(*x as i64),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// Parse a cell of a column declared numeric: empty → `Null`, integer
    /// literal → `Int`, otherwise `Float`.
    pub fn parse_numeric(column: &str, raw: &str) -> Result<Value, CoreError> {
        let t = raw.trim();
        if t.is_empty() {
            return Ok(Value::Null);
        }
        if let Ok(i) = t.parse::<i64>() {
            return Ok(Value::Int(i));
        }
        t.parse::<f64>()
            .map(Value::Float)
            .map_err(|_| CoreError::InvalidNumber { column: column.to_owned(), raw: raw.to_owned() })
    }

    /// Parse a text cell: empty → `Null`, otherwise verbatim (leading zeros kept).
    pub fn parse_text(raw: &str) -> Value {
        if raw.is_empty() { Value::Null } else { Value::Text(raw.to_owned()) }
    }

    /// Comparison used by predicates. Numbers compare across `Int`/`Float`,
    /// text with text, bools with bools; anything else (including `Null`) is
    /// incomparable.
    pub fn cmp_loose(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Float(_) => 3,
            Value::Text(_) => 4,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(x) => x.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
        }
    }
}

impl HashCanon for Value {
    /// Tag byte, then a fixed-width or length-prefixed payload.
    fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = vec![self.rank()];
        match self {
            Value::Null => {}
            Value::Bool(b) => out.push(u8::from(*b)),
            Value::Int(i) => out.extend_from_slice(&i.to_le_bytes()),
            Value::Float(x) => out.extend_from_slice(&x.to_bits().to_le_bytes()),
            Value::Text(s) => {
                out.extend_from_slice(&(s.len() as u64).to_le_bytes());
                out.extend_from_slice(s.as_bytes());
            }
        }
        out
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_parse_keeps_ints() {
        assert_eq!(Value::parse_numeric("n", "42").unwrap(), Value::Int(42));
        assert_eq!(Value::parse_numeric("n", " 2.5 ").unwrap(), Value::Float(2.5));
        assert_eq!(Value::parse_numeric("n", "").unwrap(), Value::Null);
        assert!(Value::parse_numeric("n", "abc").is_err());
    }

    #[test]
    fn text_parse_keeps_leading_zeros() {
        assert_eq!(Value::parse_text("06001"), Value::text("06001"));
        assert_eq!(Value::parse_text(""), Value::Null);
    }

    #[test]
    fn loose_compare_crosses_numeric_types() {
        assert_eq!(Value::Int(3).cmp_loose(&Value::Float(2.5)), Some(Ordering::Greater));
        assert_eq!(Value::Int(3).cmp_loose(&Value::text("3")), None);
        assert_eq!(Value::Null.cmp_loose(&Value::Null), None);
    }

    #[test]
    fn total_order_ranks_types() {
        let mut v = vec![Value::text("a"), Value::Int(1), Value::Null, Value::Float(0.5)];
        v.sort();
        assert_eq!(v, vec![Value::Null, Value::Int(1), Value::Float(0.5), Value::text("a")]);
    }

    #[test]
    fn canonical_bytes_distinguish_types() {
        assert_ne!(Value::Int(1).canonical_bytes(), Value::text("1").canonical_bytes());
        assert_ne!(Value::text("ab").canonical_bytes(), Value::text("a").canonical_bytes());
    }
}
