//! Geography levels, truncation rules and the escalation ladder.
//!
//! Census block ids are 15 characters: state(2) county(3) tract(6) block(4),
//! the first block digit naming the block group. Every coarser key is a
//! prefix of the finest one and is never stored separately.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::table::Table;
use crate::value::Value;

/// Spatial aggregation levels. Declaration order is finest → coarsest, so the
/// derived `Ord` reads "a < b" as "a is finer than b".
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum GeoLevel {
    Block,
    BlockGroup,
    Tract,
    County,
    State,
}

impl GeoLevel {
    pub const ALL: [GeoLevel; 5] =
        [GeoLevel::Block, GeoLevel::BlockGroup, GeoLevel::Tract, GeoLevel::County, GeoLevel::State];

    /// Prefix length of a block id at this level.
    #[inline]
    pub const fn code_len(self) -> usize {
        match self {
            GeoLevel::Block => 15,
            GeoLevel::BlockGroup => 12,
            GeoLevel::Tract => 11,
            GeoLevel::County => 5,
            GeoLevel::State => 2,
        }
    }

    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            GeoLevel::Block => "block",
            GeoLevel::BlockGroup => "block_group",
            GeoLevel::Tract => "tract",
            GeoLevel::County => "county",
            GeoLevel::State => "state",
        }
    }

    /// Truncate a code (at this level or finer) to this level.
    pub fn truncate(self, code: &str) -> Result<&str, CoreError> {
        code.get(..self.code_len())
            .ok_or_else(|| CoreError::GeoTooShort { code: code.to_owned(), level: self.as_str() })
    }
}

impl fmt::Display for GeoLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeoLevel {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GeoLevel::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| CoreError::UnknownGeoLevel(s.to_owned()))
    }
}

/// Ordered levels used for escalation, strictly finest → coarsest.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "Vec<GeoLevel>", into = "Vec<GeoLevel>"))]
pub struct GeoLadder(Vec<GeoLevel>);

impl GeoLadder {
    pub fn new(levels: Vec<GeoLevel>) -> Result<Self, CoreError> {
        if levels.is_empty() {
            return Err(CoreError::EmptyLadder);
        }
        if levels.windows(2).any(|w| w[0] >= w[1]) {
            return Err(CoreError::LadderNotCoarsening);
        }
        Ok(Self(levels))
    }

    /// Block → block group → tract → county.
    pub fn census() -> Self {
        Self(vec![GeoLevel::Block, GeoLevel::BlockGroup, GeoLevel::Tract, GeoLevel::County])
    }

    #[inline]
    pub fn levels(&self) -> &[GeoLevel] {
        &self.0
    }

    #[inline]
    pub fn finest(&self) -> GeoLevel {
        self.0[0]
    }

    #[inline]
    pub fn coarsest(&self) -> GeoLevel {
        self.0[self.0.len() - 1]
    }

    pub fn contains(&self, level: GeoLevel) -> bool {
        self.0.contains(&level)
    }

    /// Levels from `start` up to `stop` inclusive (`None` = coarsest).
    pub fn span(&self, start: GeoLevel, stop: Option<GeoLevel>) -> Result<&[GeoLevel], CoreError> {
        let from = self
            .0
            .iter()
            .position(|&l| l == start)
            .ok_or(CoreError::LevelNotOnLadder(start.as_str()))?;
        let to = match stop {
            None => self.0.len() - 1,
            Some(s) => self.0.iter().position(|&l| l == s).ok_or(CoreError::LevelNotOnLadder(s.as_str()))?,
        };
        if to < from {
            return Err(CoreError::LadderNotCoarsening);
        }
        Ok(&self.0[from..=to])
    }
}

impl TryFrom<Vec<GeoLevel>> for GeoLadder {
    type Error = CoreError;
    fn try_from(v: Vec<GeoLevel>) -> Result<Self, Self::Error> {
        GeoLadder::new(v)
    }
}

impl From<GeoLadder> for Vec<GeoLevel> {
    fn from(l: GeoLadder) -> Self {
        l.0
    }
}

impl Default for GeoLadder {
    fn default() -> Self {
        GeoLadder::census()
    }
}

/// How a collection's finest geography code is obtained from its table.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum GeoRule {
    /// One column holding codes at `level` (e.g. a 15-char block id).
    Column { column: String, level: GeoLevel },
    /// Component columns concatenated in order (state, county, tract, block).
    Concat { columns: Vec<String>, level: GeoLevel },
}

impl GeoRule {
    pub fn block_column(column: impl Into<String>) -> Self {
        GeoRule::Column { column: column.into(), level: GeoLevel::Block }
    }

    /// Finest level the data carries.
    pub fn level(&self) -> GeoLevel {
        match self {
            GeoRule::Column { level, .. } | GeoRule::Concat { level, .. } => *level,
        }
    }

    pub fn columns(&self) -> Vec<&str> {
        match self {
            GeoRule::Column { column, .. } => vec![column.as_str()],
            GeoRule::Concat { columns, .. } => columns.iter().map(String::as_str).collect(),
        }
    }

    /// Finest-level code for every row of `t`.
    pub fn codes(&self, t: &Table) -> Result<Vec<String>, CoreError> {
        let cols = self
            .columns()
            .into_iter()
            .map(|c| t.column(c).ok_or_else(|| CoreError::UnknownColumn(c.to_owned())))
            .collect::<Result<Vec<_>, _>>()?;
        let need = self.level().code_len();
        (0..t.n_rows())
            .map(|r| {
                let mut code = String::with_capacity(need);
                for col in &cols {
                    match &col[r] {
                        Value::Null => return Err(CoreError::GeoMissing { row: r }),
                        v => code.push_str(&v.to_string()),
                    }
                }
                if code.len() < need {
                    return Err(CoreError::GeoTooShort { code, level: self.level().as_str() });
                }
                Ok(code)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: &str = "060014001001000";

    #[test]
    fn truncation_lengths() {
        assert_eq!(GeoLevel::County.truncate(BLOCK).unwrap(), "06001");
        assert_eq!(GeoLevel::Tract.truncate(BLOCK).unwrap(), "06001400100");
        assert_eq!(GeoLevel::BlockGroup.truncate(BLOCK).unwrap(), "060014001001");
        assert_eq!(GeoLevel::Block.truncate(BLOCK).unwrap(), BLOCK);
        assert_eq!(GeoLevel::State.truncate(BLOCK).unwrap(), "06");
        assert!(GeoLevel::Block.truncate("06001400100").is_err());
    }

    #[test]
    fn ladder_must_coarsen() {
        assert_eq!(GeoLadder::new(vec![]), Err(CoreError::EmptyLadder));
        assert_eq!(
            GeoLadder::new(vec![GeoLevel::Tract, GeoLevel::Block]),
            Err(CoreError::LadderNotCoarsening)
        );
        assert_eq!(
            GeoLadder::new(vec![GeoLevel::Tract, GeoLevel::Tract]),
            Err(CoreError::LadderNotCoarsening)
        );
        assert!(GeoLadder::new(vec![GeoLevel::Block, GeoLevel::County]).is_ok());
    }

    #[test]
    fn span_from_start_to_stop() {
        let l = GeoLadder::census();
        assert_eq!(l.span(GeoLevel::BlockGroup, None).unwrap(), &[GeoLevel::BlockGroup, GeoLevel::Tract, GeoLevel::County]);
        assert_eq!(l.span(GeoLevel::Block, Some(GeoLevel::Block)).unwrap(), &[GeoLevel::Block]);
        assert!(l.span(GeoLevel::State, None).is_err());
        assert!(l.span(GeoLevel::Tract, Some(GeoLevel::Block)).is_err());
    }

    #[test]
    fn concat_rule_builds_block_ids() {
        let t = Table::from_columns([
            ("state", vec![Value::text("06")]),
            ("county", vec![Value::text("001")]),
            ("tract", vec![Value::text("400100")]),
            ("block", vec![Value::text("1000")]),
        ])
        .unwrap();
        let rule = GeoRule::Concat {
            columns: vec!["state".into(), "county".into(), "tract".into(), "block".into()],
            level: GeoLevel::Block,
        };
        assert_eq!(rule.codes(&t).unwrap(), vec![BLOCK.to_string()]);
    }

    #[test]
    fn missing_or_short_codes_fail() {
        let t = Table::from_columns([("geo", vec![Value::text("0600"), Value::Null])]).unwrap();
        let rule = GeoRule::Column { column: "geo".into(), level: GeoLevel::County };
        assert!(matches!(rule.codes(&t), Err(CoreError::GeoTooShort { .. })));
        let t = Table::from_columns([("geo", vec![Value::Null])]).unwrap();
        assert_eq!(rule.codes(&t), Err(CoreError::GeoMissing { row: 0 }));
    }

    #[test]
    fn level_names_round_trip() {
        for l in GeoLevel::ALL {
            assert_eq!(l.as_str().parse::<GeoLevel>().unwrap(), l);
        }
        assert!("zip".parse::<GeoLevel>().is_err());
    }
}
