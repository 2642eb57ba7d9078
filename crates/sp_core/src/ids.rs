//! crates/sp_core/src/ids.rs
//! Record keys and round names. Deterministic, strict shapes; no I/O.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

const KEY_MAX_LEN: usize = 256;
const TOKEN_MAX_LEN: usize = 64;

/// Record keys: 1..=256 bytes, no control characters (NUL included).
#[inline]
pub fn is_valid_key(s: &str) -> bool {
    !s.is_empty() && s.len() <= KEY_MAX_LEN && !s.chars().any(char::is_control)
}

/// Round token: ^[A-Za-z0-9_.:-]{1,64}$ (ASCII only)
#[inline]
pub fn is_valid_token(s: &str) -> bool {
    let len = s.len();
    if len == 0 || len > TOKEN_MAX_LEN {
        return false;
    }
    s.bytes().all(|b| {
        b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b':' || b == b'-'
    })
}

macro_rules! simple_string_newtype {
    ($(#[$m:meta])* $name:ident) => {
        $(#[$m])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
        pub struct $name(String);

        impl $name {
            #[inline] pub fn as_str(&self) -> &str { &self.0 }
        }

        impl fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
        }

        impl AsRef<str> for $name {
            #[inline]
            fn as_ref(&self) -> &str { &self.0 }
        }

        impl TryFrom<&str> for $name {
            type Error = CoreError;
            #[inline]
            fn try_from(value: &str) -> Result<Self, Self::Error> { value.parse() }
        }

        impl TryFrom<String> for $name {
            type Error = CoreError;
            #[inline]
            fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
        }

        impl From<$name> for String {
            #[inline]
            fn from(v: $name) -> String { v.0 }
        }
    }
}

simple_string_newtype!(
    /// Primary key of one record in a collection (string or rendered composite).
    RecordKey
);
simple_string_newtype!(
    /// Name of a match round; echoed into the provenance column.
    RoundName
);

impl FromStr for RecordKey {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if is_valid_key(s) { Ok(RecordKey(s.to_owned())) } else { Err(CoreError::InvalidKey) }
    }
}

impl FromStr for RoundName {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if is_valid_token(s) { Ok(RoundName(s.to_owned())) } else { Err(CoreError::InvalidToken) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_reject_empty_and_control() {
        assert!("".parse::<RecordKey>().is_err());
        assert!("a\u{0}b".parse::<RecordKey>().is_err());
        assert!("a\nb".parse::<RecordKey>().is_err());
        assert_eq!("060014001001000-7".parse::<RecordKey>().unwrap().as_str(), "060014001001000-7");
    }

    #[test]
    fn round_names_are_tokens() {
        assert!("exact_block".parse::<RoundName>().is_ok());
        assert!("r1:age.sex".parse::<RoundName>().is_ok());
        assert!("with space".parse::<RoundName>().is_err());
        assert!("x".repeat(65).parse::<RoundName>().is_err());
    }
}
