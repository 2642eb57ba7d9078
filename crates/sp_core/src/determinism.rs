//! Determinism utilities: stable ordering & canonical bytes.
//!
//! This module is **I/O-free**. It provides:
//! - Stable total orders for record keys
//! - Canonical in-place sort helpers over row indices
//! - A trait for “canonical bytes” feeding seed derivation and digests

use core::cmp::Ordering;

use crate::ids::RecordKey;

/* -------------------------------------------------------------------------- */
/*                               Stable Ordering                              */
/* -------------------------------------------------------------------------- */

/// Provide a **total**, stable order for values that must sort canonically.
pub trait StableOrd {
    fn stable_cmp(&self, other: &Self) -> Ordering;
}

impl StableOrd for RecordKey {
    #[inline]
    fn stable_cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

/* -------------------------------------------------------------------------- */
/*                            Canonical sort helpers                           */
/* -------------------------------------------------------------------------- */

/// Sort row indices **in place** by ascending record key.
#[inline]
pub fn sort_rows_by_key(rows: &mut [usize], keys: &[RecordKey]) {
    rows.sort_by(|&a, &b| keys[a].stable_cmp(&keys[b]));
}

/* -------------------------------------------------------------------------- */
/*                         Canonical bytes (interface)                         */
/* -------------------------------------------------------------------------- */

/// Types that can emit **canonical bytes** suitable for hashing.
pub trait HashCanon {
    fn canonical_bytes(&self) -> Vec<u8>;
}

impl HashCanon for str {
    fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.len());
        out.extend_from_slice(&(self.len() as u64).to_le_bytes());
        out.extend_from_slice(self.as_bytes());
        out
    }
}

impl HashCanon for String {
    fn canonical_bytes(&self) -> Vec<u8> {
        self.as_str().canonical_bytes()
    }
}

impl<T: HashCanon + ?Sized> HashCanon for &T {
    fn canonical_bytes(&self) -> Vec<u8> {
        (**self).canonical_bytes()
    }
}

impl<T: HashCanon> HashCanon for [T] {
    fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = (self.len() as u64).to_le_bytes().to_vec();
        for item in self {
            out.extend(item.canonical_bytes());
        }
        out
    }
}

/* ---------------------------------- Tests --------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> RecordKey {
        s.parse().unwrap()
    }

    #[test]
    fn rows_sort_by_key_lex() {
        let keys = vec![key("p10"), key("p2"), key("a1")];
        let mut rows = vec![0, 1, 2];
        sort_rows_by_key(&mut rows, &keys);
        assert_eq!(rows, vec![2, 0, 1]);
    }

    #[test]
    fn str_bytes_are_length_prefixed() {
        // "ab" + "c" must not collide with "a" + "bc"
        let a = ["ab".canonical_bytes(), "c".canonical_bytes()].concat();
        let b = ["a".canonical_bytes(), "bc".canonical_bytes()].concat();
        assert_ne!(a, b);
    }
}
