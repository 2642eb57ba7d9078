// crates/sp_core/src/rng.rs
//
// Deterministic, integer-only RNG for donor draws.
// Focus: unbiased range generation, stable seeding, per-bucket derivation.
//
// • The caller's merge seed is the only source of randomness.
// • Each bucket gets its own stream: seed' = SHA-256(seed ‖ context parts)[..8].
//   Derivation is hash-based, so the order in which buckets are visited never
//   changes what any single bucket draws.
// • Integer-only: no floating point. Unbiased ranges via rejection sampling.

use rand_chacha::ChaCha20Rng;
use rand_core::{RngCore, SeedableRng};
use sha2::{Digest, Sha256};

use crate::determinism::HashCanon;

/// Deterministic RNG for donor selection.
///
/// Internally uses ChaCha20 with an explicit 32-byte seed derived from the
/// 64-bit seed (little-endian bytes in the first 8 positions; the rest 0).
/// This avoids endianness ambiguity and keeps mapping stable across platforms.
#[derive(Debug, Clone)]
pub struct DrawRng {
    rng: ChaCha20Rng,
}

impl DrawRng {
    /// Construct from a 64-bit seed: `seed.to_le_bytes()` into the first
    /// 8 bytes of the ChaCha20 seed; the remaining 24 bytes are zero.
    #[inline]
    pub fn from_seed_u64(seed: u64) -> Self {
        let mut seed32 = [0u8; 32];
        seed32[..8].copy_from_slice(&seed.to_le_bytes());
        Self { rng: ChaCha20Rng::from_seed(seed32) }
    }

    /// Stream for one bucket: the merge seed plus every identifying part.
    pub fn for_context(seed: u64, parts: &[&dyn HashCanon]) -> Self {
        Self::from_seed_u64(derive_seed(seed, parts))
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    /// Unbiased integer in [0, n) using rejection sampling with the standard
    /// "threshold" trick. Returns `None` if `n == 0`.
    ///
    /// `threshold = 2^64 mod n` (computed via `wrapping_neg() % n`);
    /// accept `x` if `x >= threshold`, then `x % n` is uniform.
    #[inline]
    pub fn gen_range(&mut self, n: u64) -> Option<u64> {
        if n == 0 {
            return None;
        }
        let threshold = n.wrapping_neg() % n;
        loop {
            let x = self.next_u64();
            if x >= threshold {
                return Some(x % n);
            }
        }
    }

    /// Deterministic in-place Fisher–Yates shuffle.
    ///
    /// for i in (1..len).rev() { j ~ U{0..=i}; swap(i, j) }
    pub fn shuffle_in_place<T>(&mut self, slice: &mut [T]) {
        for i in (1..slice.len()).rev() {
            // gen_range(i+1) is non-empty here
            if let Some(j) = self.gen_range((i as u64) + 1) {
                slice.swap(i, j as usize);
            }
        }
    }
}

/// Derive a sub-seed from `seed` and the canonical bytes of `parts`.
pub fn derive_seed(seed: u64, parts: &[&dyn HashCanon]) -> u64 {
    let mut h = Sha256::new();
    h.update(seed.to_le_bytes());
    for p in parts {
        h.update(p.canonical_bytes());
    }
    let digest = h.finalize();
    let mut first = [0u8; 8];
    first.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(first)
}

/// `n` uniform 64-bit draws fully determined by `seed`; used to rank a
/// candidate list (sort candidates by their draw).
pub fn draw_uniform(seed: u64, n: usize) -> Vec<u64> {
    let mut rng = DrawRng::from_seed_u64(seed);
    (0..n).map(|_| rng.next_u64()).collect()
}

// ------------------------------
// Tests (determinism & basics)
// ------------------------------
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gen_range_zero_none() {
        let mut rng = DrawRng::from_seed_u64(0xDEADBEEFCAFEBABE);
        assert_eq!(rng.gen_range(0), None);
    }

    #[test]
    fn gen_range_is_deterministic_and_bounded() {
        let mut a = DrawRng::from_seed_u64(123456789);
        let mut b = DrawRng::from_seed_u64(123456789);
        for _ in 0..64 {
            let x = a.gen_range(10).unwrap();
            assert_eq!(Some(x), b.gen_range(10));
            assert!(x < 10);
        }
    }

    #[test]
    fn shuffle_is_deterministic_permutation() {
        let mut a = DrawRng::from_seed_u64(42);
        let mut b = DrawRng::from_seed_u64(42);
        let mut xs = (0..16).collect::<Vec<_>>();
        let mut ys = (0..16).collect::<Vec<_>>();
        a.shuffle_in_place(&mut xs);
        b.shuffle_in_place(&mut ys);
        assert_eq!(xs, ys);
        let mut sorted = xs.clone();
        sorted.sort();
        assert_eq!(sorted, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn draw_uniform_repeats_for_same_seed() {
        assert_eq!(draw_uniform(7, 5), draw_uniform(7, 5));
        assert_ne!(draw_uniform(7, 5), draw_uniform(8, 5));
        assert!(draw_uniform(7, 0).is_empty());
    }

    #[test]
    fn derived_seeds_depend_on_every_part() {
        let a = derive_seed(42, &[&"round1", &"block"]);
        assert_eq!(a, derive_seed(42, &[&"round1", &"block"]));
        assert_ne!(a, derive_seed(42, &[&"round1", &"tract"]));
        assert_ne!(a, derive_seed(99, &[&"round1", &"block"]));
        assert_ne!(derive_seed(1, &[&"ab", &"c"]), derive_seed(1, &[&"a", &"bc"]));
    }
}
