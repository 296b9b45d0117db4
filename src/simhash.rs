/*================================================================================
=                            SIMHASH FINGERPRINTS                                =
Charikar-style fingerprints: each token contributes +1 to every bit position
where its hash has a 1 and -1 where it has a 0. Repeated tokens contribute once
per occurrence, so the fingerprint is frequency weighted. A bit is set when its
counter ends strictly positive (ties give 0).
================================================================================*/
use std::fmt::{Binary, Debug, Display};
use std::hash::Hash;
use std::ops::{BitAnd, BitOr, BitXor, Not, Shl, Shr};

use crate::minhash::{mix64, token_hash};

/// Fingerprint storage type (64 or 128 bits).
pub trait SimHashBits:
    Copy
    + Eq
    + Ord
    + Hash
    + Debug
    + Display
    + Binary
    + Send
    + Sync
    + 'static
    + Not<Output = Self>
    + BitAnd<Output = Self>
    + BitOr<Output = Self>
    + BitXor<Output = Self>
    + Shl<usize, Output = Self>
    + Shr<usize, Output = Self>
{
    const BITS: usize;
    const ZERO: Self;
    const ONE: Self;

    /// Builds a full-width token hash from a 64-bit base hash and the hasher's keys.
    fn from_token_hash(base: u64, keys: (u64, u64)) -> Self;

    fn count_ones(self) -> u32;

    #[inline]
    fn hamming_distance(self, other: Self) -> u32 {
        (self ^ other).count_ones()
    }

    #[inline]
    fn bit(self, index: usize) -> bool {
        (self >> index) & Self::ONE == Self::ONE
    }
}

impl SimHashBits for u64 {
    const BITS: usize = 64;
    const ZERO: Self = 0;
    const ONE: Self = 1;

    #[inline]
    fn from_token_hash(base: u64, keys: (u64, u64)) -> Self {
        mix64(base ^ keys.0)
    }

    #[inline]
    fn count_ones(self) -> u32 {
        u64::count_ones(self)
    }
}

impl SimHashBits for u128 {
    const BITS: usize = 128;
    const ZERO: Self = 0;
    const ONE: Self = 1;

    #[inline]
    fn from_token_hash(base: u64, keys: (u64, u64)) -> Self {
        let high = mix64(base ^ keys.0) as u128;
        let low = mix64(base ^ keys.1) as u128;
        (high << 64) | low
    }

    #[inline]
    fn count_ones(self) -> u32 {
        u128::count_ones(self)
    }
}

/// Computes SimHash fingerprints of type `S`.
#[derive(Debug, Clone)]
pub struct SimHasher<S: SimHashBits> {
    keys: (u64, u64),
    marker: std::marker::PhantomData<S>,
}

impl<S: SimHashBits> SimHasher<S> {
    pub fn new(key1: u64, key2: u64) -> Self {
        Self {
            keys: (key1, key2),
            marker: std::marker::PhantomData,
        }
    }

    /// Keys derived from a single seed.
    pub fn from_seed(seed: u64) -> Self {
        Self::new(mix64(seed), mix64(seed.wrapping_add(0x517cc1b727220a95)))
    }

    pub fn create_signature<I, U>(&self, tokens: I) -> S
    where
        I: IntoIterator<Item = U>,
        U: Hash,
    {
        let mut counts = vec![0i64; S::BITS];
        for token in tokens {
            let hash = S::from_token_hash(token_hash(&token), self.keys);
            for (i, count) in counts.iter_mut().enumerate() {
                if hash.bit(i) {
                    *count += 1;
                } else {
                    *count -= 1;
                }
            }
        }

        counts
            .iter()
            .enumerate()
            .filter(|(_, &count)| count > 0)
            .fold(S::ZERO, |acc, (i, _)| acc | (S::ONE << i))
    }
}

/// Bitwise majority of a set of fingerprints; a bit is set when more than half
/// of them have it.
pub fn simhash_centroid<S, I>(fingerprints: I) -> S
where
    S: SimHashBits,
    I: IntoIterator<Item = S>,
{
    let mut counts = vec![0usize; S::BITS];
    let mut len = 0;
    for fingerprint in fingerprints {
        for (i, count) in counts.iter_mut().enumerate() {
            if fingerprint.bit(i) {
                *count += 1;
            }
        }
        len += 1;
    }
    counts
        .iter()
        .enumerate()
        .filter(|(_, &count)| count > len / 2)
        .fold(S::ZERO, |acc, (i, _)| acc | (S::ONE << i))
}
