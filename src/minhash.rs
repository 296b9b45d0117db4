/*================================================================================
=                            MINHASH SIGNATURES                                  =
Every hash function is the token's base hash xor'd with a per-function seed and
pushed through a 64-bit finalizer. The minimum is taken over the full 64-bit
mixes and only the winning value is narrowed to the lane width, keeping its low
bits. Narrowing first would drive short lanes to 0 on long documents.

Seeds come from a seeded StdRng owned by the hasher, so two hashers built with
the same (num_hashes, seed) produce comparable signatures and nothing is global.
================================================================================*/
use std::collections::HashSet;
use std::fmt::{Debug, Display};
use std::hash::Hash;

use fxhash::FxHashSet;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// An unsigned integer type that can hold one MinHash value.
pub trait MinHashLane:
    Copy + Eq + Ord + Hash + Debug + Display + Send + Sync + 'static
{
    const MAX: Self;
    const BITS: u32;

    /// Keeps the low `BITS` bits of a 64-bit minimum. `u64::MAX` maps to `MAX`.
    fn from_hash(hash: u64) -> Self;
}

macro_rules! impl_minhash_lane {
    ($t:ty) => {
        impl MinHashLane for $t {
            const MAX: Self = <$t>::MAX;
            const BITS: u32 = <$t>::BITS;

            #[inline]
            fn from_hash(hash: u64) -> Self {
                hash as $t
            }
        }
    };
}

impl_minhash_lane!(u8);
impl_minhash_lane!(u16);
impl_minhash_lane!(u32);
impl_minhash_lane!(u64);

#[inline]
pub(crate) fn mix64(hash: u64) -> u64 {
    let mut hash = hash.wrapping_mul(0x9e3779b97f4a7c15);
    hash ^= hash >> 33;
    hash = hash.wrapping_mul(0xff51afd7ed558ccd);
    hash ^= hash >> 33;
    hash = hash.wrapping_mul(0xc4ceb9fe1a85ec53);
    hash ^= hash >> 33;
    hash
}

/// Base hash of a single token. Equal tokens hash equally regardless of
/// whether they arrive as `String`, `&str` or `&String`.
#[inline]
pub(crate) fn token_hash<U: Hash + ?Sized>(token: &U) -> u64 {
    fxhash::hash64(token)
}

/// Computes fixed-length MinHash signatures with lanes of type `T`.
#[derive(Debug, Clone)]
pub struct MinHasher<T: MinHashLane> {
    seeds: Vec<u64>,
    marker: std::marker::PhantomData<T>,
}

impl<T: MinHashLane> MinHasher<T> {
    pub fn new(num_hashes: usize) -> Self {
        Self::new_with_seed(num_hashes, 3)
    }

    pub fn new_with_seed(num_hashes: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let seeds = (0..num_hashes).map(|_| rng.random::<u64>()).collect();
        Self {
            seeds,
            marker: std::marker::PhantomData,
        }
    }

    pub fn num_hashes(&self) -> usize {
        self.seeds.len()
    }

    /// Signature of the token *set* produced by `tokens`. Order and repetition
    /// are irrelevant. An empty set yields all-`MAX` lanes.
    pub fn create_signature<I, U>(&self, tokens: I) -> Vec<T>
    where
        I: IntoIterator<Item = U>,
        U: Hash,
    {
        let base_hashes: FxHashSet<u64> = tokens.into_iter().map(|t| token_hash(&t)).collect();
        self.signature_from_hashes(base_hashes.iter().copied())
    }

    fn signature_from_hashes(&self, base_hashes: impl Iterator<Item = u64>) -> Vec<T> {
        let mut mins = vec![u64::MAX; self.seeds.len()];
        for base_hash in base_hashes {
            for (min, &seed) in mins.iter_mut().zip(self.seeds.iter()) {
                let value = mix64(base_hash ^ seed);
                if value < *min {
                    *min = value;
                }
            }
        }
        mins.into_iter().map(T::from_hash).collect()
    }

    /// Estimated Jaccard similarity of two token sets.
    pub fn compute_similarity<I, U>(&self, a: I, b: I) -> f64
    where
        I: IntoIterator<Item = U>,
        U: Hash,
    {
        compute_minhash_similarity(&self.create_signature(a), &self.create_signature(b))
    }
}

/*================================================================================
=                            SIMILARITY HELPERS                                  =
================================================================================*/

/// Fraction of positions where the two signatures agree.
pub fn compute_minhash_similarity<T: Eq>(sig1: &[T], sig2: &[T]) -> f64 {
    debug_assert_eq!(sig1.len(), sig2.len());
    if sig1.is_empty() {
        return 0.0;
    }
    let matches = sig1.iter().zip(sig2.iter()).filter(|(a, b)| a == b).count();
    matches as f64 / sig1.len() as f64
}

pub fn compute_minhash_distance<T: Eq>(sig1: &[T], sig2: &[T]) -> f64 {
    1.0 - compute_minhash_similarity(sig1, sig2)
}

/// Like [`compute_minhash_similarity`] but gives up as soon as the threshold
/// can no longer be reached.
pub fn similarity_at_least<T: Eq>(sig1: &[T], sig2: &[T], threshold: f64) -> Option<f64> {
    debug_assert_eq!(sig1.len(), sig2.len());
    let total = sig1.len();
    if total == 0 {
        return None;
    }
    let mut mismatches = 0;
    for (a, b) in sig1.iter().zip(sig2.iter()) {
        if a != b {
            mismatches += 1;
            if ((total - mismatches) as f64 / total as f64) < threshold {
                return None; // Early termination
            }
        }
    }
    let similarity = (total - mismatches) as f64 / total as f64;
    if similarity >= threshold {
        Some(similarity)
    } else {
        None
    }
}

/// Exact Jaccard similarity of two token sets.
pub fn compute_jaccard_similarity<I, U>(a: I, b: I) -> f64
where
    I: IntoIterator<Item = U>,
    U: Hash + Eq,
{
    let a: HashSet<U> = a.into_iter().collect();
    let b: HashSet<U> = b.into_iter().collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 1.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}
