/*================================================================================
=                            BUCKET STORE                                        =
One hash table per band/block position, mapping a key to the ids that produced
it. Buckets only ever hold ids; signatures live in the document table.

The id collection behind each bucket is picked once per index:
  - hashset:  O(1) removal, most memory per bucket
  - vec:      cheapest for insert-heavy work, O(n) removal
  - smallvec: a few ids inline, spills to the heap past that
Buckets that become empty are dropped.
================================================================================*/
use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::str::FromStr;

use fxhash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::error::LshError;

const INLINE_IDS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketBackend {
    HashSet,
    Vec,
    SmallVec,
}

impl FromStr for BucketBackend {
    type Err = LshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hashset" => Ok(BucketBackend::HashSet),
            "vec" => Ok(BucketBackend::Vec),
            "smallvec" => Ok(BucketBackend::SmallVec),
            _ => Err(LshError::UnknownBackend(s.to_string())),
        }
    }
}

impl fmt::Display for BucketBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BucketBackend::HashSet => "hashset",
            BucketBackend::Vec => "vec",
            BucketBackend::SmallVec => "smallvec",
        };
        f.write_str(name)
    }
}

/// The ids stored under one key.
#[derive(Debug, Clone)]
pub enum IdBucket<Id> {
    Set(FxHashSet<Id>),
    List(Vec<Id>),
    Small(SmallVec<[Id; INLINE_IDS]>),
}

impl<Id: Hash + Eq + Clone> IdBucket<Id> {
    pub fn new(backend: BucketBackend) -> Self {
        match backend {
            BucketBackend::HashSet => IdBucket::Set(FxHashSet::default()),
            BucketBackend::Vec => IdBucket::List(Vec::new()),
            BucketBackend::SmallVec => IdBucket::Small(SmallVec::new()),
        }
    }

    /// Callers guarantee an id is pushed at most once per bucket.
    pub fn push(&mut self, id: Id) {
        match self {
            IdBucket::Set(set) => {
                set.insert(id);
            }
            IdBucket::List(vec) => vec.push(id),
            IdBucket::Small(vec) => vec.push(id),
        }
    }

    pub fn remove(&mut self, id: &Id) -> bool {
        match self {
            IdBucket::Set(set) => set.remove(id),
            IdBucket::List(vec) => match vec.iter().position(|x| x == id) {
                Some(index) => {
                    vec.swap_remove(index);
                    true
                }
                None => false,
            },
            IdBucket::Small(vec) => match vec.iter().position(|x| x == id) {
                Some(index) => {
                    vec.swap_remove(index);
                    true
                }
                None => false,
            },
        }
    }

    pub fn contains(&self, id: &Id) -> bool {
        match self {
            IdBucket::Set(set) => set.contains(id),
            IdBucket::List(vec) => vec.contains(id),
            IdBucket::Small(vec) => vec.contains(id),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IdBucket::Set(set) => set.len(),
            IdBucket::List(vec) => vec.len(),
            IdBucket::Small(vec) => vec.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn copy_to<S: BuildHasher>(&self, out: &mut std::collections::HashSet<Id, S>) {
        match self {
            IdBucket::Set(set) => out.extend(set.iter().cloned()),
            IdBucket::List(vec) => out.extend(vec.iter().cloned()),
            IdBucket::Small(vec) => out.extend(vec.iter().cloned()),
        }
    }

    pub fn shrink_to_fit(&mut self) {
        match self {
            IdBucket::Set(set) => set.shrink_to_fit(),
            IdBucket::List(vec) => vec.shrink_to_fit(),
            IdBucket::Small(vec) => vec.shrink_to_fit(),
        }
    }
}

/// The table for one band/block position.
#[derive(Debug, Clone)]
pub struct BucketShard<K, Id> {
    table: FxHashMap<K, IdBucket<Id>>,
    backend: BucketBackend,
}

impl<K, Id> BucketShard<K, Id>
where
    K: Hash + Eq,
    Id: Hash + Eq + Clone,
{
    pub fn new(backend: BucketBackend) -> Self {
        Self {
            table: FxHashMap::default(),
            backend,
        }
    }

    pub fn insert<Q>(&mut self, key: &Q, id: Id)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        match self.table.get_mut(key) {
            Some(bucket) => bucket.push(id),
            None => {
                let mut bucket = IdBucket::new(self.backend);
                bucket.push(id);
                self.table.insert(key.to_owned(), bucket);
            }
        }
    }

    pub fn remove<Q>(&mut self, key: &Q, id: &Id) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let (removed, now_empty) = match self.table.get_mut(key) {
            Some(bucket) => (bucket.remove(id), bucket.is_empty()),
            None => (false, false),
        };
        if now_empty {
            self.table.remove(key);
        }
        removed
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&IdBucket<Id>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.get(key)
    }

    /// Adds every id stored under `key` to `out`.
    pub fn extend_candidates<Q, S>(&self, key: &Q, out: &mut std::collections::HashSet<Id, S>)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        S: BuildHasher,
    {
        if let Some(bucket) = self.table.get(key) {
            bucket.copy_to(out);
        }
    }

    pub fn num_buckets(&self) -> usize {
        self.table.len()
    }

    pub fn num_entries(&self) -> usize {
        self.table.values().map(|b| b.len()).sum()
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }

    pub fn shrink_to_fit(&mut self) {
        for bucket in self.table.values_mut() {
            bucket.shrink_to_fit();
        }
        self.table.shrink_to_fit();
    }
}

/// All positions of an index. Positions are independent, so bulk work can hand
/// each shard to its own worker.
#[derive(Debug, Clone)]
pub struct BucketStore<K, Id> {
    shards: Vec<BucketShard<K, Id>>,
    backend: BucketBackend,
}

impl<K, Id> BucketStore<K, Id>
where
    K: Hash + Eq,
    Id: Hash + Eq + Clone,
{
    pub fn new(num_positions: usize, backend: BucketBackend) -> Self {
        Self {
            shards: (0..num_positions).map(|_| BucketShard::new(backend)).collect(),
            backend,
        }
    }

    pub fn backend(&self) -> BucketBackend {
        self.backend
    }

    pub fn num_positions(&self) -> usize {
        self.shards.len()
    }

    pub fn shard(&self, position: usize) -> &BucketShard<K, Id> {
        &self.shards[position]
    }

    pub fn shards(&self) -> &[BucketShard<K, Id>] {
        &self.shards
    }

    pub fn shards_mut(&mut self) -> &mut [BucketShard<K, Id>] {
        &mut self.shards
    }

    pub fn insert<Q>(&mut self, position: usize, key: &Q, id: Id)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        self.shards[position].insert(key, id)
    }

    pub fn remove<Q>(&mut self, position: usize, key: &Q, id: &Id) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shards[position].remove(key, id)
    }

    pub fn candidates<Q>(&self, position: usize, key: &Q) -> FxHashSet<Id>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut out = FxHashSet::default();
        self.shards[position].extend_candidates(key, &mut out);
        out
    }

    pub fn clear(&mut self) {
        self.shards.iter_mut().for_each(|s| s.clear());
    }

    /// Mean number of ids per non-empty bucket, over all positions.
    pub fn avg_bucket_size(&self) -> Option<f64> {
        let buckets: usize = self.shards.iter().map(|s| s.num_buckets()).sum();
        if buckets == 0 {
            return None;
        }
        let entries: usize = self.shards.iter().map(|s| s.num_entries()).sum();
        Some(entries as f64 / buckets as f64)
    }
}
