/*================================================================================
=                            SIMHASH BLOCK INDEX                                 =
Fingerprints are cut into `num_blocks` contiguous bit blocks, each with its own
bucket shard keyed by the masked block value. With num_blocks > max distance,
any two fingerprints within the distance agree on at least one whole block, so
the union of single-block matches contains every true neighbour. Candidates
are then filtered by exact Hamming distance.

Results are ordered by distance (ascending), ties by ascending id.
================================================================================*/
use std::any::type_name;
use std::fmt;
use std::hash::Hash;
use std::time::Instant;

use fxhash::FxHashSet;
use rayon::prelude::*;
use tracing::debug;

use crate::banding::BlockPartition;
use crate::bucket::{BucketBackend, BucketStore};
use crate::config::validate_blocks;
use crate::doc_table::DocumentTable;
use crate::error::Result;
use crate::minhash_index::last_occurrence_wins;
use crate::simhash::{simhash_centroid, SimHashBits};

pub struct SimHashIndex<S, Id = i64>
where
    S: SimHashBits,
    Id: Hash + Eq + Clone + Ord + Send + Sync,
{
    partition: BlockPartition<S>,
    buckets: BucketStore<S, Id>,
    documents: DocumentTable<Id, S>,
    max_distance: usize,
}

impl<S, Id> fmt::Display for SimHashIndex<S, Id>
where
    S: SimHashBits,
    Id: Hash + Eq + Clone + Ord + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SimHashIndex<{}> {{ num_blocks = {}, hamming_distance = {}, backend = {}, size = {} }}",
            type_name::<S>(),
            self.num_blocks(),
            self.max_distance,
            self.buckets.backend(),
            self.size()
        )
    }
}

impl<S, Id> SimHashIndex<S, Id>
where
    S: SimHashBits,
    Id: Hash + Eq + Clone + Ord + Send + Sync,
{
    pub fn new(num_blocks: usize, hamming_distance: usize) -> Result<Self> {
        Self::new_with_backend(num_blocks, hamming_distance, BucketBackend::Vec)
    }

    pub fn new_with_backend(
        num_blocks: usize,
        hamming_distance: usize,
        backend: BucketBackend,
    ) -> Result<Self> {
        validate_blocks(num_blocks, hamming_distance, S::BITS)?;
        debug!(
            num_blocks,
            hamming_distance,
            %backend,
            bits = S::BITS,
            "creating simhash index"
        );
        Ok(Self {
            partition: BlockPartition::new(num_blocks),
            buckets: BucketStore::new(num_blocks, backend),
            documents: DocumentTable::new(),
            max_distance: hamming_distance,
        })
    }

    pub fn num_blocks(&self) -> usize {
        self.partition.num_blocks()
    }

    pub fn hamming_distance(&self) -> usize {
        self.max_distance
    }

    pub fn backend(&self) -> BucketBackend {
        self.buckets.backend()
    }

    fn link(&mut self, id: &Id, fingerprint: S) {
        for block in 0..self.partition.num_blocks() {
            let key = self.partition.block_key(fingerprint, block);
            self.buckets.insert(block, &key, id.clone());
        }
    }

    fn unlink(&mut self, id: &Id, fingerprint: S) {
        for block in 0..self.partition.num_blocks() {
            let key = self.partition.block_key(fingerprint, block);
            self.buckets.remove(block, &key, id);
        }
    }

    /*======================================================
    =                    INSERT / REMOVE                   =
    ======================================================*/

    /// Re-inserting an id replaces its fingerprint.
    pub fn insert(&mut self, id: Id, fingerprint: S) {
        if let Some(old) = self.documents.delete(&id) {
            self.unlink(&id, old);
        }
        self.link(&id, fingerprint);
        self.documents.put(id, fingerprint);
    }

    /// Inserts a batch using the current rayon pool, one block shard per task.
    /// The last occurrence of a repeated id wins.
    pub fn par_bulk_insert(&mut self, entries: Vec<(Id, S)>) {
        let start = Instant::now();
        let entries = last_occurrence_wins(entries);

        let replaced: Vec<(Id, S)> = entries
            .iter()
            .filter_map(|(id, _)| self.documents.delete(id).map(|old| (id.clone(), old)))
            .collect();

        let partition = &self.partition;
        self.buckets
            .shards_mut()
            .par_iter_mut()
            .enumerate()
            .for_each(|(block, shard)| {
                for (id, old) in replaced.iter() {
                    shard.remove(&partition.block_key(*old, block), id);
                }
                for (id, fingerprint) in entries.iter() {
                    shard.insert(&partition.block_key(*fingerprint, block), id.clone());
                }
            });

        let inserted = entries.len();
        self.documents.par_put_all(entries);
        debug!(
            inserted,
            replaced = replaced.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "simhash bulk insert"
        );
    }

    pub fn remove(&mut self, id: &Id) -> bool {
        match self.documents.delete(id) {
            Some(fingerprint) => {
                self.unlink(id, fingerprint);
                true
            }
            None => false,
        }
    }

    pub fn bulk_remove(&mut self, ids: &[Id]) -> usize {
        ids.iter().filter(|id| self.remove(id)).count()
    }

    /*======================================================
    =                        QUERY                         =
    ======================================================*/

    fn candidates(&self, fingerprint: S) -> FxHashSet<Id> {
        let mut out = FxHashSet::default();
        for (block, shard) in self.buckets.shards().iter().enumerate() {
            shard.extend_candidates(&self.partition.block_key(fingerprint, block), &mut out);
        }
        out
    }

    fn score_candidates(&self, fingerprint: S, max_distance: Option<usize>) -> Vec<(Id, usize)> {
        let mut scored: Vec<(Id, usize)> = self
            .candidates(fingerprint)
            .into_iter()
            .filter_map(|id| {
                let stored = *self.documents.get(&id)?;
                let distance = stored.hamming_distance(fingerprint) as usize;
                match max_distance {
                    Some(d) if distance > d => None,
                    _ => Some((id, distance)),
                }
            })
            .collect();
        scored.sort_unstable_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        scored
    }

    pub fn query(&self, fingerprint: S) -> Vec<Id> {
        self.query_return_distance(fingerprint)
            .into_iter()
            .map(|(id, _)| id)
            .collect()
    }

    pub fn query_return_distance(&self, fingerprint: S) -> Vec<(Id, usize)> {
        self.score_candidates(fingerprint, Some(self.max_distance))
    }

    /// Closest id within the distance.
    pub fn query_one(&self, fingerprint: S) -> Option<(Id, usize)> {
        self.query_return_distance(fingerprint).into_iter().next()
    }

    /// The `k` closest candidates, distance limit not applied.
    pub fn query_top_k(&self, fingerprint: S, k: usize) -> Vec<(Id, usize)> {
        let mut scored = self.score_candidates(fingerprint, None);
        scored.truncate(k);
        scored
    }

    pub fn query_by_id(&self, id: &Id) -> Vec<Id> {
        match self.get_signature(id) {
            Some(fingerprint) => self.query(fingerprint),
            None => Vec::new(),
        }
    }

    pub fn par_bulk_query(&self, fingerprints: &[S]) -> Vec<Vec<Id>> {
        fingerprints.par_iter().map(|fp| self.query(*fp)).collect()
    }

    pub fn par_bulk_query_return_distance(&self, fingerprints: &[S]) -> Vec<Vec<(Id, usize)>> {
        fingerprints
            .par_iter()
            .map(|fp| self.query_return_distance(*fp))
            .collect()
    }

    /*======================================================
    =                     BOOKKEEPING                      =
    ======================================================*/

    pub fn get_signature(&self, id: &Id) -> Option<S> {
        self.documents.get(id).map(|fp| *fp)
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.documents.contains(id)
    }

    /// Bitwise majority of the stored fingerprints of `ids`.
    pub fn calculate_centroid(&self, ids: &[Id]) -> Option<S> {
        let fingerprints: Vec<S> = ids.iter().filter_map(|id| self.get_signature(id)).collect();
        if fingerprints.is_empty() {
            return None;
        }
        Some(simhash_centroid(fingerprints))
    }

    /// Member of `ids` closest to their centroid, ties by smallest id.
    pub fn representative(&self, ids: &[Id]) -> Option<Id> {
        let centroid = self.calculate_centroid(ids)?;
        ids.iter()
            .filter_map(|id| {
                self.get_signature(id)
                    .map(|fp| (id, fp.hamming_distance(centroid)))
            })
            .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
            .map(|(id, _)| id.clone())
    }

    pub fn ids(&self) -> Vec<Id> {
        self.documents.ids()
    }

    pub fn size(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.documents.clear();
    }

    pub fn shrink_to_fit(&mut self) {
        self.buckets
            .shards_mut()
            .par_iter_mut()
            .for_each(|shard| shard.shrink_to_fit());
        self.documents.shrink_to_fit();
    }

    pub fn avg_bucket_size(&self) -> Option<f64> {
        self.buckets.avg_bucket_size()
    }
}
