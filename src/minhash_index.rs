/*================================================================================
=                            MINHASH LSH INDEX                                   =
Signature-level index. Each signature is cut into bands; every band position
owns one bucket shard keyed by the band's lanes. A query unions the ids found
under its own band keys, then scores each candidate by the fraction of agreeing
lanes over the whole signature and keeps those at or above the threshold.

Results are ordered by similarity (descending), ties by ascending id.

Re-inserting an id replaces its signature: the old bucket memberships are
dropped before the new ones are added.
================================================================================*/
use std::any::type_name;
use std::fmt;
use std::hash::Hash;
use std::ops::Range;
use std::time::Instant;

use fxhash::{FxHashMap, FxHashSet};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::banding::band_ranges;
use crate::bucket::{BucketBackend, BucketStore};
use crate::doc_table::DocumentTable;
use crate::error::{LshError, Result};
use crate::minhash::{compute_minhash_similarity, similarity_at_least, MinHashLane};

pub struct MinHashIndex<T, Id = i64>
where
    T: MinHashLane,
    Id: Hash + Eq + Clone + Ord + Send + Sync,
{
    bands: Vec<Range<usize>>,
    band_size: usize,
    buckets: BucketStore<Vec<T>, Id>,
    documents: DocumentTable<Id, Vec<T>>,
    threshold: f64,
}

impl<T, Id> fmt::Display for MinHashIndex<T, Id>
where
    T: MinHashLane,
    Id: Hash + Eq + Clone + Ord + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MinHashIndex<{}> {{ threshold = {}, num_hashes = {}, bands = {}, rows_per_band = {}, backend = {}, size = {} }}",
            type_name::<T>(),
            self.threshold,
            self.num_hashes(),
            self.num_bands(),
            self.band_size,
            self.buckets.backend(),
            self.size()
        )
    }
}

impl<T, Id> MinHashIndex<T, Id>
where
    T: MinHashLane,
    Id: Hash + Eq + Clone + Ord + Send + Sync,
{
    pub fn new(num_bands: usize, band_size: usize, jaccard_threshold: f64) -> Result<Self> {
        Self::new_with_backend(num_bands, band_size, jaccard_threshold, BucketBackend::HashSet)
    }

    pub fn new_with_backend(
        num_bands: usize,
        band_size: usize,
        jaccard_threshold: f64,
        backend: BucketBackend,
    ) -> Result<Self> {
        if num_bands == 0 || band_size == 0 {
            return Err(LshError::InvalidBands(format!(
                "num_bands={} band_size={}",
                num_bands, band_size
            )));
        }
        if !(0.0..=1.0).contains(&jaccard_threshold) {
            return Err(LshError::InvalidThreshold(jaccard_threshold));
        }
        debug!(
            num_bands,
            band_size,
            jaccard_threshold,
            %backend,
            lane = type_name::<T>(),
            "creating minhash index"
        );
        Ok(Self {
            bands: band_ranges(num_bands, band_size),
            band_size,
            buckets: BucketStore::new(num_bands, backend),
            documents: DocumentTable::new(),
            threshold: jaccard_threshold,
        })
    }

    pub fn num_bands(&self) -> usize {
        self.bands.len()
    }

    pub fn band_size(&self) -> usize {
        self.band_size
    }

    pub fn num_hashes(&self) -> usize {
        self.bands.len() * self.band_size
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn backend(&self) -> BucketBackend {
        self.buckets.backend()
    }

    fn check_signature(&self, signature: &[T]) -> Result<()> {
        if signature.len() != self.num_hashes() {
            return Err(LshError::SignatureLength {
                expected: self.num_hashes(),
                got: signature.len(),
            });
        }
        Ok(())
    }

    fn link(&mut self, id: &Id, signature: &[T]) {
        for (position, range) in self.bands.iter().enumerate() {
            self.buckets
                .insert(position, &signature[range.clone()], id.clone());
        }
    }

    fn unlink(&mut self, id: &Id, signature: &[T]) {
        for (position, range) in self.bands.iter().enumerate() {
            self.buckets.remove(position, &signature[range.clone()], id);
        }
    }

    /*======================================================
    =                    INSERT / REMOVE                   =
    ======================================================*/

    pub fn insert(&mut self, id: Id, signature: Vec<T>) -> Result<()> {
        self.check_signature(&signature)?;
        if let Some(old) = self.documents.delete(&id) {
            self.unlink(&id, &old);
        }
        self.link(&id, &signature);
        self.documents.put(id, signature);
        Ok(())
    }

    /// Inserts a batch, spreading the band positions over the current rayon
    /// pool. Either every entry is inserted or, if any signature has the wrong
    /// length, none is. The last occurrence of a repeated id wins.
    pub fn par_bulk_insert(&mut self, entries: Vec<(Id, Vec<T>)>) -> Result<()> {
        if let Some((_, bad)) = entries.iter().find(|(_, sig)| sig.len() != self.num_hashes()) {
            return Err(LshError::SignatureLength {
                expected: self.num_hashes(),
                got: bad.len(),
            });
        }
        let start = Instant::now();
        let entries = last_occurrence_wins(entries);

        let replaced: Vec<(Id, Vec<T>)> = entries
            .iter()
            .filter_map(|(id, _)| self.documents.delete(id).map(|old| (id.clone(), old)))
            .collect();

        let bands = &self.bands;
        self.buckets
            .shards_mut()
            .par_iter_mut()
            .zip(bands.par_iter())
            .for_each(|(shard, range)| {
                for (id, old) in replaced.iter() {
                    shard.remove(&old[range.clone()], id);
                }
                for (id, signature) in entries.iter() {
                    shard.insert(&signature[range.clone()], id.clone());
                }
            });

        let inserted = entries.len();
        self.documents.par_put_all(entries);
        debug!(
            inserted,
            replaced = replaced.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "minhash bulk insert"
        );
        Ok(())
    }

    /// Returns true if `id` was in the index.
    pub fn remove(&mut self, id: &Id) -> bool {
        match self.documents.delete(id) {
            Some(signature) => {
                self.unlink(id, &signature);
                true
            }
            None => false,
        }
    }

    /// Number of ids that were actually removed.
    pub fn bulk_remove(&mut self, ids: &[Id]) -> usize {
        ids.iter().filter(|id| self.remove(id)).count()
    }

    /*======================================================
    =                        QUERY                         =
    ======================================================*/

    fn candidates(&self, signature: &[T]) -> FxHashSet<Id> {
        let mut out = FxHashSet::default();
        for (shard, range) in self.buckets.shards().iter().zip(self.bands.iter()) {
            shard.extend_candidates(&signature[range.clone()], &mut out);
        }
        out
    }

    fn score_candidates(&self, signature: &[T], threshold: Option<f64>) -> Vec<(Id, f64)> {
        if let Err(e) = self.check_signature(signature) {
            warn!("{}", e);
            return Vec::new();
        }
        let mut scored: Vec<(Id, f64)> = self
            .candidates(signature)
            .into_iter()
            .filter_map(|id| {
                let stored = self.documents.get(&id)?;
                let similarity = match threshold {
                    Some(t) => similarity_at_least(stored.value(), signature, t)?,
                    None => compute_minhash_similarity(stored.value(), signature),
                };
                Some((id, similarity))
            })
            .collect();
        sort_by_similarity(&mut scored);
        scored
    }

    pub fn query(&self, signature: &[T]) -> Vec<Id> {
        self.query_return_similarity(signature)
            .into_iter()
            .map(|(id, _)| id)
            .collect()
    }

    pub fn query_return_similarity(&self, signature: &[T]) -> Vec<(Id, f64)> {
        self.score_candidates(signature, Some(self.threshold))
    }

    /// Most similar id at or above the threshold.
    pub fn query_one(&self, signature: &[T]) -> Option<(Id, f64)> {
        self.query_return_similarity(signature).into_iter().next()
    }

    /// The `k` most similar candidates, threshold not applied.
    pub fn query_top_k(&self, signature: &[T], k: usize) -> Vec<(Id, f64)> {
        let mut scored = self.score_candidates(signature, None);
        scored.truncate(k);
        scored
    }

    /// Neighbours of an indexed document, itself included.
    pub fn query_by_id(&self, id: &Id) -> Vec<Id> {
        match self.get_signature(id) {
            Some(signature) => self.query(&signature),
            None => Vec::new(),
        }
    }

    /// Slot `i` of the output answers `signatures[i]`.
    pub fn par_bulk_query(&self, signatures: &[Vec<T>]) -> Vec<Vec<Id>> {
        signatures.par_iter().map(|sig| self.query(sig)).collect()
    }

    pub fn par_bulk_query_return_similarity(&self, signatures: &[Vec<T>]) -> Vec<Vec<(Id, f64)>> {
        signatures
            .par_iter()
            .map(|sig| self.query_return_similarity(sig))
            .collect()
    }

    /*======================================================
    =                     BOOKKEEPING                      =
    ======================================================*/

    pub fn get_signature(&self, id: &Id) -> Option<Vec<T>> {
        self.documents.get(id).map(|sig| sig.value().clone())
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.documents.contains(id)
    }

    /// Band-wise mode of the stored signatures of `ids`: every band takes the
    /// key shared by most members (ties go to the smallest key), so the centroid
    /// lands in the same buckets as the largest share of the group. Unknown ids
    /// are skipped; `None` when none are indexed.
    pub fn calculate_centroid(&self, ids: &[Id]) -> Option<Vec<T>> {
        let signatures: Vec<Vec<T>> = ids.iter().filter_map(|id| self.get_signature(id)).collect();
        if signatures.is_empty() {
            return None;
        }
        let mut centroid = Vec::with_capacity(self.num_hashes());
        for range in &self.bands {
            let mut counts: FxHashMap<&[T], usize> = FxHashMap::default();
            for signature in &signatures {
                *counts.entry(&signature[range.clone()]).or_insert(0) += 1;
            }
            let best = counts
                .into_iter()
                .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))?;
            centroid.extend_from_slice(best.0);
        }
        Some(centroid)
    }

    /// Member of `ids` most similar to their centroid, ties by smallest id.
    pub fn representative(&self, ids: &[Id]) -> Option<Id> {
        let centroid = self.calculate_centroid(ids)?;
        ids.iter()
            .filter_map(|id| {
                self.get_signature(id)
                    .map(|sig| (id, compute_minhash_similarity(&centroid, &sig)))
            })
            .max_by(|a, b| a.1.total_cmp(&b.1).then_with(|| b.0.cmp(a.0)))
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

pub(crate) fn sort_by_similarity<Id: Ord>(scored: &mut [(Id, f64)]) {
    scored.sort_unstable_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
}

/// Keeps the last entry of every id, in first-seen order.
pub(crate) fn last_occurrence_wins<Id, S>(entries: Vec<(Id, S)>) -> Vec<(Id, S)>
where
    Id: Hash + Eq + Clone,
{
    let mut slots: FxHashMap<Id, usize> = FxHashMap::default();
    let mut out: Vec<(Id, S)> = Vec::with_capacity(entries.len());
    let total = entries.len();
    for (id, sig) in entries {
        match slots.get(&id) {
            Some(&slot) => out[slot].1 = sig,
            None => {
                slots.insert(id.clone(), out.len());
                out.push((id, sig));
            }
        }
    }
    if out.len() < total {
        warn!(
            duplicates = total - out.len(),
            "bulk insert repeats ids, keeping the last occurrence"
        );
    }
    out
}
