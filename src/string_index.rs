/*================================================================================
=                            STRING INDEXES                                      =
Text-facing indexes keyed by i64. They own a tokenizer, a hasher whose lane
width is picked at runtime from `hash_size`, the signature-level index, and a
worker pool for bulk work.

Bulk operations tokenize and sign every document on the pool. If any document
fails to tokenize, the first failure in input order is returned once the whole
batch has been processed, and a failed bulk insert leaves the index untouched.
================================================================================*/
use std::fmt;
use std::hash::Hash;
use std::time::Instant;

use tracing::{debug, info};

use crate::clustering::Neighbors;
use crate::config::{MinHashConfig, SimHashConfig};
use crate::error::{LshError, Result};
use crate::minhash::MinHasher;
use crate::minhash_index::MinHashIndex;
use crate::pool::WorkerPool;
use crate::simhash::SimHasher;
use crate::simhash_index::SimHashIndex;
use crate::tokenize::Tokenizer;

fn check_lengths(ids: usize, docs: usize) -> Result<()> {
    if ids != docs {
        return Err(LshError::LengthMismatch { ids, docs });
    }
    Ok(())
}

/*================================================================================
=                            MINHASH                                             =
================================================================================*/

enum MinHashEngine {
    U8(MinHasher<u8>, MinHashIndex<u8>),
    U16(MinHasher<u16>, MinHashIndex<u16>),
    U32(MinHasher<u32>, MinHashIndex<u32>),
    U64(MinHasher<u64>, MinHashIndex<u64>),
}

macro_rules! minhash_dispatch {
    ($engine:expr, $hasher:ident, $index:ident => $body:expr) => {
        match $engine {
            MinHashEngine::U8($hasher, $index) => $body,
            MinHashEngine::U16($hasher, $index) => $body,
            MinHashEngine::U32($hasher, $index) => $body,
            MinHashEngine::U64($hasher, $index) => $body,
        }
    };
}

pub struct MinHashStringIndex {
    config: MinHashConfig,
    tokenizer: Tokenizer,
    engine: MinHashEngine,
    pool: WorkerPool,
}

impl MinHashStringIndex {
    /// Index using the analyzer named in `config`.
    pub fn new(config: MinHashConfig) -> Result<Self> {
        config.validate()?;
        let tokenizer = config.tokenizer()?;
        Self::build(config, tokenizer)
    }

    /// Index using a caller-supplied tokenizer, e.g. [`Tokenizer::from_fn`].
    pub fn with_tokenizer(config: MinHashConfig, tokenizer: Tokenizer) -> Result<Self> {
        config.validate()?;
        Self::build(config, tokenizer)
    }

    fn build(config: MinHashConfig, tokenizer: Tokenizer) -> Result<Self> {
        let (num_bands, band_size) = config.resolve_bands()?;
        let backend = config.bucket_backend()?;
        let num_hashes = num_bands * band_size;
        let threshold = config.jaccard_threshold;

        macro_rules! engine {
            ($variant:ident) => {
                MinHashEngine::$variant(
                    MinHasher::new_with_seed(num_hashes, config.seed),
                    MinHashIndex::new_with_backend(num_bands, band_size, threshold, backend)?,
                )
            };
        }
        let engine = match config.hash_size {
            8 => engine!(U8),
            16 => engine!(U16),
            32 => engine!(U32),
            _ => engine!(U64),
        };
        let pool = WorkerPool::new(config.num_threads)?;
        info!(
            hash_size = config.hash_size,
            num_bands,
            band_size,
            threshold,
            analyzer = %tokenizer.analyzer(),
            threads = pool.num_threads(),
            "minhash string index ready"
        );
        Ok(Self {
            config,
            tokenizer,
            engine,
            pool,
        })
    }

    pub fn config(&self) -> &MinHashConfig {
        &self.config
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /*======================================================
    =                    SINGLE DOCUMENT                   =
    ======================================================*/

    pub fn insert_document(&mut self, id: i64, doc: &str) -> Result<()> {
        let tokens = self.tokenizer.tokenize(doc)?;
        self.insert_tokens(id, &tokens)
    }

    pub fn insert_tokens<U: Hash>(&mut self, id: i64, tokens: &[U]) -> Result<()> {
        minhash_dispatch!(&mut self.engine, hasher, index => {
            index.insert(id, hasher.create_signature(tokens))
        })
    }

    pub fn query(&self, doc: &str) -> Result<Vec<i64>> {
        let tokens = self.tokenizer.tokenize(doc)?;
        Ok(self.query_tokens(&tokens))
    }

    pub fn query_return_similarity(&self, doc: &str) -> Result<Vec<(i64, f64)>> {
        let tokens = self.tokenizer.tokenize(doc)?;
        Ok(self.query_tokens_return_similarity(&tokens))
    }

    pub fn query_tokens<U: Hash>(&self, tokens: &[U]) -> Vec<i64> {
        minhash_dispatch!(&self.engine, hasher, index => {
            index.query(&hasher.create_signature(tokens))
        })
    }

    pub fn query_tokens_return_similarity<U: Hash>(&self, tokens: &[U]) -> Vec<(i64, f64)> {
        minhash_dispatch!(&self.engine, hasher, index => {
            index.query_return_similarity(&hasher.create_signature(tokens))
        })
    }

    pub fn query_by_id(&self, id: i64) -> Vec<i64> {
        minhash_dispatch!(&self.engine, _hasher, index => index.query_by_id(&id))
    }

    /// Member of `ids` nearest the centroid of their stored signatures.
    pub fn representative(&self, ids: &[i64]) -> Option<i64> {
        minhash_dispatch!(&self.engine, _hasher, index => index.representative(ids))
    }

    pub fn remove(&mut self, id: i64) -> bool {
        minhash_dispatch!(&mut self.engine, _hasher, index => index.remove(&id))
    }

    pub fn contains(&self, id: i64) -> bool {
        minhash_dispatch!(&self.engine, _hasher, index => index.contains(&id))
    }

    pub fn ids(&self) -> Vec<i64> {
        minhash_dispatch!(&self.engine, _hasher, index => index.ids())
    }

    pub fn size(&self) -> usize {
        minhash_dispatch!(&self.engine, _hasher, index => index.size())
    }

    pub fn clear(&mut self) {
        minhash_dispatch!(&mut self.engine, _hasher, index => index.clear())
    }

    pub fn shrink_to_fit(&mut self) {
        let pool = &self.pool;
        minhash_dispatch!(&mut self.engine, _hasher, index => pool.install(|| index.shrink_to_fit()))
    }

    /*======================================================
    =                         BULK                         =
    ======================================================*/

    pub fn bulk_insert<D: AsRef<str> + Sync>(&mut self, ids: &[i64], docs: &[D]) -> Result<()> {
        check_lengths(ids.len(), docs.len())?;
        let start = Instant::now();
        let (tokenizer, pool) = (&self.tokenizer, &self.pool);
        minhash_dispatch!(&mut self.engine, hasher, index => {
            let hasher = &*hasher;
            let signatures = pool.try_map(docs, |i, doc| {
                let tokens = tokenizer.tokenize(doc.as_ref()).map_err(|e| e.at_index(i))?;
                Ok(hasher.create_signature(&tokens))
            })?;
            let entries = ids.iter().copied().zip(signatures).collect();
            pool.install(|| index.par_bulk_insert(entries))?;
        });
        info!(
            docs = docs.len(),
            size = self.size(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "minhash bulk insert"
        );
        Ok(())
    }

    pub fn bulk_insert_tokens<U: Hash + Sync>(&mut self, ids: &[i64], tokens: &[Vec<U>]) -> Result<()> {
        check_lengths(ids.len(), tokens.len())?;
        let pool = &self.pool;
        minhash_dispatch!(&mut self.engine, hasher, index => {
            let hasher = &*hasher;
            let signatures = pool.map(tokens, |t| hasher.create_signature(t));
            let entries = ids.iter().copied().zip(signatures).collect();
            pool.install(|| index.par_bulk_insert(entries))
        })
    }

    pub fn bulk_query<D: AsRef<str> + Sync>(&self, docs: &[D]) -> Result<Vec<Vec<i64>>> {
        let start = Instant::now();
        let results = minhash_dispatch!(&self.engine, hasher, index => {
            self.pool.try_map(docs, |i, doc| {
                let tokens = self.tokenizer.tokenize(doc.as_ref()).map_err(|e| e.at_index(i))?;
                Ok(index.query(&hasher.create_signature(&tokens)))
            })
        })?;
        debug!(
            docs = docs.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "minhash bulk query"
        );
        Ok(results)
    }

    pub fn bulk_query_return_similarity<D: AsRef<str> + Sync>(
        &self,
        docs: &[D],
    ) -> Result<Vec<Vec<(i64, f64)>>> {
        minhash_dispatch!(&self.engine, hasher, index => {
            self.pool.try_map(docs, |i, doc| {
                let tokens = self.tokenizer.tokenize(doc.as_ref()).map_err(|e| e.at_index(i))?;
                Ok(index.query_return_similarity(&hasher.create_signature(&tokens)))
            })
        })
    }

    pub fn bulk_query_tokens<U: Hash + Sync>(&self, tokens: &[Vec<U>]) -> Vec<Vec<i64>> {
        self.pool.map(tokens, |t| self.query_tokens(t))
    }

    pub fn bulk_query_tokens_return_similarity<U: Hash + Sync>(
        &self,
        tokens: &[Vec<U>],
    ) -> Vec<Vec<(i64, f64)>> {
        self.pool.map(tokens, |t| self.query_tokens_return_similarity(t))
    }

    /// Neighbours of every indexed id, computed on the pool.
    pub fn bulk_query_by_id(&self, ids: &[i64]) -> Vec<Vec<i64>> {
        self.pool.map(ids, |id| self.query_by_id(*id))
    }
}

impl fmt::Display for MinHashStringIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        minhash_dispatch!(&self.engine, _hasher, index => {
            write!(f, "MinHashStringIndex {{ analyzer = {}, index = {} }}", self.tokenizer.analyzer(), index)
        })
    }
}

impl Neighbors<i64> for MinHashStringIndex {
    fn ids(&self) -> Vec<i64> {
        MinHashStringIndex::ids(self)
    }

    fn neighbors(&self, id: &i64) -> Vec<i64> {
        self.query_by_id(*id)
    }

    fn par_neighbors(&self, ids: &[i64]) -> Vec<Vec<i64>> {
        self.bulk_query_by_id(ids)
    }

    fn representative(&self, members: &[i64]) -> Option<i64> {
        MinHashStringIndex::representative(self, members)
    }
}

/*================================================================================
=                            SIMHASH                                             =
================================================================================*/

enum SimHashEngine {
    U64(SimHasher<u64>, SimHashIndex<u64>),
    U128(SimHasher<u128>, SimHashIndex<u128>),
}

macro_rules! simhash_dispatch {
    ($engine:expr, $hasher:ident, $index:ident => $body:expr) => {
        match $engine {
            SimHashEngine::U64($hasher, $index) => $body,
            SimHashEngine::U128($hasher, $index) => $body,
        }
    };
}

pub struct SimHashStringIndex {
    config: SimHashConfig,
    tokenizer: Tokenizer,
    engine: SimHashEngine,
    pool: WorkerPool,
}

impl SimHashStringIndex {
    pub fn new(config: SimHashConfig) -> Result<Self> {
        config.validate()?;
        let tokenizer = config.tokenizer()?;
        Self::build(config, tokenizer)
    }

    pub fn with_tokenizer(config: SimHashConfig, tokenizer: Tokenizer) -> Result<Self> {
        config.validate()?;
        Self::build(config, tokenizer)
    }

    fn build(config: SimHashConfig, tokenizer: Tokenizer) -> Result<Self> {
        let backend = config.bucket_backend()?;
        let engine = match config.hash_size {
            64 => SimHashEngine::U64(
                SimHasher::from_seed(config.seed),
                SimHashIndex::new_with_backend(config.num_blocks, config.hamming_distance, backend)?,
            ),
            _ => SimHashEngine::U128(
                SimHasher::from_seed(config.seed),
                SimHashIndex::new_with_backend(config.num_blocks, config.hamming_distance, backend)?,
            ),
        };
        let pool = WorkerPool::new(config.num_threads)?;
        info!(
            hash_size = config.hash_size,
            num_blocks = config.num_blocks,
            hamming_distance = config.hamming_distance,
            analyzer = %tokenizer.analyzer(),
            threads = pool.num_threads(),
            "simhash string index ready"
        );
        Ok(Self {
            config,
            tokenizer,
            engine,
            pool,
        })
    }

    pub fn config(&self) -> &SimHashConfig {
        &self.config
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn insert_document(&mut self, id: i64, doc: &str) -> Result<()> {
        let tokens = self.tokenizer.tokenize(doc)?;
        self.insert_tokens(id, &tokens);
        Ok(())
    }

    pub fn insert_tokens<U: Hash>(&mut self, id: i64, tokens: &[U]) {
        simhash_dispatch!(&mut self.engine, hasher, index => {
            index.insert(id, hasher.create_signature(tokens))
        })
    }

    pub fn query(&self, doc: &str) -> Result<Vec<i64>> {
        let tokens = self.tokenizer.tokenize(doc)?;
        Ok(self.query_tokens(&tokens))
    }

    pub fn query_return_distance(&self, doc: &str) -> Result<Vec<(i64, usize)>> {
        let tokens = self.tokenizer.tokenize(doc)?;
        Ok(self.query_tokens_return_distance(&tokens))
    }

    pub fn query_tokens<U: Hash>(&self, tokens: &[U]) -> Vec<i64> {
        simhash_dispatch!(&self.engine, hasher, index => {
            index.query(hasher.create_signature(tokens))
        })
    }

    pub fn query_tokens_return_distance<U: Hash>(&self, tokens: &[U]) -> Vec<(i64, usize)> {
        simhash_dispatch!(&self.engine, hasher, index => {
            index.query_return_distance(hasher.create_signature(tokens))
        })
    }

    pub fn query_by_id(&self, id: i64) -> Vec<i64> {
        simhash_dispatch!(&self.engine, _hasher, index => index.query_by_id(&id))
    }

    /// Member of `ids` nearest the centroid of their stored signatures.
    pub fn representative(&self, ids: &[i64]) -> Option<i64> {
        simhash_dispatch!(&self.engine, _hasher, index => index.representative(ids))
    }

    pub fn remove(&mut self, id: i64) -> bool {
        simhash_dispatch!(&mut self.engine, _hasher, index => index.remove(&id))
    }

    pub fn contains(&self, id: i64) -> bool {
        simhash_dispatch!(&self.engine, _hasher, index => index.contains(&id))
    }

    pub fn ids(&self) -> Vec<i64> {
        simhash_dispatch!(&self.engine, _hasher, index => index.ids())
    }

    pub fn size(&self) -> usize {
        simhash_dispatch!(&self.engine, _hasher, index => index.size())
    }

    pub fn clear(&mut self) {
        simhash_dispatch!(&mut self.engine, _hasher, index => index.clear())
    }

    pub fn shrink_to_fit(&mut self) {
        let pool = &self.pool;
        simhash_dispatch!(&mut self.engine, _hasher, index => pool.install(|| index.shrink_to_fit()))
    }

    pub fn bulk_insert<D: AsRef<str> + Sync>(&mut self, ids: &[i64], docs: &[D]) -> Result<()> {
        check_lengths(ids.len(), docs.len())?;
        let start = Instant::now();
        let (tokenizer, pool) = (&self.tokenizer, &self.pool);
        simhash_dispatch!(&mut self.engine, hasher, index => {
            let hasher = &*hasher;
            let fingerprints = pool.try_map(docs, |i, doc| {
                let tokens = tokenizer.tokenize(doc.as_ref()).map_err(|e| e.at_index(i))?;
                Ok(hasher.create_signature(&tokens))
            })?;
            let entries = ids.iter().copied().zip(fingerprints).collect();
            pool.install(|| index.par_bulk_insert(entries));
        });
        info!(
            docs = docs.len(),
            size = self.size(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "simhash bulk insert"
        );
        Ok(())
    }

    pub fn bulk_insert_tokens<U: Hash + Sync>(&mut self, ids: &[i64], tokens: &[Vec<U>]) -> Result<()> {
        check_lengths(ids.len(), tokens.len())?;
        let pool = &self.pool;
        simhash_dispatch!(&mut self.engine, hasher, index => {
            let hasher = &*hasher;
            let fingerprints = pool.map(tokens, |t| hasher.create_signature(t));
            let entries = ids.iter().copied().zip(fingerprints).collect();
            pool.install(|| index.par_bulk_insert(entries));
        });
        Ok(())
    }

    pub fn bulk_query<D: AsRef<str> + Sync>(&self, docs: &[D]) -> Result<Vec<Vec<i64>>> {
        let start = Instant::now();
        let results = simhash_dispatch!(&self.engine, hasher, index => {
            self.pool.try_map(docs, |i, doc| {
                let tokens = self.tokenizer.tokenize(doc.as_ref()).map_err(|e| e.at_index(i))?;
                Ok(index.query(hasher.create_signature(&tokens)))
            })
        })?;
        debug!(
            docs = docs.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "simhash bulk query"
        );
        Ok(results)
    }

    pub fn bulk_query_return_distance<D: AsRef<str> + Sync>(
        &self,
        docs: &[D],
    ) -> Result<Vec<Vec<(i64, usize)>>> {
        simhash_dispatch!(&self.engine, hasher, index => {
            self.pool.try_map(docs, |i, doc| {
                let tokens = self.tokenizer.tokenize(doc.as_ref()).map_err(|e| e.at_index(i))?;
                Ok(index.query_return_distance(hasher.create_signature(&tokens)))
            })
        })
    }

    pub fn bulk_query_tokens<U: Hash + Sync>(&self, tokens: &[Vec<U>]) -> Vec<Vec<i64>> {
        self.pool.map(tokens, |t| self.query_tokens(t))
    }

    pub fn bulk_query_tokens_return_distance<U: Hash + Sync>(
        &self,
        tokens: &[Vec<U>],
    ) -> Vec<Vec<(i64, usize)>> {
        self.pool.map(tokens, |t| self.query_tokens_return_distance(t))
    }

    pub fn bulk_query_by_id(&self, ids: &[i64]) -> Vec<Vec<i64>> {
        self.pool.map(ids, |id| self.query_by_id(*id))
    }
}

impl fmt::Display for SimHashStringIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        simhash_dispatch!(&self.engine, _hasher, index => {
            write!(f, "SimHashStringIndex {{ analyzer = {}, index = {} }}", self.tokenizer.analyzer(), index)
        })
    }
}

impl Neighbors<i64> for SimHashStringIndex {
    fn ids(&self) -> Vec<i64> {
        SimHashStringIndex::ids(self)
    }

    fn neighbors(&self, id: &i64) -> Vec<i64> {
        self.query_by_id(*id)
    }

    fn par_neighbors(&self, ids: &[i64]) -> Vec<Vec<i64>> {
        self.bulk_query_by_id(ids)
    }

    fn representative(&self, members: &[i64]) -> Option<i64> {
        SimHashStringIndex::representative(self, members)
    }
}

