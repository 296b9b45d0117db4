pub mod banding;
pub mod bucket;
pub mod clustering;
pub mod config;
pub mod doc_table;
pub mod error;
pub mod minhash;
pub mod minhash_index;
pub mod pool;
pub mod simhash;
pub mod simhash_index;
pub mod string_index;
pub mod tokenize;

pub use bucket::BucketBackend;
pub use clustering::{cluster_assignments, Cluster, Clusterer, Neighbors};
pub use config::{DedupConfig, IndexConfig, MinHashConfig, SimHashConfig};
pub use error::{LshError, Result};
pub use minhash::{
    compute_jaccard_similarity, compute_minhash_distance, compute_minhash_similarity, MinHashLane,
    MinHasher,
};
pub use minhash_index::MinHashIndex;
pub use simhash::{simhash_centroid, SimHashBits, SimHasher};
pub use simhash_index::SimHashIndex;
pub use string_index::{MinHashStringIndex, SimHashStringIndex};
pub use tokenize::{Analyzer, Tokenizer};
