/*================================================================================
=                            INDEX CONFIGURATION                                 =
Every knob of a string index, loadable from yaml or json. Missing fields fall
back to the defaults below. `validate` performs all construction-time checks;
index constructors call it, so an invalid config never produces an index.

minhash:
    hash_size: 32              (8 | 16 | 32 | 64)
    jaccard_threshold: 0.75
    num_bands / band_size      both given -> used as is
    num_hashes                 otherwise -> bands picked along the S-curve
                               neither   -> 20 bands of 5
    analyzer: word             (word | char)
    lowercase: false
    ngram_range: [1, 1]
    backend: hashset           (hashset | vec | smallvec)
    seed: 3
    num_threads: 0             (0 -> one worker per cpu)

simhash:
    hash_size: 64              (64 | 128)
    num_blocks: 6              (3..=32)
    hamming_distance: 5        (< num_blocks)
    ... analyzer/lowercase/ngram_range/backend/seed/num_threads as above,
        backend defaults to vec, seed to 5
================================================================================*/
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{anyhow, Error};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::banding::optimal_bands;
use crate::bucket::BucketBackend;
use crate::error::{LshError, Result};
use crate::tokenize::{validate_ngram_range, Analyzer, Tokenizer};

pub const MINHASH_HASH_SIZES: &[usize] = &[8, 16, 32, 64];
pub const SIMHASH_HASH_SIZES: &[usize] = &[64, 128];
pub const MIN_BLOCKS: usize = 3;
pub const MAX_BLOCKS: usize = 32;

const DEFAULT_NUM_BANDS: usize = 20;
const DEFAULT_BAND_SIZE: usize = 5;

fn default_minhash_hash_size() -> usize {
    32
}
fn default_jaccard_threshold() -> f64 {
    0.75
}
fn default_simhash_hash_size() -> usize {
    64
}
fn default_num_blocks() -> usize {
    6
}
fn default_hamming_distance() -> usize {
    5
}
fn default_analyzer() -> String {
    String::from("word")
}
fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}
fn default_minhash_backend() -> String {
    String::from("hashset")
}
fn default_simhash_backend() -> String {
    String::from("vec")
}
fn default_minhash_seed() -> u64 {
    3
}
fn default_simhash_seed() -> u64 {
    5
}
fn default_text_field() -> String {
    String::from("text")
}
fn default_min_cluster_size() -> usize {
    2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinHashConfig {
    #[serde(default = "default_minhash_hash_size")]
    pub hash_size: usize,
    #[serde(default = "default_jaccard_threshold")]
    pub jaccard_threshold: f64,
    #[serde(default)]
    pub num_bands: Option<usize>,
    #[serde(default)]
    pub band_size: Option<usize>,
    #[serde(default)]
    pub num_hashes: Option<usize>,
    #[serde(default = "default_analyzer")]
    pub analyzer: String,
    #[serde(default)]
    pub lowercase: bool,
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),
    #[serde(default = "default_minhash_backend")]
    pub backend: String,
    #[serde(default = "default_minhash_seed")]
    pub seed: u64,
    #[serde(default)]
    pub num_threads: usize,
}

impl Default for MinHashConfig {
    fn default() -> Self {
        Self {
            hash_size: default_minhash_hash_size(),
            jaccard_threshold: default_jaccard_threshold(),
            num_bands: None,
            band_size: None,
            num_hashes: None,
            analyzer: default_analyzer(),
            lowercase: false,
            ngram_range: default_ngram_range(),
            backend: default_minhash_backend(),
            seed: default_minhash_seed(),
            num_threads: 0,
        }
    }
}

impl MinHashConfig {
    /// Explicit band layout, keeping every other default.
    pub fn with_bands(jaccard_threshold: f64, num_bands: usize, band_size: usize) -> Self {
        Self {
            jaccard_threshold,
            num_bands: Some(num_bands),
            band_size: Some(band_size),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !MINHASH_HASH_SIZES.contains(&self.hash_size) {
            return Err(LshError::InvalidHashSize {
                hash_size: self.hash_size,
                allowed: MINHASH_HASH_SIZES,
            });
        }
        // NaN fails the range check too
        if !(0.0..=1.0).contains(&self.jaccard_threshold) {
            return Err(LshError::InvalidThreshold(self.jaccard_threshold));
        }
        self.resolve_bands()?;
        self.bucket_backend()?;
        self.analyzer()?;
        validate_ngram_range(self.ngram_range)
    }

    /// `(num_bands, band_size)` this config resolves to.
    pub fn resolve_bands(&self) -> Result<(usize, usize)> {
        let (num_bands, band_size) = match (self.num_bands, self.band_size, self.num_hashes) {
            (Some(b), Some(r), _) => (b, r),
            (_, _, Some(0)) => {
                return Err(LshError::InvalidBands(String::from("num_hashes must be positive")))
            }
            (_, _, Some(n)) => optimal_bands(n, self.jaccard_threshold),
            _ => (DEFAULT_NUM_BANDS, DEFAULT_BAND_SIZE),
        };
        if num_bands == 0 || band_size == 0 {
            return Err(LshError::InvalidBands(format!(
                "num_bands={} band_size={}",
                num_bands, band_size
            )));
        }
        Ok((num_bands, band_size))
    }

    pub fn bucket_backend(&self) -> Result<BucketBackend> {
        self.backend.parse()
    }

    pub fn analyzer(&self) -> Result<Analyzer> {
        self.analyzer.parse()
    }

    pub fn tokenizer(&self) -> Result<Tokenizer> {
        Tokenizer::new(self.analyzer()?, self.lowercase, self.ngram_range)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimHashConfig {
    #[serde(default = "default_simhash_hash_size")]
    pub hash_size: usize,
    #[serde(default = "default_num_blocks")]
    pub num_blocks: usize,
    #[serde(default = "default_hamming_distance")]
    pub hamming_distance: usize,
    #[serde(default = "default_analyzer")]
    pub analyzer: String,
    #[serde(default)]
    pub lowercase: bool,
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),
    #[serde(default = "default_simhash_backend")]
    pub backend: String,
    #[serde(default = "default_simhash_seed")]
    pub seed: u64,
    #[serde(default)]
    pub num_threads: usize,
}

impl Default for SimHashConfig {
    fn default() -> Self {
        Self {
            hash_size: default_simhash_hash_size(),
            num_blocks: default_num_blocks(),
            hamming_distance: default_hamming_distance(),
            analyzer: default_analyzer(),
            lowercase: false,
            ngram_range: default_ngram_range(),
            backend: default_simhash_backend(),
            seed: default_simhash_seed(),
            num_threads: 0,
        }
    }
}

impl SimHashConfig {
    pub fn new(hash_size: usize, num_blocks: usize, hamming_distance: usize) -> Self {
        Self {
            hash_size,
            num_blocks,
            hamming_distance,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !SIMHASH_HASH_SIZES.contains(&self.hash_size) {
            return Err(LshError::InvalidHashSize {
                hash_size: self.hash_size,
                allowed: SIMHASH_HASH_SIZES,
            });
        }
        validate_blocks(self.num_blocks, self.hamming_distance, self.hash_size)?;
        self.bucket_backend()?;
        self.analyzer()?;
        validate_ngram_range(self.ngram_range)
    }

    pub fn bucket_backend(&self) -> Result<BucketBackend> {
        self.backend.parse()
    }

    pub fn analyzer(&self) -> Result<Analyzer> {
        self.analyzer.parse()
    }

    pub fn tokenizer(&self) -> Result<Tokenizer> {
        Tokenizer::new(self.analyzer()?, self.lowercase, self.ngram_range)
    }
}

pub(crate) fn validate_blocks(num_blocks: usize, hamming_distance: usize, bits: usize) -> Result<()> {
    let in_range = (MIN_BLOCKS..=MAX_BLOCKS).contains(&num_blocks) && num_blocks <= bits;
    if !in_range || hamming_distance >= num_blocks {
        return Err(LshError::InvalidBlocks {
            num_blocks,
            hamming_distance,
        });
    }
    Ok(())
}

/*================================================================================
=                            CLI CONFIG                                          =
================================================================================*/

/// Which index the command line tool builds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexConfig {
    MinHash(MinHashConfig),
    SimHash(SimHashConfig),
}

impl IndexConfig {
    pub fn validate(&self) -> Result<()> {
        match self {
            IndexConfig::MinHash(c) => c.validate(),
            IndexConfig::SimHash(c) => c.validate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupConfig {
    pub index: IndexConfig,
    #[serde(default = "default_text_field")]
    pub text_field: String,
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,
}

/// Reads a .yaml/.yml or .json config into a json value.
pub fn parse_config(config: &Path) -> anyhow::Result<Value, Error> {
    let file = File::open(config).map_err(|e| anyhow!("Could not open config {:?}: {}", config, e))?;
    let reader = BufReader::new(file);

    let ext = config.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parsed_config: Value = match ext {
        "json" => serde_json::from_reader(reader)?,
        "yaml" | "yml" => {
            let yaml_value: serde_yaml::Value = serde_yaml::from_reader(reader)?;
            serde_json::to_value(yaml_value)?
        }
        _ => {
            return Err(anyhow!("Weird config format: {:?}", config));
        }
    };
    Ok(parsed_config)
}

/// Typed view of a parsed config value.
pub fn from_value<T: DeserializeOwned>(value: &Value) -> Result<T> {
    serde_json::from_value(value.clone()).map_err(|e| LshError::Config(e.to_string()))
}
