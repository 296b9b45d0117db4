use thiserror::Error;

/// Errors raised by the LSH indexes and their configuration.
///
/// Everything except `Tokenize` is a construction-time configuration error: an index is never
/// built from a configuration that produced one of them.
#[derive(Debug, Error)]
pub enum LshError {
    #[error("invalid hash_size {hash_size}, must be one of {allowed:?}")]
    InvalidHashSize {
        hash_size: usize,
        allowed: &'static [usize],
    },

    #[error("jaccard_threshold must be between 0 and 1, got {0}")]
    InvalidThreshold(f64),

    #[error("invalid blocks: num_blocks={num_blocks} hamming_distance={hamming_distance} (need 3 <= num_blocks <= 32 and hamming_distance < num_blocks)")]
    InvalidBlocks {
        num_blocks: usize,
        hamming_distance: usize,
    },

    #[error("invalid band configuration: {0}")]
    InvalidBands(String),

    #[error("unknown bucket backend {0:?}, expected one of hashset, vec, smallvec")]
    UnknownBackend(String),

    #[error("unknown analyzer {0:?}, expected word or char")]
    UnknownAnalyzer(String),

    #[error("invalid ngram_range ({0}, {1})")]
    InvalidNgramRange(usize, usize),

    #[error("signature has {got} hashes, index expects {expected}")]
    SignatureLength { expected: usize, got: usize },

    #[error("bulk insert got {ids} ids but {docs} documents")]
    LengthMismatch { ids: usize, docs: usize },

    #[error("tokenizer failed (document {index:?}): {message}")]
    Tokenize {
        index: Option<usize>,
        message: String,
    },

    #[error("could not build worker pool: {0}")]
    ThreadPool(String),

    #[error("config error: {0}")]
    Config(String),
}

impl LshError {
    /// Attaches the batch position to a tokenizer error raised inside a bulk operation.
    pub(crate) fn at_index(self, index: usize) -> Self {
        match self {
            LshError::Tokenize { message, .. } => LshError::Tokenize {
                index: Some(index),
                message,
            },
            other => other,
        }
    }
}

pub type Result<T, E = LshError> = std::result::Result<T, E>;
