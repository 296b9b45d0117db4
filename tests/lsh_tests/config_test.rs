extern crate lshdedup;
use std::io::Write;

use lshdedup::config::{from_value, parse_config};
use lshdedup::{DedupConfig, IndexConfig, LshError, MinHashConfig, SimHashConfig};
use serde_json::json;

#[test]
fn test_minhash_config_defaults_from_empty_object() {
    let config: MinHashConfig = from_value(&json!({})).unwrap();
    assert_eq!(config, MinHashConfig::default());
    assert_eq!(config.hash_size, 32);
    assert_eq!(config.jaccard_threshold, 0.75);
    assert_eq!(config.resolve_bands().unwrap(), (20, 5));
    assert_eq!(config.backend, "hashset");
}

#[test]
fn test_minhash_num_hashes_picks_bands() {
    let config: MinHashConfig = from_value(&json!({
        "jaccard_threshold": 0.5,
        "num_hashes": 126
    }))
    .unwrap();
    let (b, r) = config.resolve_bands().unwrap();
    assert!(b * r <= 126);
    assert!(((1.0 / b as f64).powf(1.0 / r as f64) - 0.5).abs() < 0.05);
}

#[test]
fn test_minhash_validation() {
    let zero_hashes: MinHashConfig = from_value(&json!({"num_hashes": 0})).unwrap();
    assert!(matches!(zero_hashes.validate(), Err(LshError::InvalidBands(_))));

    let zero_bands: MinHashConfig = from_value(&json!({"num_bands": 0, "band_size": 4})).unwrap();
    assert!(matches!(zero_bands.validate(), Err(LshError::InvalidBands(_))));

    let nan = MinHashConfig {
        jaccard_threshold: f64::NAN,
        ..MinHashConfig::default()
    };
    assert!(matches!(nan.validate(), Err(LshError::InvalidThreshold(_))));

    let analyzer: MinHashConfig = from_value(&json!({"analyzer": "sentence"})).unwrap();
    assert!(matches!(analyzer.validate(), Err(LshError::UnknownAnalyzer(_))));

    let ngrams: MinHashConfig = from_value(&json!({"ngram_range": [3, 1]})).unwrap();
    assert!(matches!(ngrams.validate(), Err(LshError::InvalidNgramRange(3, 1))));
}

#[test]
fn test_simhash_config() {
    let config: SimHashConfig = from_value(&json!({"hash_size": 128, "backend": "smallvec"})).unwrap();
    assert_eq!(config.num_blocks, 6);
    assert_eq!(config.hamming_distance, 5);
    assert!(config.validate().is_ok());

    let too_far: SimHashConfig = from_value(&json!({"num_blocks": 4, "hamming_distance": 4})).unwrap();
    assert!(matches!(too_far.validate(), Err(LshError::InvalidBlocks { num_blocks: 4, hamming_distance: 4 })));
}

#[test]
fn test_wrong_field_type_is_config_error() {
    let err = from_value::<MinHashConfig>(&json!({"hash_size": "big"})).unwrap_err();
    assert!(matches!(err, LshError::Config(_)));
}

#[test]
fn test_dedup_config_from_yaml_file() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(file, "index:").unwrap();
    writeln!(file, "  simhash:").unwrap();
    writeln!(file, "    num_blocks: 8").unwrap();
    writeln!(file, "    hamming_distance: 3").unwrap();
    writeln!(file, "text_field: body").unwrap();
    file.flush().unwrap();

    let value = parse_config(file.path()).unwrap();
    let config: DedupConfig = from_value(&value).unwrap();
    assert_eq!(config.text_field, "body");
    assert_eq!(config.min_cluster_size, 2);
    match &config.index {
        IndexConfig::SimHash(c) => {
            assert_eq!(c.num_blocks, 8);
            assert_eq!(c.hamming_distance, 3);
            assert_eq!(c.hash_size, 64);
        }
        other => panic!("unexpected index {:?}", other),
    }
    assert!(config.index.validate().is_ok());
}

#[test]
fn test_dedup_config_from_json_file() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    let body = json!({"index": {"minhash": {"jaccard_threshold": 0.9, "hash_size": 64}}});
    write!(file, "{}", body).unwrap();
    file.flush().unwrap();

    let config: DedupConfig = from_value(&parse_config(file.path()).unwrap()).unwrap();
    assert_eq!(config.text_field, "text");
    assert!(matches!(config.index, IndexConfig::MinHash(ref c) if c.hash_size == 64));
}

#[test]
fn test_unknown_config_extension() {
    let file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    assert!(parse_config(file.path()).is_err());
}
