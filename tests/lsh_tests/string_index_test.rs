extern crate lshdedup;
use std::collections::HashSet;

use lshdedup::{LshError, MinHashConfig, MinHashStringIndex, SimHashConfig, SimHashStringIndex, Tokenizer};

const COMMON: &str = "Locality sensitive hashing groups similar documents into the same buckets with high probability";

fn corpus() -> Vec<String> {
    vec![
        format!("{} alpha", COMMON),
        format!("{} bravo", COMMON),
        format!("{} charlie", COMMON.to_uppercase()),
        format!("{} delta", COMMON),
        String::from("Rust compilers reject dangling references at build time"),
    ]
}

fn as_set(ids: Vec<i64>) -> HashSet<i64> {
    ids.into_iter().collect()
}

fn scenario_index(hash_size: usize) -> MinHashStringIndex {
    let config = MinHashConfig {
        hash_size,
        lowercase: true,
        ..MinHashConfig::with_bands(0.5, 42, 3)
    };
    let mut index = MinHashStringIndex::new(config).unwrap();
    for (i, doc) in corpus().iter().enumerate() {
        index.insert_document(i as i64, doc).unwrap();
    }
    index
}

#[test]
fn test_minhash_scenario_every_hash_size() {
    for hash_size in [8, 16, 32, 64] {
        let index = scenario_index(hash_size);
        assert_eq!(index.size(), 5);
        let docs = corpus();
        for (i, doc) in docs.iter().enumerate() {
            let result = as_set(index.query(doc).unwrap());
            if i < 4 {
                assert_eq!(result, HashSet::from([0, 1, 2, 3]), "hash_size {} doc {}", hash_size, i);
            } else {
                assert_eq!(result, HashSet::from([4]), "hash_size {} doc {}", hash_size, i);
            }
        }
    }
}

#[test]
fn test_minhash_scenario_after_remove() {
    let mut index = scenario_index(32);
    assert!(index.remove(0));
    assert!(index.remove(4));
    assert!(!index.remove(4));
    assert_eq!(index.size(), 3);

    let docs = corpus();
    for doc in &docs[1..4] {
        assert_eq!(as_set(index.query(doc).unwrap()), HashSet::from([1, 2, 3]));
    }
    assert!(index.query(&docs[4]).unwrap().is_empty());
    assert!(!as_set(index.query(&docs[0]).unwrap()).contains(&0));
}

#[test]
fn test_minhash_self_similarity_and_order() {
    let index = scenario_index(64);
    let docs = corpus();
    let scored = index.query_return_similarity(&docs[1]).unwrap();
    assert_eq!(scored[0], (1, 1.0));
    for pair in scored.windows(2) {
        assert!(pair[0].1 > pair[1].1 || (pair[0].1 == pair[1].1 && pair[0].0 < pair[1].0));
    }
    let ids: Vec<i64> = scored.iter().map(|(id, _)| *id).collect();
    assert_eq!(index.query(&docs[1]).unwrap(), ids);
}

#[test]
fn test_minhash_reinsert_is_idempotent() {
    let mut index = scenario_index(32);
    let docs = corpus();
    let before = index.query_return_similarity(&docs[2]).unwrap();
    index.insert_document(2, &docs[2]).unwrap();
    assert_eq!(index.size(), 5);
    assert_eq!(index.query_return_similarity(&docs[2]).unwrap(), before);
}

#[test]
fn test_minhash_tokens_api() {
    let mut index = MinHashStringIndex::new(MinHashConfig::with_bands(0.5, 20, 5)).unwrap();
    index.insert_tokens(10, &["a", "b", "c", "d"]).unwrap();
    index.insert_tokens(11, &["w", "x", "y", "z"]).unwrap();
    assert_eq!(index.query_tokens(&["a", "b", "c", "d"]), vec![10]);
    let owned: Vec<String> = vec!["d".into(), "c".into(), "b".into(), "a".into()];
    assert_eq!(index.query_tokens_return_similarity(&owned), vec![(10, 1.0)]);
    assert!(index.contains(10));
    assert_eq!(index.query_by_id(11), vec![11]);
}

#[test]
fn test_minhash_custom_tokenizer() {
    let tokenizer = Tokenizer::from_fn(|text| Ok(text.split(',').map(|s| s.trim().to_string()).collect()));
    let mut index = MinHashStringIndex::with_tokenizer(MinHashConfig::with_bands(0.5, 20, 5), tokenizer).unwrap();
    index.insert_document(1, "red, green, blue, cyan").unwrap();
    assert_eq!(index.query("cyan,blue,green,red").unwrap(), vec![1]);
    assert!(index.query("red green blue cyan").unwrap().is_empty());
}

#[test]
fn test_minhash_construction_errors() {
    let bad_size = MinHashConfig {
        hash_size: 24,
        ..MinHashConfig::default()
    };
    assert!(matches!(
        MinHashStringIndex::new(bad_size),
        Err(LshError::InvalidHashSize { hash_size: 24, .. })
    ));
    assert!(matches!(
        MinHashStringIndex::new(MinHashConfig::with_bands(1.01, 20, 5)),
        Err(LshError::InvalidThreshold(_))
    ));
    let bad_backend = MinHashConfig {
        backend: String::from("btree"),
        ..MinHashConfig::default()
    };
    assert!(matches!(MinHashStringIndex::new(bad_backend), Err(LshError::UnknownBackend(_))));
}

#[test]
fn test_minhash_display() {
    let index = scenario_index(16);
    let text = index.to_string();
    assert!(text.contains("u16"), "{}", text);
    assert!(text.contains("size = 5"), "{}", text);
}

/*============================================================
=                            SIMHASH                         =
============================================================*/

fn long_doc(prefix: &str, replace_at: Option<usize>) -> String {
    (0..300)
        .map(|i| match replace_at {
            Some(r) if r == i => String::from("replaced"),
            _ => format!("{}{}", prefix, i),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[test]
fn test_simhash_string_index() {
    for hash_size in [64, 128] {
        let config = SimHashConfig::new(hash_size, 16, 12);
        let mut index = SimHashStringIndex::new(config).unwrap();
        index.insert_document(0, &long_doc("w", None)).unwrap();
        index.insert_document(1, &long_doc("w", Some(17))).unwrap();
        index.insert_document(2, &long_doc("z", None)).unwrap();
        assert_eq!(index.size(), 3);

        assert_eq!(index.query(&long_doc("w", None)).unwrap(), vec![0, 1]);
        assert_eq!(index.query(&long_doc("z", None)).unwrap(), vec![2]);
        let scored = index.query_return_distance(&long_doc("w", None)).unwrap();
        assert_eq!(scored[0], (0, 0));

        assert!(index.remove(0));
        assert!(!index.remove(0));
        assert_eq!(index.query(&long_doc("w", None)).unwrap(), vec![1]);
    }
}

#[test]
fn test_simhash_construction_errors() {
    assert!(matches!(
        SimHashStringIndex::new(SimHashConfig::new(32, 6, 5)),
        Err(LshError::InvalidHashSize { hash_size: 32, .. })
    ));
    assert!(matches!(
        SimHashStringIndex::new(SimHashConfig::new(64, 6, 6)),
        Err(LshError::InvalidBlocks { .. })
    ));
    assert!(matches!(
        SimHashStringIndex::new(SimHashConfig::new(64, 40, 5)),
        Err(LshError::InvalidBlocks { .. })
    ));
}

#[test]
fn test_narrow_lanes_reject_long_disjoint_documents() {
    let doc_a = (0..1000).map(|i| format!("a{}", i)).collect::<Vec<_>>().join(" ");
    let doc_b = (0..1000).map(|i| format!("b{}", i)).collect::<Vec<_>>().join(" ");
    for hash_size in [8, 16] {
        let config = MinHashConfig {
            hash_size,
            ..MinHashConfig::with_bands(0.5, 32, 4)
        };
        let mut index = MinHashStringIndex::new(config).unwrap();
        index.insert_document(1, &doc_a).unwrap();
        assert!(index.query(&doc_b).unwrap().is_empty(), "hash_size {}", hash_size);
        assert_eq!(index.query_return_similarity(&doc_a).unwrap(), vec![(1, 1.0)]);
    }
}
