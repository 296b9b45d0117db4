extern crate lshdedup;
use anyhow::anyhow;
use lshdedup::{
    LshError, MinHashConfig, MinHashIndex, MinHashStringIndex, MinHasher, SimHashConfig,
    SimHashStringIndex, Tokenizer,
};

fn documents(n: usize) -> Vec<String> {
    // groups of three near-identical documents, no vocabulary shared across groups
    (0..n)
        .map(|i| {
            let group = i / 3;
            let mut words: Vec<String> = (0..12).map(|k| format!("g{}w{}", group, k)).collect();
            words.push(format!("variant{}", i % 3));
            words.join(" ")
        })
        .collect()
}

#[test]
fn test_bulk_query_matches_single_query() {
    let docs = documents(60);
    let ids: Vec<i64> = (0..docs.len() as i64).collect();
    let config = MinHashConfig {
        num_threads: 4,
        ..MinHashConfig::with_bands(0.5, 30, 4)
    };
    let mut index = MinHashStringIndex::new(config).unwrap();
    index.bulk_insert(&ids, &docs).unwrap();
    assert_eq!(index.size(), 60);

    let bulk = index.bulk_query(&docs).unwrap();
    assert_eq!(bulk.len(), docs.len());
    for (i, doc) in docs.iter().enumerate() {
        assert_eq!(bulk[i], index.query(doc).unwrap(), "slot {}", i);
        assert!(bulk[i].contains(&(i as i64)));
    }

    let scored = index.bulk_query_return_similarity(&docs).unwrap();
    for (i, doc) in docs.iter().enumerate() {
        assert_eq!(scored[i], index.query_return_similarity(doc).unwrap());
    }
}

#[test]
fn test_bulk_insert_matches_single_insert() {
    let docs = documents(30);
    let ids: Vec<i64> = (100..130).collect();
    let mut bulk = MinHashStringIndex::new(MinHashConfig::with_bands(0.5, 30, 4)).unwrap();
    bulk.bulk_insert(&ids, &docs).unwrap();
    let mut single = MinHashStringIndex::new(MinHashConfig::with_bands(0.5, 30, 4)).unwrap();
    for (id, doc) in ids.iter().zip(docs.iter()) {
        single.insert_document(*id, doc).unwrap();
    }
    assert_eq!(bulk.bulk_query(&docs).unwrap(), single.bulk_query(&docs).unwrap());
}

#[test]
fn test_bulk_insert_repeated_id_last_wins() {
    let mut index = MinHashStringIndex::new(MinHashConfig::with_bands(0.5, 20, 5)).unwrap();
    let docs = ["first version of the text", "something else entirely here"];
    index.bulk_insert(&[7, 7], &docs).unwrap();
    assert_eq!(index.size(), 1);
    assert!(index.query(docs[0]).unwrap().is_empty());
    assert_eq!(index.query(docs[1]).unwrap(), vec![7]);
}

#[test]
fn test_bulk_insert_length_mismatch() {
    let mut index = SimHashStringIndex::new(SimHashConfig::default()).unwrap();
    let err = index.bulk_insert(&[1, 2, 3], &["a", "b"]).unwrap_err();
    assert!(matches!(err, LshError::LengthMismatch { ids: 3, docs: 2 }));
}

fn failing_tokenizer() -> Tokenizer {
    Tokenizer::from_fn(|text| {
        if text.contains("FAIL") {
            Err(anyhow!("cannot tokenize {:?}", text))
        } else {
            Ok(text.split_whitespace().map(String::from).collect())
        }
    })
}

#[test]
fn test_bulk_insert_error_inserts_nothing() {
    let mut index =
        MinHashStringIndex::with_tokenizer(MinHashConfig::with_bands(0.5, 20, 5), failing_tokenizer()).unwrap();
    let docs = vec!["fine one", "FAIL first", "fine two", "FAIL second"];
    let err = index.bulk_insert(&[0, 1, 2, 3], &docs).unwrap_err();
    match err {
        LshError::Tokenize { index: position, message } => {
            assert_eq!(position, Some(1));
            assert!(message.contains("FAIL first"), "{}", message);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(index.size(), 0);
}

#[test]
fn test_bulk_query_error_is_first_in_input_order() {
    let mut index =
        SimHashStringIndex::with_tokenizer(SimHashConfig::default(), failing_tokenizer()).unwrap();
    index.insert_document(0, "fine one").unwrap();
    let queries: Vec<String> = (0..50)
        .map(|i| if i == 12 || i == 40 { format!("FAIL {}", i) } else { format!("fine {}", i) })
        .collect();
    match index.bulk_query(&queries) {
        Err(LshError::Tokenize { index, .. }) => assert_eq!(index, Some(12)),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn test_signature_level_parallel_ops() {
    let hasher = MinHasher::<u64>::new(25 * 4);
    let docs = documents(45);
    let signatures: Vec<Vec<u64>> = docs
        .iter()
        .map(|d| hasher.create_signature(d.split_whitespace()))
        .collect();
    let mut index: MinHashIndex<u64> = MinHashIndex::new(25, 4, 0.5).unwrap();
    index
        .par_bulk_insert(signatures.iter().cloned().enumerate().map(|(i, s)| (i as i64, s)).collect())
        .unwrap();
    let results = index.par_bulk_query(&signatures);
    for (i, sig) in signatures.iter().enumerate() {
        assert_eq!(results[i], index.query(sig));
    }
    let scored = index.par_bulk_query_return_similarity(&signatures);
    assert_eq!(scored[4][0], (4, 1.0));

    // a bad signature rejects the whole batch
    let before = index.size();
    let err = index.par_bulk_insert(vec![(1000, vec![1u64; 100]), (1001, vec![1u64; 3])]);
    assert!(err.is_err());
    assert_eq!(index.size(), before);
    assert!(!index.contains(&1000));
}
