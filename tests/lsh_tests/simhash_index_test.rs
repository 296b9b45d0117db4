extern crate lshdedup;
use lshdedup::banding::BlockPartition;
use lshdedup::{BucketBackend, SimHashBits, SimHashIndex, SimHasher};

fn flip(fp: u64, bits: &[usize]) -> u64 {
    bits.iter().fold(fp, |acc, &b| acc ^ (1u64 << b))
}

#[test]
fn test_four_bits_found_six_bits_not() {
    // 6 blocks on 64 bits, distance 5
    for backend in [BucketBackend::HashSet, BucketBackend::Vec, BucketBackend::SmallVec] {
        let mut index: SimHashIndex<u64> = SimHashIndex::new_with_backend(6, 5, backend).unwrap();
        let query = 0x0123_4567_89ab_cdefu64;
        index.insert(10, flip(query, &[1, 2, 40, 63]));
        index.insert(20, flip(query, &[1, 2, 3, 40, 41, 63]));
        index.insert(30, flip(query, &[5, 15, 25, 35, 50, 60]));

        assert_eq!(index.query(query), vec![10]);
        assert_eq!(index.query_return_distance(query), vec![(10, 4)]);
    }
}

#[test]
fn test_every_pair_within_distance_is_found() {
    // pigeonhole: any fingerprint within 5 bits shares a block with the query
    let mut index: SimHashIndex<u64> = SimHashIndex::new(6, 5).unwrap();
    let query = 0xfeed_face_dead_beefu64;
    let patterns: Vec<Vec<usize>> = vec![
        vec![0, 11, 22, 33, 44],
        vec![10, 21, 32, 43, 54],
        vec![63, 62, 61, 60, 59],
        vec![0, 63],
        vec![],
    ];
    for (i, bits) in patterns.iter().enumerate() {
        index.insert(i as i64, flip(query, bits));
    }
    let found = index.query_return_distance(query);
    assert_eq!(found.len(), patterns.len());
    assert_eq!(found[0], (4, 0));
    assert_eq!(found[1], (3, 2));
    assert!(found.iter().all(|(_, d)| *d <= 5));
}

#[test]
fn test_self_distance_zero() {
    let hasher = SimHasher::<u128>::from_seed(5);
    let mut index: SimHashIndex<u128> = SimHashIndex::new(8, 4).unwrap();
    let doc = "the engine indexes fingerprints by block and filters by hamming distance";
    let fp = hasher.create_signature(doc.split_whitespace());
    index.insert(1, fp);
    assert_eq!(index.query_one(fp), Some((1, 0)));
    assert_eq!(index.query_by_id(&1), vec![1]);
    assert_eq!(index.get_signature(&1), Some(fp));
    assert!(index.query_by_id(&2).is_empty());
}

#[test]
fn test_bulk_remove_and_clear() {
    let mut index: SimHashIndex<u64> = SimHashIndex::new(4, 2).unwrap();
    index.par_bulk_insert((0..100).map(|i| (i, (i as u64) << 20)).collect());
    assert_eq!(index.size(), 100);
    assert_eq!(index.bulk_remove(&[1, 2, 3, 1000]), 3);
    assert_eq!(index.size(), 97);
    assert!(!index.contains(&2));
    index.clear();
    assert!(index.is_empty());
}

#[test]
fn test_partition_masks_are_disjoint() {
    let partition = BlockPartition::<u64>::new(6);
    let total: u32 = partition.masks().iter().map(|m| SimHashBits::count_ones(*m)).sum();
    assert_eq!(total, 64);
}
