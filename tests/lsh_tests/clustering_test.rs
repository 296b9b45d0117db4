extern crate lshdedup;
use lshdedup::{cluster_assignments, Clusterer, MinHashConfig, MinHashStringIndex, SimHashIndex};

fn group_doc(group: usize, variant: usize) -> String {
    let mut words: Vec<String> = (0..15).map(|k| format!("topic{}word{}", group, k)).collect();
    words.push(format!("tail{}", variant));
    words.join(" ")
}

#[test]
fn test_clusters_near_duplicate_groups() {
    let mut index = MinHashStringIndex::new(MinHashConfig::with_bands(0.6, 30, 4)).unwrap();
    // ids 0..9 are three groups of three, id 9 is alone
    let mut docs: Vec<String> = Vec::new();
    for group in 0..3 {
        for variant in 0..3 {
            docs.push(group_doc(group, variant));
        }
    }
    docs.push(String::from("a lonely document with nothing in common"));
    let ids: Vec<i64> = (0..docs.len() as i64).collect();
    index.bulk_insert(&ids, &docs).unwrap();

    let clusters = Clusterer::new(2).cluster(&index);
    let members: Vec<Vec<i64>> = clusters.iter().map(|c| c.ids.clone()).collect();
    assert_eq!(members, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7, 8]]);
    assert_eq!(clusters[2].cluster_id, 2);

    let assignments = cluster_assignments(&clusters);
    assert_eq!(assignments.get(&4), Some(&1));
    assert!(assignments.get(&9).is_none());
}

#[test]
fn test_clusters_over_signature_index() {
    let mut index: SimHashIndex<u64, u32> = SimHashIndex::new(4, 2).unwrap();
    index.insert(1, 0b0000);
    index.insert(2, 0b0011);
    index.insert(3, u64::MAX);
    index.insert(4, u64::MAX ^ 1);

    let clusters = Clusterer::new(1).cluster(&index);
    let members: Vec<Vec<u32>> = clusters.iter().map(|c| c.ids.clone()).collect();
    assert_eq!(members, vec![vec![1, 2], vec![3, 4]]);

    // majority of {MAX, MAX ^ 1} leaves bit 0 clear, so id 4 sits on the centroid
    assert_eq!(index.calculate_centroid(&[3, 4]), Some(u64::MAX ^ 1));
    assert_eq!(clusters[0].representative, 1);
    assert_eq!(clusters[1].representative, 4);
    assert_eq!(index.calculate_centroid(&[99]), None);
}

#[test]
fn test_representative_is_a_member() {
    let mut index = MinHashStringIndex::new(MinHashConfig::with_bands(0.6, 30, 4)).unwrap();
    let docs: Vec<String> = (0..4).map(|v| group_doc(7, v)).collect();
    index.bulk_insert(&[10, 11, 12, 13], &docs).unwrap();
    let clusters = Clusterer::new(2).cluster(&index);
    assert_eq!(clusters.len(), 1);
    assert!(clusters[0].ids.contains(&clusters[0].representative));
    assert_eq!(index.representative(&[]), None);
}
