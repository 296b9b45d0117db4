/*================================================================================
=                            CLUSTERING                                          =
Greedy near-duplicate grouping over a populated index.

Ids are visited in ascending order. Each id not yet in a cluster is queried
against the index; its hits that are still unassigned form a new cluster when
there are at least `min_cluster_size` of them. Ids left over belong to no
cluster. Each cluster names a representative, the member nearest the centroid
of the group's signatures. Neighbour lists are computed up front on the rayon pool, the greedy
pass itself is serial so the result is deterministic.
================================================================================*/
use std::collections::HashMap;
use std::hash::Hash;

use fxhash::FxHashSet;
use rayon::prelude::*;
use tracing::debug;

use crate::minhash::MinHashLane;
use crate::minhash_index::MinHashIndex;
use crate::simhash::SimHashBits;
use crate::simhash_index::SimHashIndex;

/// Anything that can list its ids and answer "who is close to this id".
pub trait Neighbors<Id: Send + Sync> {
    fn ids(&self) -> Vec<Id>;

    /// Near neighbours of an indexed id, the id itself included.
    fn neighbors(&self, id: &Id) -> Vec<Id>;

    /// Neighbour lists for many ids, slot `i` answering `ids[i]`.
    fn par_neighbors(&self, ids: &[Id]) -> Vec<Vec<Id>>
    where
        Self: Sync,
    {
        ids.par_iter().map(|id| self.neighbors(id)).collect()
    }

    /// The member that best stands for `members`. Defaults to the smallest id.
    fn representative(&self, members: &[Id]) -> Option<Id>
    where
        Id: Clone + Ord,
    {
        members.iter().min().cloned()
    }
}

impl<T, Id> Neighbors<Id> for MinHashIndex<T, Id>
where
    T: MinHashLane,
    Id: Hash + Eq + Clone + Ord + Send + Sync,
{
    fn ids(&self) -> Vec<Id> {
        MinHashIndex::ids(self)
    }

    fn neighbors(&self, id: &Id) -> Vec<Id> {
        self.query_by_id(id)
    }

    fn representative(&self, members: &[Id]) -> Option<Id> {
        MinHashIndex::representative(self, members)
    }
}

impl<S, Id> Neighbors<Id> for SimHashIndex<S, Id>
where
    S: SimHashBits,
    Id: Hash + Eq + Clone + Ord + Send + Sync,
{
    fn ids(&self) -> Vec<Id> {
        SimHashIndex::ids(self)
    }

    fn neighbors(&self, id: &Id) -> Vec<Id> {
        self.query_by_id(id)
    }

    fn representative(&self, members: &[Id]) -> Option<Id> {
        SimHashIndex::representative(self, members)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster<Id> {
    pub cluster_id: usize,
    /// Ascending.
    pub ids: Vec<Id>,
    pub representative: Id,
}

#[derive(Debug, Clone)]
pub struct Clusterer {
    min_cluster_size: usize,
}

impl Clusterer {
    pub fn new(min_cluster_size: usize) -> Self {
        Self {
            min_cluster_size: min_cluster_size.max(1),
        }
    }

    pub fn cluster<Id, N>(&self, index: &N) -> Vec<Cluster<Id>>
    where
        Id: Hash + Eq + Clone + Ord + Send + Sync,
        N: Neighbors<Id> + Sync,
    {
        let mut ids = index.ids();
        ids.sort();
        let neighbors = index.par_neighbors(&ids);

        let mut assigned: FxHashSet<Id> = FxHashSet::default();
        let mut clusters: Vec<Cluster<Id>> = Vec::new();
        for (id, hits) in ids.iter().zip(neighbors) {
            if assigned.contains(id) {
                continue;
            }
            let mut members: Vec<Id> = hits.into_iter().filter(|h| !assigned.contains(h)).collect();
            if members.len() < self.min_cluster_size {
                continue;
            }
            members.sort();
            members.dedup();
            let representative = match index.representative(&members) {
                Some(r) => r,
                None => id.clone(),
            };
            assigned.extend(members.iter().cloned());
            clusters.push(Cluster {
                cluster_id: clusters.len(),
                ids: members,
                representative,
            });
        }
        debug!(
            ids = ids.len(),
            clusters = clusters.len(),
            clustered = assigned.len(),
            "clustering done"
        );
        clusters
    }
}

/// id -> cluster id, for every clustered id.
pub fn cluster_assignments<Id: Hash + Eq + Clone>(clusters: &[Cluster<Id>]) -> HashMap<Id, usize> {
    clusters
        .iter()
        .flat_map(|c| c.ids.iter().map(move |id| (id.clone(), c.cluster_id)))
        .collect()
}
