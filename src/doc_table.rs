use std::hash::Hash;

use dashmap::mapref::one::Ref;
use dashmap::DashMap;
use fxhash::FxBuildHasher;
use rayon::prelude::*;

/// Id -> stored signature. Owns the only copy of every signature in an index.
///
/// Backed by a sharded concurrent map so bulk inserts can publish entries from
/// several workers at once.
#[derive(Debug)]
pub struct DocumentTable<Id, Sig>
where
    Id: Hash + Eq,
{
    entries: DashMap<Id, Sig, FxBuildHasher>,
}

impl<Id, Sig> DocumentTable<Id, Sig>
where
    Id: Hash + Eq + Clone,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::with_hasher(FxBuildHasher::default()),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::with_capacity_and_hasher(capacity, FxBuildHasher::default()),
        }
    }

    /// Stores `signature`, returning the one it replaced.
    pub fn put(&self, id: Id, signature: Sig) -> Option<Sig> {
        self.entries.insert(id, signature)
    }

    pub fn get(&self, id: &Id) -> Option<Ref<'_, Id, Sig>> {
        self.entries.get(id)
    }

    pub fn delete(&self, id: &Id) -> Option<Sig> {
        self.entries.remove(id).map(|(_, sig)| sig)
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn shrink_to_fit(&self) {
        self.entries.shrink_to_fit();
    }

    /// Snapshot of every stored id.
    pub fn ids(&self) -> Vec<Id> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }
}

impl<Id, Sig> DocumentTable<Id, Sig>
where
    Id: Hash + Eq + Clone + Send + Sync,
    Sig: Send + Sync,
{
    /// Publishes a batch of entries from the current rayon pool.
    pub fn par_put_all(&self, entries: Vec<(Id, Sig)>) {
        entries.into_par_iter().for_each(|(id, sig)| {
            self.entries.insert(id, sig);
        });
    }
}

impl<Id, Sig> Default for DocumentTable<Id, Sig>
where
    Id: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
