use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{LshError, Result};

/// Fixed-size worker pool shared by the bulk operations of one index.
///
/// Work is submitted as a whole batch and joined before the call returns, so no
/// thread outlives the call that used it.
#[derive(Debug)]
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    /// `num_threads == 0` means one worker per available CPU.
    pub fn new(num_threads: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("lsh-worker-{}", i))
            .build()
            .map_err(|e| LshError::ThreadPool(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `op` with this pool as the current rayon pool.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    /// Maps every item on the pool. Output slot `i` belongs to input `i`.
    pub fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        self.install(|| items.par_iter().map(|item| f(item)).collect())
    }

    /// Like [`WorkerPool::map`] for fallible work. Every item runs to completion;
    /// if any failed, the failure with the lowest input position is returned.
    pub fn try_map<T, R, F>(&self, items: &[T], f: F) -> Result<Vec<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(usize, &T) -> Result<R> + Sync + Send,
    {
        let results: Vec<Result<R>> = self.install(|| {
            items
                .par_iter()
                .enumerate()
                .map(|(i, item)| f(i, item))
                .collect()
        });
        collect_in_order(results)
    }
}

/// First error in input order wins, otherwise all values in order.
pub(crate) fn collect_in_order<R>(results: Vec<Result<R>>) -> Result<Vec<R>> {
    let mut out = Vec::with_capacity(results.len());
    for result in results {
        out.push(result?);
    }
    Ok(out)
}
