//! Parallel processing strategies

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Processing mode for block remapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// Single-threaded processing
    Sequential,
    /// Parallel processing using all available cores
    #[default]
    Parallel,
    /// Parallel with specified number of threads
    ParallelWith(usize),
}

/// Maps batches of independent work items under a [`ProcessingMode`].
///
/// A dedicated pool for `ParallelWith` is built once and reused for every batch.
pub struct BatchRunner {
    mode: ProcessingMode,
    pool: Option<rayon::ThreadPool>,
}

impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner").field("mode", &self.mode).finish()
    }
}

impl BatchRunner {
    pub fn new(mode: ProcessingMode) -> Self {
        let (mode, pool) = match mode {
            ProcessingMode::ParallelWith(0) | ProcessingMode::ParallelWith(1) => {
                (ProcessingMode::Sequential, None)
            }
            ProcessingMode::ParallelWith(threads) => {
                match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
                    Ok(pool) => (mode, Some(pool)),
                    Err(e) => {
                        tracing::warn!(threads, error = %e, "cannot build thread pool, running sequentially");
                        (ProcessingMode::Sequential, None)
                    }
                }
            }
            other => (other, None),
        };
        Self { mode, pool }
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    /// How many items a batch should hold to keep every worker busy once.
    pub fn batch_size(&self) -> usize {
        match self.mode {
            ProcessingMode::Sequential => 1,
            ProcessingMode::Parallel => rayon::current_num_threads().max(1),
            ProcessingMode::ParallelWith(threads) => threads,
        }
    }

    /// Map `f` over `items`, keeping input order. The first error wins.
    pub fn try_map<T, U, E, F>(&self, items: Vec<T>, f: F) -> Result<Vec<U>, E>
    where
        T: Send,
        U: Send,
        E: Send,
        F: Fn(T) -> Result<U, E> + Sync + Send,
    {
        match (&self.mode, &self.pool) {
            (ProcessingMode::Sequential, _) => items.into_iter().map(f).collect(),
            (_, Some(pool)) => pool.install(|| items.into_par_iter().map(f).collect()),
            (_, None) => items.into_par_iter().map(f).collect(),
        }
    }
}
