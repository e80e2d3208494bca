//! Execution of independent per-year units

use crate::error::{PipelineError, Result};
use rayon::prelude::*;

/// How independent units of a stage are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// One unit after the other on the calling thread
    Sequential,
    /// Rayon's global pool
    #[default]
    Parallel,
    /// A dedicated pool with the given number of threads
    ParallelWith(usize),
}

impl ProcessingMode {
    /// `None` or `Some(0)` use every core, `Some(1)` runs sequentially
    pub fn from_jobs(jobs: Option<usize>) -> Self {
        match jobs {
            None | Some(0) => ProcessingMode::Parallel,
            Some(1) => ProcessingMode::Sequential,
            Some(n) => ProcessingMode::ParallelWith(n),
        }
    }

    /// Apply `f` to every item, keeping input order in the output
    pub fn map<I, T, F>(&self, items: &[I], f: F) -> Result<Vec<T>>
    where
        I: Sync,
        T: Send,
        F: Fn(&I) -> T + Sync + Send,
    {
        match self {
            ProcessingMode::Sequential => Ok(items.iter().map(f).collect()),
            ProcessingMode::Parallel => Ok(items.par_iter().map(f).collect()),
            ProcessingMode::ParallelWith(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(*threads)
                    .build()
                    .map_err(|e| PipelineError::Config(format!("cannot build thread pool: {}", e)))?;
                Ok(pool.install(|| items.par_iter().map(f).collect()))
            }
        }
    }
}
