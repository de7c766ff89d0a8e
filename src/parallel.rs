//! Fixed thread-count chunk executor.
//!
//! The index range `[0, size)` is cut into contiguous, nearly equal ranges, one
//! per worker, with the remainder spread over the first workers. Each worker
//! returns its own batch; batches are handed back in range order once every
//! worker has finished, so no accumulator is shared between workers.
//!
//! With the `parallel` feature the ranges run on a dedicated `rayon` pool of
//! exactly `num_threads` threads. Without it they run one after the other on
//! the calling thread.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::errors::MergeError;
use crate::options::MergeOptions;
use std::ops::Range;

/// Splits `[0, size)` into at most `num_threads` contiguous ranges.
///
/// A single range is returned when `num_threads <= 1` or when `size` does not
/// exceed `min_chunk_size`. Empty ranges are never produced for `size > 0`.
pub fn partition(size: usize, num_threads: usize, min_chunk_size: usize) -> Vec<Range<usize>> {
    if num_threads <= 1 || size <= min_chunk_size {
        return vec![0..size];
    }
    let workers = num_threads.min(size);
    let shift = size / workers;
    let remainder = size % workers;

    let mut ranges = Vec::with_capacity(workers);
    let mut start = 0;
    for ix in 0..workers {
        let end = start + shift + usize::from(ix < remainder);
        ranges.push(start..end);
        start = end;
    }
    ranges
}

/// Worker threads shared by every phase of a merge.
///
/// With the `parallel` feature and more than one thread, the rayon pool is
/// built once here and reused by each [`WorkerPool::parallel_for`] call.
#[derive(Debug)]
pub struct WorkerPool {
    threads: usize,
    min_chunk_size: usize,
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
}

impl WorkerPool {
    pub fn new(options: &MergeOptions) -> Result<Self, MergeError> {
        let threads = options.effective_threads();
        #[cfg(feature = "parallel")]
        let pool = if threads > 1 {
            Some(rayon::ThreadPoolBuilder::new().num_threads(threads).build()?)
        } else {
            None
        };
        Ok(Self {
            threads,
            min_chunk_size: options.min_chunk_size,
            #[cfg(feature = "parallel")]
            pool,
        })
    }

    pub const fn threads(&self) -> usize {
        self.threads
    }

    /// Runs `worker` over every range of `[0, size)` and returns the per-range
    /// batches in range order.
    ///
    /// Every worker runs to completion even if a sibling fails. When one or more
    /// workers fail, exactly one failure is returned (the one with the lowest
    /// range) wrapped in [`MergeError::WorkerFailure`]; the other batches are
    /// discarded.
    pub fn parallel_for<T, F>(&self, size: usize, worker: F) -> Result<Vec<T>, MergeError>
    where
        T: Send,
        F: Fn(Range<usize>) -> Result<T, MergeError> + Sync,
    {
        let ranges = partition(size, self.threads, self.min_chunk_size);
        let outcomes = self.run_chunks(&ranges, &worker);

        let mut batches = Vec::with_capacity(outcomes.len());
        for (range, outcome) in ranges.into_iter().zip(outcomes) {
            match outcome {
                Ok(batch) => batches.push(batch),
                Err(error) => {
                    return Err(MergeError::WorkerFailure {
                        start: range.start,
                        end: range.end,
                        source: Box::new(error),
                    });
                },
            }
        }
        Ok(batches)
    }

    #[cfg(feature = "parallel")]
    fn run_chunks<T, F>(&self, ranges: &[Range<usize>], worker: &F) -> Vec<Result<T, MergeError>>
    where
        T: Send,
        F: Fn(Range<usize>) -> Result<T, MergeError> + Sync,
    {
        match &self.pool {
            Some(pool) if ranges.len() > 1 => {
                pool.install(|| ranges.par_iter().cloned().map(|range| worker(range)).collect())
            },
            _ => ranges.iter().cloned().map(worker).collect(),
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn run_chunks<T, F>(&self, ranges: &[Range<usize>], worker: &F) -> Vec<Result<T, MergeError>>
    where
        T: Send,
        F: Fn(Range<usize>) -> Result<T, MergeError> + Sync,
    {
        ranges.iter().cloned().map(worker).collect()
    }
}

/// One-off [`WorkerPool::parallel_for`] on a pool built from `options`.
pub fn parallel_for<T, F>(size: usize, options: &MergeOptions, worker: F) -> Result<Vec<T>, MergeError>
where
    T: Send,
    F: Fn(Range<usize>) -> Result<T, MergeError> + Sync,
{
    WorkerPool::new(options)?.parallel_for(size, worker)
}
