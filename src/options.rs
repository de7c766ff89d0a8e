//! Tuning knobs shared by the parallel phases.

/// Controls how the selection and merge phases split their work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MergeOptions {
    /// Worker count. `0` uses every hardware thread, `1` runs sequentially.
    pub num_threads: usize,
    /// Inputs of at most this many items are processed on the calling thread.
    pub min_chunk_size: usize,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self { num_threads: 0, min_chunk_size: 1 }
    }
}

impl MergeOptions {
    /// Single threaded options, handy for reproducible debugging.
    pub const fn sequential() -> Self {
        Self { num_threads: 1, min_chunk_size: 1 }
    }

    pub const fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub const fn with_min_chunk_size(mut self, min_chunk_size: usize) -> Self {
        self.min_chunk_size = min_chunk_size;
        self
    }

    /// Worker count with `0` resolved to the number of hardware threads.
    pub fn effective_threads(&self) -> usize {
        match self.num_threads {
            0 => std::thread::available_parallelism().map_or(1, |n| n.get()),
            n => n,
        }
    }
}
