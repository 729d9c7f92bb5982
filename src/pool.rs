//! Fixed-size fork-join worker pool.
//!
//! A [`WorkerPool`] owns a dedicated [`rayon`][1] thread pool with exactly as many threads as
//! workers, and a [`RangePartitioner`] for that worker count. Each parallel region splits the
//! output buffer into disjoint chunks (one per worker), spawns one task per chunk and joins them
//! all before returning. Workers never synchronize with each other.
//!
//! [1]: https://crates.io/crates/rayon

use crate::{
    error::Result,
    partition::{Grid2D, GridRange, RangePartitioner, WorkRange},
};

use rayon::{ThreadPool, ThreadPoolBuilder};

/// Thread pool running statically partitioned parallel regions.
pub struct WorkerPool {
    partitioner: RangePartitioner,
    pool: ThreadPool,
}

impl WorkerPool {
    /// Spawns a pool of `workers` threads.
    pub fn new(workers: usize) -> Result<Self> {
        let partitioner = RangePartitioner::new(workers)?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("worker-{index}"))
            .build()?;

        Ok(Self { partitioner, pool })
    }

    pub fn workers(&self) -> usize {
        self.partitioner.workers()
    }

    pub fn partitioner(&self) -> &RangePartitioner {
        &self.partitioner
    }

    /// Runs `op` within the pool, so that `rayon` parallel iterators called from `op` run on the
    /// pool's threads.
    pub fn install<R, OP>(&self, op: OP) -> R
    where
        R: Send,
        OP: FnOnce() -> R + Send,
    {
        self.pool.install(op)
    }

    /// Runs `f` once per worker over its share of `[0, total_work)`.
    ///
    /// Worker `k` owning `[start, end)` receives `data[start * stride..end * stride]` (clamped to
    /// `data`), so that work item `i` maps to `chunk[(i - start) * stride]`.
    pub fn for_each_chunk<T, F>(&self, data: &mut [T], total_work: usize, stride: usize, f: F)
    where
        T: Send,
        F: Fn(WorkRange, &mut [T]) + Sync,
    {
        let chunks = self.partitioner.split_mut(data, total_work, stride);
        let f = &f;

        self.pool.scope(|s| {
            for (range, chunk) in chunks {
                s.spawn(move |_| f(range, chunk));
            }
        });
    }

    /// Runs `f` once per worker over its share of the row-major `grid` stored in `data`.
    ///
    /// The chunk handed to `f` starts at the first cell of the worker's range, i.e. cell
    /// `(row, col)` lives at `chunk[row * grid.cols() + col - range.flat().start]`.
    pub fn for_each_grid_chunk<T, F>(&self, data: &mut [T], grid: Grid2D, f: F)
    where
        T: Send,
        F: Fn(GridRange, &mut [T]) + Sync,
    {
        let ranges = self.partitioner.grid_ranges(grid);
        let chunks = self.partitioner.split_mut(data, grid.len(), 1);
        let f = &f;

        self.pool.scope(|s| {
            for (range, (_, chunk)) in ranges.zip(chunks) {
                s.spawn(move |_| f(range, chunk));
            }
        });
    }
}
