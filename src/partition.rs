//! Static range partitioning.
//!
//! This module splits a flat range of work items `[0, total_work)` into one contiguous chunk per
//! worker. Every worker receives `total_work / workers` items and the last worker additionally
//! absorbs the remainder, so the last worker may process up to `workers - 1` more items than the
//! others. There is no load balancing: the result only depends on `(total_work, workers, index)`.
//!
//! The 2-D flavour maps the flat chunks onto a row-major grid (e.g. the cells of a GEMM output
//! matrix). Consumers should iterate a [`GridRange`] with [`GridRange::row_spans`], which covers
//! exactly the cells of the flat chunk, including chunks starting or ending in the middle of a row.

use crate::error::{LabError, Result};

use std::ops::Range;

/// Half-open range of work items `[start, end)` assigned to a single worker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct WorkRange {
    pub start: usize,
    pub end: usize,
}

impl WorkRange {
    /// Number of work items in the range.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, item: usize) -> bool {
        (self.start..self.end).contains(&item)
    }

    /// Returns the range as a standard iterable range.
    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Row-major grid of `rows * cols` work items.
///
/// The number of cells always fits in a `usize`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Grid2D {
    rows: usize,
    cols: usize,
}

impl Grid2D {
    /// Creates a `rows x cols` grid, failing if its number of cells overflows.
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        match rows.checked_mul(cols) {
            Some(_) => Ok(Self { rows, cols }),
            None => Err(LabError::ShapeMismatch(format!(
                "{rows}x{cols} grid has too many cells"
            ))),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Total number of cells in the grid.
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bounds of a worker's chunk of a [`Grid2D`].
///
/// `start_row`/`start_col` locate the first cell of the chunk. `end_row` is `end / cols` and
/// `end_col` is `end % cols`, except that a chunk ending on a row boundary reports `cols`
/// instead of `0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridRange {
    pub start_row: usize,
    pub start_col: usize,
    pub end_row: usize,
    pub end_col: usize,
    flat: WorkRange,
    cols: usize,
}

impl GridRange {
    fn from_flat(flat: WorkRange, cols: usize) -> Self {
        // An empty-width grid has no cells, every chunk is empty
        if cols == 0 {
            return Self {
                start_row: 0,
                start_col: 0,
                end_row: 0,
                end_col: 0,
                flat,
                cols,
            };
        }

        Self {
            start_row: flat.start / cols,
            start_col: flat.start % cols,
            end_row: flat.end / cols,
            end_col: match flat.end % cols {
                0 => cols,
                rem => rem,
            },
            flat,
            cols,
        }
    }

    /// Flat (row-major) range of cells this chunk was derived from.
    pub fn flat(&self) -> WorkRange {
        self.flat
    }

    /// Iterates over the rows touched by the chunk, yielding each row index together with the
    /// span of columns of that row that belong to the chunk.
    pub fn row_spans(&self) -> impl Iterator<Item = (usize, Range<usize>)> {
        let WorkRange { start, end } = self.flat;
        let cols = self.cols;
        let first_row = start.checked_div(cols).unwrap_or(0);

        (first_row..)
            .take_while(move |row| row * cols < end)
            .map(move |row| {
                let row_start = row * cols;
                let lo = start.max(row_start) - row_start;
                let hi = end.min(row_start + cols) - row_start;
                (row, lo..hi)
            })
    }

    /// Iterates over the `(row, col)` coordinates of every cell of the chunk, in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> {
        self.row_spans()
            .flat_map(|(row, cols)| cols.map(move |col| (row, col)))
    }
}

/// Computes the chunk of `[0, total_work)` assigned to worker `index` out of `workers`.
pub fn partition_1d(total_work: usize, workers: usize, index: usize) -> Result<WorkRange> {
    if workers == 0 {
        return Err(LabError::NoWorkers);
    }
    if index >= workers {
        return Err(LabError::WorkerOutOfRange { index, workers });
    }

    Ok(chunk(total_work, workers, index))
}

// Caller guarantees `index < workers`.
fn chunk(total_work: usize, workers: usize, index: usize) -> WorkRange {
    let base = total_work / workers;
    let remainder = if index == workers - 1 {
        total_work % workers
    } else {
        0
    };

    WorkRange {
        start: index * base,
        end: (index + 1) * base + remainder,
    }
}

/// Computes the chunk of `grid` assigned to worker `index` out of `workers`.
pub fn partition_2d(grid: Grid2D, workers: usize, index: usize) -> Result<GridRange> {
    let flat = partition_1d(grid.len(), workers, index)?;
    Ok(GridRange::from_flat(flat, grid.cols))
}

/// Partitioner bound to a fixed number of workers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RangePartitioner {
    workers: usize,
}

impl RangePartitioner {
    /// Creates a partitioner for `workers` workers, failing if there are none.
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(LabError::NoWorkers);
        }
        Ok(Self { workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Chunk of `[0, total_work)` assigned to worker `index`.
    pub fn range(&self, total_work: usize, index: usize) -> Result<WorkRange> {
        partition_1d(total_work, self.workers, index)
    }

    /// Chunk of `grid` assigned to worker `index`.
    pub fn grid_range(&self, grid: Grid2D, index: usize) -> Result<GridRange> {
        partition_2d(grid, self.workers, index)
    }

    /// Chunks of `[0, total_work)` of all workers, in worker order.
    pub fn ranges(&self, total_work: usize) -> impl Iterator<Item = WorkRange> {
        let workers = self.workers;
        (0..workers).map(move |index| chunk(total_work, workers, index))
    }

    /// Chunks of `grid` of all workers, in worker order.
    pub fn grid_ranges(&self, grid: Grid2D) -> impl Iterator<Item = GridRange> {
        self.ranges(grid.len())
            .map(move |flat| GridRange::from_flat(flat, grid.cols))
    }

    /// Splits `data` into one disjoint mutable chunk per worker.
    ///
    /// Work item `i` is expected to touch `data[i * stride]`, so the chunk of the worker owning
    /// `[start, end)` is `data[start * stride..end * stride]`, clamped to the length of `data`.
    /// Chunks are returned in worker order alongside their range.
    pub fn split_mut<'a, T>(
        &self,
        data: &'a mut [T],
        total_work: usize,
        stride: usize,
    ) -> Vec<(WorkRange, &'a mut [T])> {
        let len = data.len();
        let mut rest = data;
        let mut chunks = Vec::with_capacity(self.workers);

        for range in self.ranges(total_work) {
            let lo = (range.start * stride).min(len);
            let hi = (range.end * stride).min(len);
            let (part, tail) = std::mem::take(&mut rest).split_at_mut(hi - lo);
            chunks.push((range, part));
            rest = tail;
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn last_worker_absorbs_remainder() {
        let partitioner = RangePartitioner::new(8).unwrap();
        let ranges: Vec<_> = partitioner.ranges(103).collect();

        for (index, range) in ranges.iter().enumerate().take(7) {
            assert_eq!(range.len(), 12);
            assert_eq!(range.start, index * 12);
        }
        assert_eq!(ranges[7], WorkRange { start: 84, end: 103 });
        assert_eq!(ranges[7].len(), 19);
    }

    #[test]
    fn zero_work_yields_empty_ranges() {
        for workers in 1..16 {
            for index in 0..workers {
                let range = partition_1d(0, workers, index).unwrap();
                assert_eq!(range, WorkRange { start: 0, end: 0 });
                assert!(range.is_empty());
            }
        }
    }

    #[test]
    fn single_worker_gets_everything() {
        assert_eq!(
            partition_1d(1000, 1, 0).unwrap(),
            WorkRange { start: 0, end: 1000 }
        );
    }

    #[test]
    fn more_workers_than_work() {
        let ranges: Vec<_> = (0..8).map(|i| partition_1d(5, 8, i).unwrap()).collect();
        assert!(ranges[..7].iter().all(WorkRange::is_empty));
        assert_eq!(ranges[7], WorkRange { start: 0, end: 5 });
    }

    #[test]
    fn invalid_arguments_fail_fast() {
        assert!(matches!(partition_1d(10, 0, 0), Err(LabError::NoWorkers)));
        assert!(matches!(
            partition_1d(10, 4, 4),
            Err(LabError::WorkerOutOfRange {
                index: 4,
                workers: 4
            })
        ));
        assert!(RangePartitioner::new(0).is_err());
        assert!(partition_2d(Grid2D::new(4, 4).unwrap(), 0, 0).is_err());
    }

    #[test]
    fn grid_chunks_ending_on_row_boundaries() {
        let grid = Grid2D::new(4, 4).unwrap();

        let first = partition_2d(grid, 2, 0).unwrap();
        assert_eq!(first.flat(), WorkRange { start: 0, end: 8 });
        assert_eq!(
            (first.start_row, first.start_col, first.end_row, first.end_col),
            (0, 0, 2, 4)
        );

        let second = partition_2d(grid, 2, 1).unwrap();
        assert_eq!(second.flat(), WorkRange { start: 8, end: 16 });
        assert_eq!(
            (second.start_row, second.start_col, second.end_row, second.end_col),
            (2, 0, 4, 4)
        );

        let spans: Vec<_> = second.row_spans().collect();
        assert_eq!(spans, vec![(2, 0..4), (3, 0..4)]);
    }

    #[test]
    fn grid_chunks_ending_mid_row() {
        // 3x5 grid, 4 workers: base = 3, last worker gets 3 + 3
        let grid = Grid2D::new(3, 5).unwrap();

        let second = partition_2d(grid, 4, 1).unwrap();
        assert_eq!(second.flat(), WorkRange { start: 3, end: 6 });
        assert_eq!(
            (second.start_row, second.start_col, second.end_row, second.end_col),
            (0, 3, 1, 1)
        );
        assert_eq!(
            second.row_spans().collect::<Vec<_>>(),
            vec![(0, 3..5), (1, 0..1)]
        );

        let last = partition_2d(grid, 4, 3).unwrap();
        assert_eq!(last.flat(), WorkRange { start: 9, end: 15 });
        assert_eq!(
            last.cells().collect::<Vec<_>>(),
            vec![(1, 4), (2, 0), (2, 1), (2, 2), (2, 3), (2, 4)]
        );
    }

    #[test]
    fn grid_ranges_match_per_worker_partition() {
        let grid = Grid2D::new(7, 9).unwrap();
        let partitioner = RangePartitioner::new(5).unwrap();
        for (index, range) in partitioner.grid_ranges(grid).enumerate() {
            assert_eq!(range, partitioner.grid_range(grid, index).unwrap());
        }
    }

    #[test]
    fn empty_grid_yields_no_cells() {
        let range = partition_2d(Grid2D::new(3, 0).unwrap(), 2, 1).unwrap();
        assert_eq!(range.cells().count(), 0);
        let range = partition_2d(Grid2D::new(0, 3).unwrap(), 2, 1).unwrap();
        assert_eq!(range.cells().count(), 0);
    }

    #[test]
    fn oversized_grid_is_rejected() {
        let err = Grid2D::new(usize::MAX, 2).unwrap_err();
        assert!(matches!(err, LabError::ShapeMismatch(_)));
        assert!(Grid2D::new(usize::MAX, 1).is_ok());
        assert!(Grid2D::new(usize::MAX, 0).unwrap().is_empty());
    }

    #[test]
    fn split_mut_follows_strided_ranges() {
        let partitioner = RangePartitioner::new(3).unwrap();
        let mut data: Vec<usize> = (0..10).collect();

        // 5 work items with a stride of 2: base = 1, last worker gets 3
        let chunks = partitioner.split_mut(&mut data, 5, 2);
        let lens: Vec<_> = chunks.iter().map(|(_, chunk)| chunk.len()).collect();
        assert_eq!(lens, vec![2, 2, 6]);
        assert_eq!(chunks[2].0, WorkRange { start: 2, end: 5 });
        assert_eq!(chunks[2].1[0], 4);
    }

    proptest! {
        #[test]
        fn ranges_cover_work_exactly(total_work in 0usize..5_000, workers in 1usize..64) {
            let partitioner = RangePartitioner::new(workers).unwrap();
            let mut next = 0;
            for (index, range) in partitioner.ranges(total_work).enumerate() {
                prop_assert_eq!(range, partition_1d(total_work, workers, index).unwrap());
                prop_assert_eq!(range.start, next);
                prop_assert!(range.start <= range.end);
                next = range.end;
            }
            prop_assert_eq!(next, total_work);
        }

        #[test]
        fn partition_is_deterministic(total_work in 0usize..100_000, workers in 1usize..128, seed in any::<usize>()) {
            let index = seed % workers;
            prop_assert_eq!(
                partition_1d(total_work, workers, index).unwrap(),
                partition_1d(total_work, workers, index).unwrap()
            );
        }

        #[test]
        fn grid_cells_are_owned_once(rows in 0usize..24, cols in 0usize..24, workers in 1usize..16) {
            let grid = Grid2D::new(rows, cols).unwrap();
            let mut owners = vec![0u32; grid.len()];
            for index in 0..workers {
                let range = partition_2d(grid, workers, index).unwrap();
                for (row, col) in range.cells() {
                    prop_assert!(row < rows && col < cols);
                    owners[row * cols + col] += 1;
                }
            }
            prop_assert!(owners.iter().all(|&n| n == 1));
        }
    }
}
