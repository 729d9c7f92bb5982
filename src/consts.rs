//! Crate-level constants.

/// Default number of meta repetitions performed when benchmarking a kernel.
pub const META_REPETITIONS: u8 = 31;

/// Default number of tight loop repetitions performed when benchmarking a kernel.
pub const TIGHT_LOOP_REPETITIONS: u16 = 1;

/// Default number of workers used by the partitioned host kernels.
pub const NB_WORKERS: usize = 8;

/// Smallest local work size tried by the device AXPY sweep.
pub const MIN_LOCAL_WORK_SIZE: usize = 8;

/// Largest local work size tried by the device AXPY sweep.
pub const MAX_LOCAL_WORK_SIZE: usize = 256;

/// Matrix tile size (edge of the square local work-group) for device GEMMs, passed to the OpenCL
/// compiler as `BLOCK_SIZE`.
pub const BLOCK_SIZE_2D: usize = 16;

/// Maximum absolute difference tolerated between a variant and the reference.
pub const TOLERANCE: f64 = 0.01;

/// Timed sequential GEMMs are skipped above this size to avoid very long runtimes.
pub const MAX_SEQ_GEMM_SIZE: usize = 512;
