//! Error types.
//!
//! Every failure is classified into an [`ErrorKind`] so that drivers can tell a programming error
//! (which aborts the whole run) apart from an unavailable or misbehaving environment (which only
//! skips the kernel variant that hit it).

use thiserror::Error;

/// Broad category of a [`LabError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A precondition of the called function was violated.
    InvalidArgument,
    /// The compute environment (platform, device, I/O) could not serve the request.
    Environment,
}

/// Error type for partitioning, kernels and drivers.
#[derive(Debug, Error)]
pub enum LabError {
    /// A partition was requested with no workers.
    #[error("worker count must be at least 1")]
    NoWorkers,

    /// A worker index outside of `[0, workers)` was requested.
    #[error("worker index {index} out of range for {workers} workers")]
    WorkerOutOfRange {
        /// Requested worker index
        index: usize,
        /// Number of workers
        workers: usize,
    },

    /// A vector stride of zero was given.
    #[error("stride `{name}` must be at least 1")]
    ZeroStride {
        /// Name of the stride argument
        name: &'static str,
    },

    /// Operand shapes are incompatible.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// The worker thread pool could not be spawned.
    #[error("cannot build worker pool: {0}")]
    ThreadPool(String),

    /// No OpenCL platform matched the requested name.
    #[error("no OpenCL platform matching `{0}`")]
    PlatformNotFound(String),

    /// The selected platform exposes no device of the requested type.
    #[error("no {device} device on platform `{platform}`")]
    DeviceNotFound {
        /// Requested device type
        device: String,
        /// Name of the searched platform
        platform: String,
    },

    /// The kernel cannot run with the given element type on this device.
    #[error("unsupported kernel configuration: {0}")]
    Unsupported(String),

    /// Error reported by the OpenCL binding.
    #[error("OpenCL: {0}")]
    Device(String),

    /// I/O error while writing reports.
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
}

impl LabError {
    /// Returns the category of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoWorkers
            | Self::WorkerOutOfRange { .. }
            | Self::ZeroStride { .. }
            | Self::ShapeMismatch(_) => ErrorKind::InvalidArgument,
            Self::ThreadPool(_)
            | Self::PlatformNotFound(_)
            | Self::DeviceNotFound { .. }
            | Self::Unsupported(_)
            | Self::Device(_)
            | Self::Io(_) => ErrorKind::Environment,
        }
    }

    /// Wraps an error reported by the OpenCL runtime (device queries, program builds...).
    pub fn device(err: impl std::fmt::Display) -> Self {
        Self::Device(err.to_string())
    }

    /// Whether the error only concerns the variant that raised it.
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::Environment
    }
}

impl From<ocl::Error> for LabError {
    fn from(err: ocl::Error) -> Self {
        Self::device(err)
    }
}

impl From<rayon::ThreadPoolBuildError> for LabError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Self::ThreadPool(err.to_string())
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, LabError>;
