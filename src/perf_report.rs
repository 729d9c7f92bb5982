//! Performance report related structures and functions.
//!
//! This module defines all the necessary data structures and functions needed to generate
//! performance reports out of the recorded execution times of the benchmarked kernels.

use crate::utils::Discrepancy;

use statistical::{mean, standard_deviation};

use std::{fmt, io::Write};

/// Enum defining the target of kernel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TargetKind {
    Host,
    Device,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::Device => write!(f, "device"),
        }
    }
}

/// List of implemented kernels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum KernelKind {
    Saxpy,
    Daxpy,
    Sgemm,
    Dgemm,
}

impl KernelKind {
    /// Size in bytes of the kernel's floating-point elements.
    fn elem_size(&self) -> usize {
        match self {
            Self::Saxpy | Self::Sgemm => std::mem::size_of::<f32>(),
            Self::Daxpy | Self::Dgemm => std::mem::size_of::<f64>(),
        }
    }
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Saxpy => write!(f, "saxpy"),
            Self::Daxpy => write!(f, "daxpy"),
            Self::Sgemm => write!(f, "sgemm"),
            Self::Dgemm => write!(f, "dgemm"),
        }
    }
}

/// Marker trait for kernel variants (i.e. implementations).
pub trait KernelVariant {}

/// Host-specific possible kernel implementations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HostKernelVariant {
    SeqNaive,
    SeqIter,
    ParIter,
    ParPartitioned,
}

impl HostKernelVariant {
    pub const ALL: [Self; 4] = [
        Self::SeqNaive,
        Self::SeqIter,
        Self::ParIter,
        Self::ParPartitioned,
    ];

    pub fn is_sequential(&self) -> bool {
        matches!(self, Self::SeqNaive | Self::SeqIter)
    }
}

impl KernelVariant for HostKernelVariant {}

impl fmt::Display for HostKernelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SeqNaive => write!(f, "Sequential naive"),
            Self::SeqIter => write!(f, "Sequential w/ iterators"),
            Self::ParIter => write!(f, "Parallel w/ iterators"),
            Self::ParPartitioned => write!(f, "Parallel w/ static partitioning"),
        }
    }
}

/// Device-specific possible kernel implementations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DeviceKernelVariant {
    ClNaive,
    ClTiled,
    ClImage,
}

impl DeviceKernelVariant {
    pub const ALL: [Self; 3] = [Self::ClNaive, Self::ClTiled, Self::ClImage];
}

impl KernelVariant for DeviceKernelVariant {}

impl fmt::Display for DeviceKernelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClNaive => write!(f, "OpenCL naive"),
            Self::ClTiled => write!(f, "OpenCL tiled"),
            Self::ClImage => write!(f, "OpenCL image"),
        }
    }
}

/// Performance information and statistics of a benchmark.
#[derive(Clone, Debug)]
pub struct PerfReport<V> {
    /// Target platform: either `Host` or `Device`.
    target: TargetKind,
    /// Benchmarked kernel.
    kernel: KernelKind,
    /// Implementation variant of the kernel.
    variant: V,
    /// Free-form run parameters (worker count, device type, local work size...).
    detail: String,
    /// Number of elements per dimension.
    nb_elems_per_dim: usize,
    /// Size in bytes.
    nb_bytes: usize,
    /// Number of floating-point operations.
    nb_flops: usize,
    /// Minimum recorded runtime in milliseconds.
    min_time: f64,
    /// Median recorded runtime in milliseconds.
    median_time: f64,
    /// Maximum recorded runtime in milliseconds.
    max_time: f64,
    /// Average runtime in milliseconds.
    avg_time: f64,
    /// Runtime standard deviation.
    stddev_time: f64,
    /// Arithmetic intensity in FLOPs/byte.
    arithmetic_intensity: f64,
    /// Memory bandwidth in GiB/s.
    memory_bandwidth: f64,
    /// Computational performance in GFLOP/s.
    computational_performance: f64,
    /// Largest absolute difference with the reference result.
    max_diff: Option<f64>,
}

impl<V> PerfReport<V> {
    pub fn print_csv_header(output: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            output,
            "target,kernel,variant,detail,elems_per_dim,Bytes,FLOPs,min_runtime,median_runtime,max_runtime,avg_runtime,stddev,FLOPs/Byte,GiB/s,GFLOP/s,max_diff"
        )
    }

    pub fn variant(&self) -> &V {
        &self.variant
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn nb_bytes(&self) -> usize {
        self.nb_bytes
    }

    pub fn nb_flops(&self) -> usize {
        self.nb_flops
    }

    pub fn max_diff(&self) -> Option<f64> {
        self.max_diff
    }
}

impl<V> PerfReport<V>
where
    V: KernelVariant,
{
    /// Creates a new `PerfReport` given a target, a kernel, its variant, the number of elements
    /// per dimension, the number of computed output elements and the recorded execution times
    /// (in seconds).
    ///
    /// `durations` must hold at least two measurements.
    pub fn new(
        target: TargetKind,
        kernel: KernelKind,
        variant: V,
        nb_elems_per_dim: usize,
        nb_outputs: usize,
        durations: &mut [f64],
    ) -> Self {
        // Sort durations to avoid having to do two passes to get both min and max elements
        durations.sort_by(f64::total_cmp);

        let min_time = *durations.first().expect("Failed to get minimum duration") * 1e3;
        let median_time = *durations
            .get(durations.len() / 2)
            .expect("Failed to get median duration")
            * 1e3;
        let max_time = *durations.last().expect("Failed to get maximum duration") * 1e3;
        let avg_time = mean(durations);
        let stddev_time = standard_deviation(durations, Some(avg_time));

        // Every output element reads two operands and writes one, AXPY does one multiply-add per
        // output and GEMM `nb_elems_per_dim` of them.
        let nb_bytes = 3 * kernel.elem_size() * nb_outputs;
        let nb_flops = match kernel {
            KernelKind::Saxpy | KernelKind::Daxpy => 2 * nb_outputs,
            KernelKind::Sgemm | KernelKind::Dgemm => 2 * nb_elems_per_dim * nb_outputs,
        };

        let memory_bandwidth = nb_bytes as f64 / 1024_f64.powi(3) / avg_time;
        let arithmetic_intensity = nb_flops as f64 / nb_bytes as f64;
        let computational_performance = nb_flops as f64 / (1e9 * avg_time);

        let avg_time = avg_time * 1e3;

        Self {
            target,
            kernel,
            variant,
            detail: String::new(),
            nb_elems_per_dim,
            nb_bytes,
            nb_flops,
            min_time,
            median_time,
            max_time,
            avg_time,
            stddev_time,
            memory_bandwidth,
            arithmetic_intensity,
            computational_performance,
            max_diff: None,
        }
    }

    /// Attaches run parameters to the report.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    /// Attaches the comparison against the reference result to the report.
    pub fn with_discrepancy(mut self, discrepancy: Discrepancy) -> Self {
        self.max_diff = Some(discrepancy.diff);
        self
    }
}

impl<V: fmt::Display> fmt::Display for PerfReport<V>
where
    V: KernelVariant,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{},{},{:18.15},{:18.15},{:18.15},{:18.15},{},{},{},{},",
            self.target,
            self.kernel,
            self.variant,
            self.detail,
            self.nb_elems_per_dim,
            self.nb_bytes,
            self.nb_flops,
            self.min_time,
            self.median_time,
            self.max_time,
            self.avg_time,
            self.stddev_time,
            self.arithmetic_intensity,
            self.memory_bandwidth,
            self.computational_performance,
        )?;
        match self.max_diff {
            Some(diff) => write!(f, "{diff}"),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axpy_metrics() {
        let mut durations = [0.002, 0.001, 0.003];
        let report = PerfReport::new(
            TargetKind::Host,
            KernelKind::Daxpy,
            HostKernelVariant::SeqNaive,
            1024,
            512,
            &mut durations,
        );

        assert_eq!(report.nb_bytes(), 3 * 8 * 512);
        assert_eq!(report.nb_flops(), 2 * 512);
        assert!((report.min_time - 1.0).abs() < 1e-9);
        assert!((report.median_time - 2.0).abs() < 1e-9);
        assert!((report.max_time - 3.0).abs() < 1e-9);
        assert!((report.avg_time - 2.0).abs() < 1e-9);
        assert_eq!(durations, [0.001, 0.002, 0.003]);
    }

    #[test]
    fn gemm_metrics() {
        let mut durations = [1.0, 1.0];
        let report = PerfReport::new(
            TargetKind::Device,
            KernelKind::Sgemm,
            DeviceKernelVariant::ClTiled,
            64,
            64 * 64,
            &mut durations,
        );

        assert_eq!(report.nb_bytes(), 3 * 4 * 64 * 64);
        assert_eq!(report.nb_flops(), 2 * 64 * 64 * 64);
        assert!((report.computational_performance - 2.0 * 64_f64.powi(3) / 1e9).abs() < 1e-12);
    }

    #[test]
    fn reports_are_debuggable() {
        let report = PerfReport::new(
            TargetKind::Host,
            KernelKind::Dgemm,
            HostKernelVariant::ParPartitioned,
            8,
            64,
            &mut [0.5, 0.25],
        );
        let debug = format!("{report:?}");
        assert!(debug.starts_with("PerfReport {"));
        assert!(debug.contains("ParPartitioned"));
    }

    #[test]
    fn csv_row_matches_header() {
        let mut durations = [0.5, 0.25];
        let report = PerfReport::new(
            TargetKind::Host,
            KernelKind::Saxpy,
            HostKernelVariant::ParPartitioned,
            16,
            16,
            &mut durations,
        )
        .with_detail("workers=8")
        .with_discrepancy(Discrepancy {
            diff: 0.0,
            index: 0,
            expected: 1.0,
            actual: 1.0,
        });

        let mut header = Vec::new();
        PerfReport::<()>::print_csv_header(&mut header).unwrap();
        let header = String::from_utf8(header).unwrap();

        let row = report.to_string();
        assert!(row.starts_with("host,saxpy,Parallel w/ static partitioning,workers=8,16,"));
        assert!(row.ends_with(",0"));
        assert_eq!(
            row.split(',').count(),
            header.trim_end().split(',').count()
        );
    }
}
