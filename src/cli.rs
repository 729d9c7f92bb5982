//! Command-Line Interface related code.
//!
//! This module handles the parsing of CLI arguments using the [`clap`][1] crate.
//! It defines the availables runtime options and subcommands.
//!
//! [1]: https://crates.io/crates/clap

use crate::consts;

use clap::{Parser, Subcommand, ValueEnum};

use std::{fmt, path::PathBuf};

/// Sequential, multi-threaded and OpenCL kernels side by side.
///
/// Benchmarks naive sequential, statically partitioned multi-threaded and OpenCL-accelerated
/// implementations of BLAS-like operations (AXPY and GEMM), compares each of them against a
/// sequential reference and reports timings as CSV.
#[derive(Clone, Debug, Parser)]
pub struct CliArgs {
    /// Number of meta-repetitions for the benchmark.
    #[arg(
        short,
        long,
        value_name = "META_REPS",
        default_value_t = consts::META_REPETITIONS,
        value_parser = clap::value_parser!(u8).range(2..u8::MAX.into()),
    )]
    pub meta_repetitions: u8,

    /// Number of repetitions of the tight loop.
    #[arg(
        short,
        long,
        value_name = "TIGHT_REPS",
        default_value_t = consts::TIGHT_LOOP_REPETITIONS,
        value_parser = clap::value_parser!(u16).range(1..u16::MAX.into()),
    )]
    pub tight_loop_repetitions: u16,

    /// Number of workers of the statically partitioned host kernels.
    #[arg(
        short,
        long,
        value_name = "WORKERS",
        default_value_t = consts::NB_WORKERS as u16,
        value_parser = clap::value_parser!(u16).range(1..u16::MAX.into()),
    )]
    pub workers: u16,

    /// Name (or part of the name) of the OpenCL platform to use, defaults to the first one.
    #[arg(short, long, value_name = "NAME")]
    pub platform: Option<String>,

    /// Types of OpenCL devices to offload the kernels to.
    #[arg(
        short,
        long,
        value_enum,
        value_delimiter = ',',
        default_values_t = [DeviceKind::Gpu, DeviceKind::Cpu],
    )]
    pub devices: Vec<DeviceKind>,

    /// Kernel command to run.
    #[command(subcommand)]
    pub kernel: KernelCmd,

    /// Output file, defaults to `stdout` if unspecified.
    #[arg(short, long)]
    pub output_file: Option<PathBuf>,

    /// Seed for the random number generator (RNG).
    #[arg(short, long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Enable debug logs (overridden by `RUST_LOG`).
    #[arg(short, long)]
    pub verbose: bool,
}

/// OpenCL device types that kernels can be offloaded to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DeviceKind {
    Gpu,
    Cpu,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpu => write!(f, "gpu"),
            Self::Cpu => write!(f, "cpu"),
        }
    }
}

/// List of available commands.
#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum KernelCmd {
    /// List the OpenCL platforms and their CPU and GPU devices.
    Platforms,
    /// Single-precision strided vector addition (SAXPY): `y[i * incy] += alpha * x[i * incx]`
    Saxpy {
        /// Lengths of the vectors.
        #[arg(
            short,
            long,
            required = true,
            num_args = 1..,
        )]
        lengths: Vec<usize>,
        /// Stride of `x`.
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        incx: u32,
        /// Stride of `y`.
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        incy: u32,
    },
    /// Double-precision strided vector addition (DAXPY): `y[i * incy] += alpha * x[i * incx]`
    Daxpy {
        /// Lengths of the vectors.
        #[arg(
            short,
            long,
            required = true,
            num_args = 1..,
        )]
        lengths: Vec<usize>,
        /// Stride of `x`.
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        incx: u32,
        /// Stride of `y`.
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        incy: u32,
    },
    /// Single-precision general matrix multiplication (SGEMM): `C = A * B`
    Sgemm {
        /// Size of the matrices.
        #[arg(
            short,
            long,
            required = true,
            num_args = 1..,
        )]
        sizes: Vec<usize>,
    },
    /// Double-precision general matrix multiplication (DGEMM): `C = A * B`
    Dgemm {
        /// Size of the matrices.
        #[arg(
            short,
            long,
            required = true,
            num_args = 1..,
        )]
        sizes: Vec<usize>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let args = CliArgs::try_parse_from(["parlab", "saxpy", "-l", "1024", "4096"]).unwrap();
        assert_eq!(args.meta_repetitions, consts::META_REPETITIONS);
        assert_eq!(usize::from(args.workers), consts::NB_WORKERS);
        assert_eq!(args.devices, vec![DeviceKind::Gpu, DeviceKind::Cpu]);
        assert_eq!(
            args.kernel,
            KernelCmd::Saxpy {
                lengths: vec![1024, 4096],
                incx: 1,
                incy: 1
            }
        );
    }

    #[test]
    fn strides_and_devices() {
        let args = CliArgs::try_parse_from([
            "parlab", "-w", "4", "-d", "gpu", "-p", "Intel", "daxpy", "-l", "100", "--incx", "2",
        ])
        .unwrap();
        assert_eq!(args.workers, 4);
        assert_eq!(args.devices, vec![DeviceKind::Gpu]);
        assert_eq!(args.platform.as_deref(), Some("Intel"));
        assert!(matches!(
            args.kernel,
            KernelCmd::Daxpy {
                incx: 2,
                incy: 1,
                ..
            }
        ));

        let args = CliArgs::try_parse_from(["parlab", "-d", "cpu,gpu", "sgemm", "-s", "64"]).unwrap();
        assert_eq!(args.devices, vec![DeviceKind::Cpu, DeviceKind::Gpu]);
        assert_eq!(args.kernel, KernelCmd::Sgemm { sizes: vec![64] });
    }

    #[test]
    fn zero_workers_and_strides_are_rejected() {
        assert!(CliArgs::try_parse_from(["parlab", "-w", "0", "platforms"]).is_err());
        assert!(CliArgs::try_parse_from(["parlab", "saxpy", "-l", "8", "--incy", "0"]).is_err());
    }
}
