//! parlab - Parallel kernels laboratory
//!
//! # About
//! parlab benchmarks BLAS-like kernels side by side on three kinds of targets: a naive sequential
//! implementation, multi-threaded implementations on a fixed pool of workers, each of them owning a
//! statically computed share of the output, and OpenCL-accelerated implementations offloaded to
//! GPUs or CPUs.
//!
//! Currently, parlab can profile the following kernels:
//! - AXPY (strided vector-vector addition)
//! - GEMM (general dense matrix-matrix multiplication)
//!
//! Profiling can be done on both single-precision and double-precision floating-point formats (see
//! [IEEE 754][1]). Every variant is checked against the sequential reference before being timed.
//!
//! # Quickstart
//! ## Pre-requisites
//! Make sure an [OpenCL 1.2+][2] library is installed on your system before beginning. Host
//! variants still run when no OpenCL platform or device is available.
//!
//! ## Build
//! As any Rust-based project, parlab is built and run with `cargo`:
//! ```sh
//! cargo build --release
//! ```
//!
//! ## Help
//! To see the help usage:
//! ```sh
//! cargo run -- help
//!
//! Usage: parlab [OPTIONS] <COMMAND>
//!
//! Commands:
//!   platforms  List the OpenCL platforms and their CPU and GPU devices
//!   saxpy      Single-precision strided vector addition (SAXPY): `y[i * incy] += alpha * x[i * incx]`
//!   daxpy      Double-precision strided vector addition (DAXPY): `y[i * incy] += alpha * x[i * incx]`
//!   sgemm      Single-precision general matrix multiplication (SGEMM): `C = A * B`
//!   dgemm      Double-precision general matrix multiplication (DGEMM): `C = A * B`
//!   help       Print this message or the help of the given subcommand(s)
//! ```
//!
//! ## Example run
//! To profile a DGEMM on multiple matrix sizes with 16 workers, offloading to GPUs only:
//! ```sh
//! cargo run --release -- -w 16 -d gpu dgemm --sizes 128 256 512 1024
//! ```
//!
//! Reports are written as CSV to `stdout` (or `--output-file`), logs to `stderr`. Log verbosity is
//! controlled with `--verbose` or the `RUST_LOG` environment variable.
//!
//! [1]: https://en.wikipedia.org/wiki/IEEE_754
//! [2]: https://www.khronos.org/opencl/

pub mod cli;
pub mod consts;
pub mod drivers;
pub mod error;
pub mod kernels;
pub mod partition;
pub mod perf_report;
pub mod pool;
pub mod utils;
