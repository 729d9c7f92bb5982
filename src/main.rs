//! Command-line entry point of parlab, see the library documentation for usage.

use parlab::{
    cli::{CliArgs, KernelCmd},
    drivers,
};

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use std::process::ExitCode;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let result = match args.kernel {
        KernelCmd::Platforms => drivers::platforms(&args),
        KernelCmd::Saxpy {
            ref lengths,
            incx,
            incy,
        } => drivers::axpy::<f32>(&args, lengths, incx as usize, incy as usize),
        KernelCmd::Daxpy {
            ref lengths,
            incx,
            incy,
        } => drivers::axpy::<f64>(&args, lengths, incx as usize, incy as usize),
        KernelCmd::Sgemm { ref sizes } => drivers::gemm::<f32>(&args, sizes),
        KernelCmd::Dgemm { ref sizes } => drivers::gemm::<f64>(&args, sizes),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
