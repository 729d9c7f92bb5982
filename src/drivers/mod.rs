//! Kernel drivers.
//!
//! This module provides the API for appropriately initializing and profiling the kernels, as well
//! as post-processing the results. It acts as a layer abstracting over the kernel's target: either
//! the host (CPU), sequentially or through a pool of workers, or an OpenCL device (GPU, CPU...).
//!
//! # High-level approach for kernel profiling
//! ## 1. Data initialization
//! Inputs are drawn once per size and immutably shared between all kernel variants, along with the
//! result of the sequential reference kernel. Device variants copy them to the device before
//! running.
//!
//! ## 2. Correctness check
//! Every variant first runs once on pristine data, and its result is compared element-wise against
//! the reference. A difference above [`crate::consts::TOLERANCE`] is reported as a warning, and the
//! largest difference is part of the report.
//!
//! ## 3. Performance evaluation
//! This step consists in measuring the execution time of the chosen kernel. In order to get
//! an accurate evaluation of a kernel's performance, we repeat this process in a "meta
//! repetitions loop". This allows us to get enough measurements and assess the precision of the
//! results (see [`crate::consts`] for the default amount of meta repetitions and [`crate::cli`]
//! for overriding the default from the command-line).
//!
//! In addition, when measuring the performance of kernels that operate on very few data (e.g.
//! an AXPY kernel with vectors small enough to fit in the L1 cache), we may want to increase the
//! execution time by repeatedly calling the kernel in a tight loop and averaging the elapsed
//! time over the number of iterations of this loop (see [`crate::cli`] for overriding the number
//! of repetitions of the tight loop from the command-line).
//!
//! ## 4. Post-processing
//! This step consists in extracting performance metrics from the recorded execution times of the
//! kernel and information about the manipulated data, such as computational performance (in
//! GFLOP/s), memory bandwidth (in GiB/s) or arithmetic intensity (in FLOPs/Byte).
//!
//! The resulting metrics are then outputted to `stdout`, or a file if specified (see
//! [`crate::cli`] for specifying an output file from the command-line).
//!
//! # Failures
//! Invalid arguments abort the whole run. Environment failures (missing platform or device,
//! program build errors, unsupported configurations...) only skip the variant that hit them.

mod device;
mod host;

use crate::{
    cli::CliArgs,
    consts::{MAX_LOCAL_WORK_SIZE, MAX_SEQ_GEMM_SIZE, MIN_LOCAL_WORK_SIZE, TOLERANCE},
    error::{LabError, Result},
    kernels::{axpy_work_items, GemmShape},
    perf_report::*,
    pool::WorkerPool,
    utils::*,
};

use device::Target;
use tracing::{debug, info, warn};

use std::{
    fmt,
    fs::OpenOptions,
    io::{stdout, Write},
    path::Path,
};

/// Checks that `x` and `y` are valid AXPY operands and returns the number of work items.
fn check_axpy_operands<T>(x: &[T], incx: usize, y: &[T], incy: usize) -> Result<usize> {
    if x.len() != y.len() {
        return Err(LabError::ShapeMismatch(format!(
            "`x` has {} elements but `y` has {}",
            x.len(),
            y.len()
        )));
    }
    axpy_work_items(y.len(), incx, incy)
}

/// Warns when a variant's result strays from the reference.
fn verify(variant: impl fmt::Display, discrepancy: &Discrepancy) {
    match discrepancy.within(TOLERANCE) {
        true => debug!(%variant, "{discrepancy}"),
        false => warn!(%variant, "result differs from reference: {discrepancy}"),
    }
}

/// Turns a recoverable error into a warning, so that the run goes on with the next variant.
fn isolate<R>(what: impl fmt::Display, result: Result<R>) -> Result<Option<R>> {
    match result {
        Ok(r) => Ok(Some(r)),
        Err(e) if e.is_recoverable() => {
            warn!("skipping {what}: {e}");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(name) => Box::new(
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(name)?,
        ),
        None => Box::new(stdout()),
    })
}

fn emit<V>(output: &mut dyn Write, report: Option<PerfReport<V>>) -> Result<()>
where
    V: KernelVariant + fmt::Display,
{
    if let Some(report) = report {
        writeln!(output, "{report}")?;
    }
    Ok(())
}

/// Selects one device per requested device type, skipping the unavailable ones.
fn select_targets(args: &CliArgs) -> Result<Vec<Target>> {
    let mut targets = Vec::with_capacity(args.devices.len());
    for &kind in &args.devices {
        let target = Target::select(args.platform.as_deref(), kind);
        if let Some(target) = isolate(format!("{kind} offload"), target)? {
            info!("Offloading to {kind} device `{}`", target.name());
            targets.push(target);
        }
    }
    Ok(targets)
}

/// Writes the available OpenCL platforms and devices.
pub fn platforms(args: &CliArgs) -> Result<()> {
    let mut output = open_output(args.output_file.as_deref())?;
    device::list_platforms(&mut output)
}

/// Driver function responsible for initializing the data for the AXPY kernel and forwarding it to
/// the dedicated target drivers. It reports every benchmarked kernel variant as it completes.
///
/// Device variants are run once per local work size, from [`MIN_LOCAL_WORK_SIZE`] to
/// [`MAX_LOCAL_WORK_SIZE`].
pub fn axpy<T: LabFloat>(args: &CliArgs, lengths: &[usize], incx: usize, incy: usize) -> Result<()> {
    let pool = WorkerPool::new(args.workers.into())?;
    let targets = select_targets(args)?;
    let mut output = open_output(args.output_file.as_deref())?;
    PerfReport::<()>::print_csv_header(&mut output)?;

    // Initialize the same `alpha` for all vector lengths
    let mut rng = new_rng(args.seed);
    let alpha = T::rand_scalar(&mut rng);

    for &len in lengths {
        info!("Vector length: {len}");
        // Initialize new `x` and `y` vectors for each length
        let x = T::rand_vector(len, &mut rng);
        let y = T::rand_vector(len, &mut rng);
        let reference = host::axpy_reference(alpha, &x, incx, &y, incy)?;

        for variant in HostKernelVariant::ALL {
            let report = host::axpy(
                &pool,
                alpha,
                &x,
                incx,
                &y,
                incy,
                &reference,
                args.meta_repetitions,
                args.tight_loop_repetitions,
                variant,
            );
            emit(&mut output, isolate(variant, report)?)?;
        }

        for target in &targets {
            let mut lws = MIN_LOCAL_WORK_SIZE;
            while lws <= MAX_LOCAL_WORK_SIZE {
                let report = device::ocl_axpy(
                    target,
                    alpha,
                    &x,
                    incx,
                    &y,
                    incy,
                    lws,
                    &reference,
                    args.meta_repetitions,
                    args.tight_loop_repetitions,
                );
                let what = format!("{} lws={lws}", target.kind());
                emit(&mut output, isolate(what, report)?)?;
                lws *= 2;
            }
        }
    }

    Ok(())
}

/// Driver function responsible for initializing the data for the GEMM kernel and forwarding it to
/// the dedicated target drivers. It reports every benchmarked kernel variant as it completes.
// NOTE: We use upper-case characters to designate matrices.
#[allow(non_snake_case)]
pub fn gemm<T: LabFloat>(args: &CliArgs, sizes: &[usize]) -> Result<()> {
    let pool = WorkerPool::new(args.workers.into())?;
    let targets = select_targets(args)?;
    let mut output = open_output(args.output_file.as_deref())?;
    PerfReport::<()>::print_csv_header(&mut output)?;

    let mut rng = new_rng(args.seed);

    for &size in sizes {
        info!("Matrix size: {size}");
        // Integer-valued matrices keep every partial sum exact
        let shape = GemmShape::square(size);
        let A = T::rand_integers(size * size, &mut rng);
        let B = T::rand_integers(size * size, &mut rng);
        let reference = host::gemm_reference(&shape, &A, &B)?;

        for variant in HostKernelVariant::ALL {
            if variant.is_sequential() && size > MAX_SEQ_GEMM_SIZE {
                debug!(%variant, "skipped above {MAX_SEQ_GEMM_SIZE}x{MAX_SEQ_GEMM_SIZE}");
                continue;
            }
            let report = host::gemm(
                &pool,
                &shape,
                &A,
                &B,
                &reference,
                args.meta_repetitions,
                args.tight_loop_repetitions,
                variant,
            );
            emit(&mut output, isolate(variant, report)?)?;
        }

        for target in &targets {
            for variant in DeviceKernelVariant::ALL {
                let report = device::ocl_gemm(
                    target,
                    &shape,
                    &A,
                    &B,
                    &reference,
                    args.meta_repetitions,
                    args.tight_loop_repetitions,
                    variant,
                );
                let what = format!("{variant} on {}", target.kind());
                emit(&mut output, isolate(what, report)?)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_errors_are_isolated() {
        let skipped: Result<()> = Err(LabError::Unsupported("no fp64".into()));
        assert!(isolate("daxpy", skipped).unwrap().is_none());
        assert_eq!(isolate("daxpy", Ok(3)).unwrap(), Some(3));
    }

    #[test]
    fn invalid_arguments_abort() {
        let failed: Result<()> = Err(LabError::ZeroStride { name: "incy" });
        assert!(isolate("saxpy", failed).is_err());
    }

    #[test]
    fn mismatched_operands_are_rejected() {
        let err = check_axpy_operands(&[1.0; 3], 1, &[1.0; 4], 1).unwrap_err();
        assert!(matches!(err, LabError::ShapeMismatch(_)));
        assert_eq!(check_axpy_operands(&[1.0; 4], 2, &[1.0; 4], 1).unwrap(), 2);
    }

    #[test]
    fn host_only_run_writes_csv() {
        let path = std::env::temp_dir().join(format!("parlab-{}.csv", std::process::id()));
        let args = <CliArgs as clap::Parser>::try_parse_from([
            "parlab",
            "-m",
            "2",
            "-w",
            "3",
            "-p",
            "no such platform, surely",
            "-o",
            path.to_str().unwrap(),
            "daxpy",
            "-l",
            "100",
        ])
        .unwrap();

        // Without a matching platform, device variants are skipped
        axpy::<f64>(&args, &[100], 1, 1).unwrap();

        let csv = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert!(lines[0].starts_with("target,kernel,variant,detail,"));
        assert_eq!(lines.len(), 1 + HostKernelVariant::ALL.len());
        assert!(lines[1..].iter().all(|l| l.starts_with("host,daxpy,")));
    }
}
