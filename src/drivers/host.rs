//! Host kernel drivers.
//!
//! This module implements the driver functions responsible for profiling the chosen kernels on the
//! host (CPU).

use super::{check_axpy_operands, verify};
use crate::{
    error::Result,
    kernels::{host, GemmShape},
    perf_report::*,
    pool::WorkerPool,
    utils::*,
};

use std::time::Instant;

/// Reference result of the strided AXPY kernel.
pub fn axpy_reference<T: LabFloat>(
    alpha: T,
    x: &[T],
    incx: usize,
    y: &[T],
    incy: usize,
) -> Result<Vec<T>> {
    check_axpy_operands(x, incx, y, incy)?;
    let mut result = y.to_vec();
    host::axpy(alpha, x, incx, &mut result, incy);
    Ok(result)
}

/// Reference result of the GEMM kernel.
#[allow(non_snake_case)]
pub fn gemm_reference<T: LabFloat>(shape: &GemmShape, A: &[T], B: &[T]) -> Result<Vec<T>> {
    let mut C = vec![T::default(); shape.rows * shape.cols];
    shape.check(A, B, &C)?;
    host::gemm(shape, A, B, &mut C);
    Ok(C)
}

fn detail(pool: &WorkerPool, variant: HostKernelVariant) -> String {
    match variant.is_sequential() {
        true => String::new(),
        false => format!("workers={}", pool.workers()),
    }
}

/// Host driver for the generic strided AXPY kernel.
///
/// This function selects the correct host kernel given `variant`, checks its result against
/// `reference` and profiles it.
#[allow(clippy::too_many_arguments)]
pub fn axpy<T: LabFloat>(
    pool: &WorkerPool,
    alpha: T,
    x: &[T],
    incx: usize,
    y: &[T],
    incy: usize,
    reference: &[T],
    meta_reps: u8,
    tight_reps: u16,
    variant: HostKernelVariant,
) -> Result<PerfReport<HostKernelVariant>> {
    let work_items = check_axpy_operands(x, incx, y, incy)?;

    // Match on given kernel variant
    let kernel = |out: &mut [T]| -> Result<()> {
        match variant {
            HostKernelVariant::SeqNaive => host::axpy(alpha, x, incx, out, incy),
            HostKernelVariant::SeqIter => host::iter_axpy(alpha, x, incx, out, incy),
            HostKernelVariant::ParIter => {
                pool.install(|| host::par_iter_axpy(alpha, x, incx, out, incy))
            }
            HostKernelVariant::ParPartitioned => {
                return host::partitioned_axpy(pool, alpha, x, incx, out, incy)
            }
        }
        Ok(())
    };

    // Check the kernel against the reference on pristine data
    let mut result = y.to_vec();
    kernel(&mut result)?;
    let discrepancy = max_abs_diff(reference, &result)?;
    verify(variant, &discrepancy);

    // Measure execution time of kernel
    let mut scratch = y.to_vec();
    let mut durations = Vec::with_capacity(meta_reps.into());
    for _ in 0..durations.capacity() {
        let dur = Instant::now();
        for _ in 0..tight_reps {
            kernel(&mut scratch)?;
        }
        durations.push((dur.elapsed() / tight_reps as u32).as_secs_f64());
    }

    let kind = match T::PRECISION {
        Precision::Single => KernelKind::Saxpy,
        Precision::Double => KernelKind::Daxpy,
    };
    Ok(PerfReport::new(
        TargetKind::Host,
        kind,
        variant,
        y.len(),
        work_items,
        &mut durations,
    )
    .with_detail(detail(pool, variant))
    .with_discrepancy(discrepancy))
}

/// Host driver for the generic GEMM kernel.
///
/// This function selects the correct host kernel given `variant`, checks its result against
/// `reference` and profiles it.
// NOTE: We use upper-case characters to designate matrices.
#[allow(non_snake_case, clippy::too_many_arguments)]
pub fn gemm<T: LabFloat>(
    pool: &WorkerPool,
    shape: &GemmShape,
    A: &[T],
    B: &[T],
    reference: &[T],
    meta_reps: u8,
    tight_reps: u16,
    variant: HostKernelVariant,
) -> Result<PerfReport<HostKernelVariant>> {
    let mut C = vec![T::default(); shape.rows * shape.cols];
    shape.check(A, B, &C)?;

    // Match on given host kernel variant
    let kernel = |out: &mut [T]| -> Result<()> {
        match variant {
            HostKernelVariant::SeqNaive => host::gemm(shape, A, B, out),
            HostKernelVariant::SeqIter => host::iter_gemm(shape, A, B, out),
            HostKernelVariant::ParIter => pool.install(|| host::par_iter_gemm(shape, A, B, out)),
            HostKernelVariant::ParPartitioned => {
                return host::partitioned_gemm(pool, shape, A, B, out)
            }
        }
        Ok(())
    };

    kernel(&mut C)?;
    let discrepancy = max_abs_diff(reference, &C)?;
    verify(variant, &discrepancy);

    // Measure execution time of host kernel
    let mut durations = Vec::with_capacity(meta_reps.into());
    for _ in 0..durations.capacity() {
        let dur = Instant::now();
        for _ in 0..tight_reps {
            kernel(&mut C)?;
        }
        durations.push((dur.elapsed() / tight_reps as u32).as_secs_f64());
    }

    let kind = match T::PRECISION {
        Precision::Single => KernelKind::Sgemm,
        Precision::Double => KernelKind::Dgemm,
    };
    Ok(PerfReport::new(
        TargetKind::Host,
        kind,
        variant,
        shape.inner,
        shape.rows * shape.cols,
        &mut durations,
    )
    .with_detail(detail(pool, variant))
    .with_discrepancy(discrepancy))
}
