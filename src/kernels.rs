//! Kernel implementations.
//!
//! This modules contains the actual implementation of the host and device kernels.

use crate::error::{LabError, Result};

/// Number of AXPY work items for vectors of length `n` and strides `incx` and `incy`, i.e. the
/// number of indices `i` such that both `i * incx < n` and `i * incy < n`.
pub fn axpy_work_items(n: usize, incx: usize, incy: usize) -> Result<usize> {
    if incx == 0 {
        return Err(LabError::ZeroStride { name: "incx" });
    }
    if incy == 0 {
        return Err(LabError::ZeroStride { name: "incy" });
    }
    Ok(n.div_ceil(incx.max(incy)))
}

/// Dimensions of a GEMM `C = A * B`, with `A` of `rows x inner`, `B` of `inner x cols` and `C` of
/// `rows x cols`, all stored in row-major order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GemmShape {
    pub rows: usize,
    pub inner: usize,
    pub cols: usize,
}

impl GemmShape {
    /// Shape of the product of two `size x size` matrices.
    pub fn square(size: usize) -> Self {
        Self {
            rows: size,
            inner: size,
            cols: size,
        }
    }

    /// Shape of the product of a `row1 x col1` matrix by a `row2 x col2` matrix, which requires
    /// `col1 == row2`.
    pub fn new(row1: usize, col1: usize, row2: usize, col2: usize) -> Result<Self> {
        if col1 != row2 {
            return Err(LabError::ShapeMismatch(format!(
                "cannot multiply {row1}x{col1} by {row2}x{col2}"
            )));
        }
        Ok(Self {
            rows: row1,
            inner: col1,
            cols: col2,
        })
    }

    /// Checks that the given buffers hold matrices of this shape.
    #[allow(non_snake_case)]
    pub fn check<T>(&self, A: &[T], B: &[T], C: &[T]) -> Result<()> {
        let expected = [
            ("A", self.rows * self.inner, A.len()),
            ("B", self.inner * self.cols, B.len()),
            ("C", self.rows * self.cols, C.len()),
        ];
        for (name, want, got) in expected {
            if want != got {
                return Err(LabError::ShapeMismatch(format!(
                    "matrix {name} has {got} elements, expected {want}"
                )));
            }
        }
        Ok(())
    }
}

pub mod host {
    //! Host kernel implementations.
    //!
    //! The `par_iter_*` implementations rely on [`rayon`][1]'s parallel iterators, the
    //! `partitioned_*` ones on a [`WorkerPool`] splitting the output into one contiguous chunk per
    //! worker. Every variant performs the same floating-point operations in the same order for a
    //! given output element, so their results are bit-identical.
    //!
    //! All AXPY kernels expect `x` and `y` to have the same length `n` and non-zero strides (see
    //! [`axpy_work_items`]), and all GEMM kernels expect buffers matching their [`GemmShape`] (see
    //! [`GemmShape::check`]). The `partitioned_*` kernels check what their partitioning depends on
    //! and fail fast like the partitioner does.
    //!
    //! [1]: https://crates.io/crates/rayon

    use super::{axpy_work_items, GemmShape};
    use crate::{error::Result, partition::Grid2D, pool::WorkerPool, utils::LabFloat};

    use rayon::prelude::*;

    // Naive implementation of the strided AXPY kernel, used as the reference.
    pub fn axpy<T: LabFloat>(alpha: T, x: &[T], incx: usize, y: &mut [T], incy: usize) {
        let n = y.len();
        for i in 0..n {
            if i * incx >= n || i * incy >= n {
                break;
            }
            y[i * incy] += alpha * x[i * incx];
        }
    }

    // Idiomatic Rust implementation of the strided AXPY kernel (using iterators).
    pub fn iter_axpy<T: LabFloat>(alpha: T, x: &[T], incx: usize, y: &mut [T], incy: usize) {
        y.iter_mut()
            .step_by(incy)
            .zip(x.iter().step_by(incx))
            .for_each(|(yi, xi)| *yi += alpha * *xi);
    }

    // Parallel implementation of the strided AXPY kernel (using `rayon`'s parallel iterators).
    pub fn par_iter_axpy<T: LabFloat>(alpha: T, x: &[T], incx: usize, y: &mut [T], incy: usize) {
        y.par_iter_mut()
            .step_by(incy)
            .zip(x.par_iter().step_by(incx))
            .for_each(|(yi, xi)| *yi += alpha * *xi);
    }

    // Parallel implementation of the strided AXPY kernel (static partitioning of work items).
    pub fn partitioned_axpy<T: LabFloat>(
        pool: &WorkerPool,
        alpha: T,
        x: &[T],
        incx: usize,
        y: &mut [T],
        incy: usize,
    ) -> Result<()> {
        let n = y.len();
        let work_items = axpy_work_items(n, incx, incy)?;

        pool.for_each_chunk(y, work_items, incy, |range, chunk| {
            for i in range.as_range() {
                if i * incx < n && i * incy < n {
                    chunk[(i - range.start) * incy] += alpha * x[i * incx];
                }
            }
        });
        Ok(())
    }

    // Dot product of row `row` of `A` with column `col` of `B`, accumulated in index order.
    #[allow(non_snake_case)]
    #[inline]
    fn dot<T: LabFloat>(shape: &GemmShape, A: &[T], B: &[T], row: usize, col: usize) -> T {
        let mut acc = T::default();
        for l in 0..shape.inner {
            acc += A[row * shape.inner + l] * B[l * shape.cols + col];
        }
        acc
    }

    // Naive implementation of the GEMM kernel (unidiomatic Rust), used as the reference.
    #[allow(non_snake_case)]
    pub fn gemm<T: LabFloat>(shape: &GemmShape, A: &[T], B: &[T], C: &mut [T]) {
        for i in 0..shape.rows {
            for j in 0..shape.cols {
                C[i * shape.cols + j] = dot(shape, A, B, i, j);
            }
        }
    }

    // Idiomatic Rust implementation of the GEMM kernel (using iterators).
    #[allow(non_snake_case)]
    pub fn iter_gemm<T: LabFloat>(shape: &GemmShape, A: &[T], B: &[T], C: &mut [T]) {
        if shape.cols == 0 {
            return;
        }
        C.chunks_exact_mut(shape.cols)
            .enumerate()
            .for_each(|(i, c_row)| {
                let a_row = &A[i * shape.inner..(i + 1) * shape.inner];
                c_row.iter_mut().enumerate().for_each(|(j, c_ij)| {
                    *c_ij = a_row
                        .iter()
                        .zip(B.iter().skip(j).step_by(shape.cols))
                        .fold(T::default(), |acc, (a_l, b_l)| acc + *a_l * *b_l);
                })
            });
    }

    // Parallel implementation of the GEMM kernel (using `rayon`'s parallel iterators).
    #[allow(non_snake_case)]
    pub fn par_iter_gemm<T: LabFloat>(shape: &GemmShape, A: &[T], B: &[T], C: &mut [T]) {
        if shape.cols == 0 {
            return;
        }
        C.par_chunks_exact_mut(shape.cols)
            .enumerate()
            .for_each(|(i, c_row)| {
                let a_row = &A[i * shape.inner..(i + 1) * shape.inner];
                c_row.iter_mut().enumerate().for_each(|(j, c_ij)| {
                    *c_ij = a_row
                        .iter()
                        .zip(B.iter().skip(j).step_by(shape.cols))
                        .fold(T::default(), |acc, (a_l, b_l)| acc + *a_l * *b_l);
                })
            });
    }

    // Parallel implementation of the GEMM kernel (static partitioning of the cells of `C`).
    #[allow(non_snake_case)]
    pub fn partitioned_gemm<T: LabFloat>(
        pool: &WorkerPool,
        shape: &GemmShape,
        A: &[T],
        B: &[T],
        C: &mut [T],
    ) -> Result<()> {
        let grid = Grid2D::new(shape.rows, shape.cols)?;

        pool.for_each_grid_chunk(C, grid, |range, chunk| {
            let offset = range.flat().start;
            for (row, cols) in range.row_spans() {
                for col in cols {
                    chunk[row * shape.cols + col - offset] = dot(shape, A, B, row, col);
                }
            }
        });
        Ok(())
    }

}

pub mod device {
    //! Device kernel implementations.

    /// Represents a device kernel.
    ///
    /// Device code is written in OpenCL C and embedded as raw text, then compiled at runtime for
    /// the selected device.
    pub struct DeviceKernel {
        kernel_name: &'static str,
        kernel_source: &'static str,
    }

    impl DeviceKernel {
        /// Creates a `DeviceKernel` from a kernel name (actual name of the kernel function in the
        /// source code) and a kernel source code (generally a file's contents).
        pub const fn new(kernel_name: &'static str, kernel_source: &'static str) -> Self {
            Self {
                kernel_name,
                kernel_source,
            }
        }

        /// Returns the function name of the given kernel.
        pub fn name(&self) -> &'static str {
            self.kernel_name
        }

        /// Returns the source code for the given kernel.
        pub fn source(&self) -> &'static str {
            self.kernel_source
        }
    }

    const SAXPY_SRC: &str = include_str!("../kernels/opencl/saxpy.cl");
    const DAXPY_SRC: &str = include_str!("../kernels/opencl/daxpy.cl");
    const SGEMM_SRC: &str = include_str!("../kernels/opencl/sgemm.cl");
    const DGEMM_SRC: &str = include_str!("../kernels/opencl/dgemm.cl");

    /// Name and source code of the OpenCL strided SAXPY.
    pub static CL_SAXPY: DeviceKernel = DeviceKernel::new("saxpy", SAXPY_SRC);

    /// Name and source code of the OpenCL strided DAXPY.
    pub static CL_DAXPY: DeviceKernel = DeviceKernel::new("daxpy", DAXPY_SRC);

    /// Name and source code of the naive OpenCL SGEMM.
    pub static CL_NAIVE_SGEMM: DeviceKernel = DeviceKernel::new("naive_sgemm", SGEMM_SRC);

    /// Name and source code of the naive OpenCL DGEMM.
    pub static CL_NAIVE_DGEMM: DeviceKernel = DeviceKernel::new("naive_dgemm", DGEMM_SRC);

    /// Name and source code of the tiled OpenCL SGEMM.
    pub static CL_TILED_SGEMM: DeviceKernel = DeviceKernel::new("tiled_sgemm", SGEMM_SRC);

    /// Name and source code of the tiled OpenCL DGEMM.
    pub static CL_TILED_DGEMM: DeviceKernel = DeviceKernel::new("tiled_dgemm", DGEMM_SRC);

    /// Name and source code of the OpenCL SGEMM reading its operands from 2-D images.
    pub static CL_IMAGE_SGEMM: DeviceKernel = DeviceKernel::new("image_sgemm", SGEMM_SRC);

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn kernel_sources_define_their_entry_points() {
            for kernel in [
                &CL_SAXPY,
                &CL_DAXPY,
                &CL_NAIVE_SGEMM,
                &CL_NAIVE_DGEMM,
                &CL_TILED_SGEMM,
                &CL_TILED_DGEMM,
                &CL_IMAGE_SGEMM,
            ] {
                let signature = format!("__kernel void {}(", kernel.name());
                assert!(
                    kernel.source().contains(&signature),
                    "missing `{}`",
                    kernel.name()
                );
            }
        }
    }
}
