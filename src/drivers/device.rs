//! Device kernel drivers.
//!
//! This module implements the driver functions responsible for profiling the chosen kernels on
//! OpenCL devices (GPUs, CPUs, etc...), using the [`ocl`][1] crate for an idiomatic Rust
//! implementation of OpenCL bindings.
//!
//! Every driver builds its program for the selected [`Target`], runs the kernel once on pristine
//! data and reads the result back to compare it against the host reference, then measures the
//! execution time of the kernel.
//!
//! [1]: https://crates.io/crates/ocl

use super::{check_axpy_operands, verify};
use crate::{
    cli::DeviceKind,
    consts::BLOCK_SIZE_2D,
    error::{LabError, Result},
    kernels::{device::*, GemmShape},
    perf_report::*,
    utils::*,
};

use ocl::{
    core::Status,
    enums::{ImageChannelDataType, ImageChannelOrder, MemObjectType},
    flags::{self, DeviceType},
    Buffer, Device, Image, Kernel, Platform, ProQue, Program,
};
use tracing::debug;

use std::{io::Write, time::Instant};

impl DeviceKind {
    fn device_type(&self) -> DeviceType {
        match self {
            Self::Gpu => DeviceType::GPU,
            Self::Cpu => DeviceType::CPU,
        }
    }
}

/// Lists the available OpenCL platforms.
fn platforms() -> Result<Vec<Platform>> {
    let ids = ocl::core::get_platform_ids().map_err(LabError::device)?;
    Ok(ids.into_iter().map(Platform::new).collect())
}

/// Whether a failed device query only means that there is no device of the requested type.
fn no_device(status: Option<Status>) -> bool {
    status == Some(Status::CL_DEVICE_NOT_FOUND)
}

/// Lists the devices of type `kind` on `platform`, which may be none.
fn devices(platform: Platform, kind: DeviceKind) -> Result<Vec<Device>> {
    match Device::list(platform, Some(kind.device_type())) {
        Ok(list) => Ok(list),
        Err(e) if no_device(e.api_status()) => Ok(Vec::new()),
        Err(e) => Err(LabError::device(e)),
    }
}

/// Writes the name of every OpenCL platform along with its GPU and CPU devices.
pub fn list_platforms(output: &mut dyn Write) -> Result<()> {
    for (p, platform) in platforms()?.into_iter().enumerate() {
        writeln!(output, "Platform {p}: {}", platform.name().map_err(LabError::device)?)?;
        for kind in [DeviceKind::Gpu, DeviceKind::Cpu] {
            let list = devices(platform, kind)?;
            for (d, device) in list.iter().enumerate() {
                let name = device.name().map_err(LabError::device)?;
                writeln!(output, "  {kind} {d}: {name}")?;
            }
        }
    }
    Ok(())
}

/// An OpenCL device kernels are offloaded to.
#[derive(Clone, Debug)]
pub struct Target {
    platform: Platform,
    device: Device,
    kind: DeviceKind,
    name: String,
    max_wg_size: usize,
}

impl Target {
    /// Selects the first device of type `kind` on the first platform whose name contains
    /// `platform_filter` (or on the first platform if no filter is given).
    pub fn select(platform_filter: Option<&str>, kind: DeviceKind) -> Result<Self> {
        let mut platform = None;
        for candidate in platforms()? {
            let name = candidate.name().map_err(LabError::device)?;
            if platform_filter.map_or(true, |filter| name.contains(filter)) {
                platform = Some((candidate, name));
                break;
            }
        }
        let (platform, platform_name) = platform.ok_or_else(|| {
            LabError::PlatformNotFound(platform_filter.unwrap_or("*").to_string())
        })?;

        let list = devices(platform, kind)?;
        let device = *list.first().ok_or_else(|| LabError::DeviceNotFound {
            device: kind.to_string(),
            platform: platform_name.clone(),
        })?;
        let name = device.name().map_err(LabError::device)?;
        if list.len() > 1 {
            debug!(
                "{} {kind} devices on `{platform_name}`, picking `{name}`",
                list.len()
            );
        }

        Ok(Self {
            platform,
            device,
            kind,
            name,
            max_wg_size: device.max_wg_size().map_err(LabError::device)?,
        })
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fails if the device cannot run work-groups of `size` work items.
    fn check_wg_size(&self, size: usize) -> Result<()> {
        match size <= self.max_wg_size {
            true => Ok(()),
            false => Err(LabError::Unsupported(format!(
                "work-group of {size} items exceeds the {} supported by `{}`",
                self.max_wg_size, self.name
            ))),
        }
    }

    /// Builds `kernel_info`'s program and a command queue for this device.
    fn pro_que(&self, kernel_info: &DeviceKernel) -> Result<ProQue> {
        let mut prog_bldr = Program::builder();
        prog_bldr
            .src(kernel_info.source())
            .cmplr_def("BLOCK_SIZE", BLOCK_SIZE_2D as i32);

        Ok(ProQue::builder()
            .platform(self.platform)
            .device(self.device)
            .prog_bldr(prog_bldr)
            .build()?)
    }
}

/// Copies `data` into a new read-write device buffer.
fn buffer<T: LabFloat>(pro_que: &ProQue, data: &[T]) -> Result<Buffer<T>> {
    Ok(Buffer::<T>::builder()
        .queue(pro_que.queue().clone())
        .len(data.len())
        .copy_host_slice(data)
        .build()?)
}

/// Copies the row-major `width x height` matrix `data` into a new single-channel 2-D image.
fn image<T: LabFloat>(pro_que: &ProQue, data: &[T], width: usize, height: usize) -> Result<Image<T>> {
    Ok(Image::<T>::builder()
        .channel_order(ImageChannelOrder::R)
        .channel_data_type(ImageChannelDataType::Float)
        .image_type(MemObjectType::Image2d)
        .dims((width, height))
        .flags(flags::MEM_READ_ONLY | flags::MEM_HOST_WRITE_ONLY | flags::MEM_COPY_HOST_PTR)
        .copy_host_slice(data)
        .queue(pro_que.queue().clone())
        .build()?)
}

fn dim(len: usize) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| LabError::Unsupported(format!("dimension {len} does not fit in 32 bits")))
}

/// Measures execution time of `kernel`, see [`crate::drivers`] for the meaning of the repetitions.
fn profile(pro_que: &ProQue, kernel: &Kernel, meta_reps: u8, tight_reps: u16) -> Result<Vec<f64>> {
    let mut durations = Vec::with_capacity(meta_reps.into());
    for _ in 0..durations.capacity() {
        let dur = Instant::now();
        for _ in 0..tight_reps {
            unsafe {
                kernel.enq()?;
            }
        }
        pro_que.queue().finish()?;
        durations.push((dur.elapsed() / tight_reps.into()).as_secs_f64());
    }
    Ok(durations)
}

/// OpenCL device driver for the generic strided AXPY kernel, with work-groups of `lws` items.
#[allow(clippy::too_many_arguments)]
pub fn ocl_axpy<T: LabFloat>(
    target: &Target,
    alpha: T,
    h_x: &[T],
    incx: usize,
    h_y: &[T],
    incy: usize,
    lws: usize,
    reference: &[T],
    meta_reps: u8,
    tight_reps: u16,
) -> Result<PerfReport<DeviceKernelVariant>> {
    let work_items = check_axpy_operands(h_x, incx, h_y, incy)?;
    if work_items == 0 {
        return Err(LabError::Unsupported("cannot offload empty vectors".into()));
    }
    target.check_wg_size(lws)?;

    let (kernel_info, kind) = match T::PRECISION {
        Precision::Single => (&CL_SAXPY, KernelKind::Saxpy),
        Precision::Double => (&CL_DAXPY, KernelKind::Daxpy),
    };

    // Create OpenCL program-queue object
    let pro_que = target.pro_que(kernel_info)?;

    // Create device vectors
    let d_x = buffer(&pro_que, h_x)?;
    let d_y = buffer(&pro_que, h_y)?;

    // Pad the global work size to a multiple of the local one, the kernel discards extra items
    let gws = work_items.next_multiple_of(lws);
    debug!(device = %target.name, gws, lws, "enqueuing `{}`", kernel_info.name());

    // Declare OpenCL kernel object
    let kernel = pro_que
        .kernel_builder(kernel_info.name())
        .global_work_size(gws)
        .local_work_size(lws)
        .arg(h_y.len() as u64)
        .arg(alpha)
        .arg(&d_x)
        .arg(incx as u64)
        .arg(&d_y)
        .arg(incy as u64)
        .build()?;

    // Check the kernel against the reference on pristine data
    unsafe {
        kernel.enq()?;
    }
    let mut result = vec![T::default(); h_y.len()];
    d_y.read(&mut result).enq()?;
    let discrepancy = max_abs_diff(reference, &result)?;
    verify(DeviceKernelVariant::ClNaive, &discrepancy);

    let mut durations = profile(&pro_que, &kernel, meta_reps, tight_reps)?;

    Ok(PerfReport::new(
        TargetKind::Device,
        kind,
        DeviceKernelVariant::ClNaive,
        h_y.len(),
        work_items,
        &mut durations,
    )
    .with_detail(format!("{} lws={lws}", target.kind))
    .with_discrepancy(discrepancy))
}

/// OpenCL device driver for the generic GEMM kernel.
///
/// `ClNaive` and `ClTiled` read `A` and `B` from buffers, `ClImage` from 2-D images, which only
/// hold single-precision values.
// NOTE: We use upper-case characters to designate matrices.
#[allow(non_snake_case, clippy::too_many_arguments)]
pub fn ocl_gemm<T: LabFloat>(
    target: &Target,
    shape: &GemmShape,
    h_A: &[T],
    h_B: &[T],
    reference: &[T],
    meta_reps: u8,
    tight_reps: u16,
    variant: DeviceKernelVariant,
) -> Result<PerfReport<DeviceKernelVariant>> {
    let mut h_C = vec![T::default(); shape.rows * shape.cols];
    shape.check(h_A, h_B, &h_C)?;
    if h_C.is_empty() || shape.inner == 0 {
        return Err(LabError::Unsupported("cannot offload empty matrices".into()));
    }
    target.check_wg_size(BLOCK_SIZE_2D * BLOCK_SIZE_2D)?;

    let (kernel_info, kind) = match (variant, T::PRECISION) {
        (DeviceKernelVariant::ClNaive, Precision::Single) => (&CL_NAIVE_SGEMM, KernelKind::Sgemm),
        (DeviceKernelVariant::ClNaive, Precision::Double) => (&CL_NAIVE_DGEMM, KernelKind::Dgemm),
        (DeviceKernelVariant::ClTiled, Precision::Single) => (&CL_TILED_SGEMM, KernelKind::Sgemm),
        (DeviceKernelVariant::ClTiled, Precision::Double) => (&CL_TILED_DGEMM, KernelKind::Dgemm),
        (DeviceKernelVariant::ClImage, Precision::Single) => (&CL_IMAGE_SGEMM, KernelKind::Sgemm),
        (DeviceKernelVariant::ClImage, Precision::Double) => {
            return Err(LabError::Unsupported(
                "image-backed GEMM requires single precision".into(),
            ))
        }
    };
    let (rows, inner, cols) = (dim(shape.rows)?, dim(shape.inner)?, dim(shape.cols)?);

    // Create OpenCL program-queue object
    let pro_que = target.pro_que(kernel_info)?;

    // One work item per element of `C`, dimension 0 spanning columns and 1 spanning rows
    let gws = [
        shape.cols.next_multiple_of(BLOCK_SIZE_2D),
        shape.rows.next_multiple_of(BLOCK_SIZE_2D),
    ];
    let lws = [BLOCK_SIZE_2D, BLOCK_SIZE_2D];
    debug!(device = %target.name, ?gws, ?lws, "enqueuing `{}`", kernel_info.name());

    // Create device matrices and declare OpenCL kernel object
    let d_C = buffer(&pro_que, &h_C)?;
    let (images, buffers);
    let mut builder = pro_que.kernel_builder(kernel_info.name());
    builder.global_work_size(gws).local_work_size(lws);
    match variant {
        DeviceKernelVariant::ClImage => {
            images = (
                image(&pro_que, h_A, shape.inner, shape.rows)?,
                image(&pro_que, h_B, shape.cols, shape.inner)?,
            );
            builder.arg(&images.0).arg(&images.1);
        }
        DeviceKernelVariant::ClNaive | DeviceKernelVariant::ClTiled => {
            buffers = (buffer(&pro_que, h_A)?, buffer(&pro_que, h_B)?);
            builder.arg(&buffers.0).arg(&buffers.1);
        }
    }
    let kernel = builder
        .arg(&d_C)
        .arg(rows)
        .arg(inner)
        .arg(cols)
        .build()?;

    // Check the kernel against the reference
    unsafe {
        kernel.enq()?;
    }
    d_C.read(&mut h_C).enq()?;
    let discrepancy = max_abs_diff(reference, &h_C)?;
    verify(variant, &discrepancy);

    let mut durations = profile(&pro_que, &kernel, meta_reps, tight_reps)?;

    Ok(PerfReport::new(
        TargetKind::Device,
        kind,
        variant,
        shape.inner,
        shape.rows * shape.cols,
        &mut durations,
    )
    .with_detail(format!(
        "{} lws={BLOCK_SIZE_2D}x{BLOCK_SIZE_2D}",
        target.kind
    ))
    .with_discrepancy(discrepancy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::host::{axpy_reference, gemm_reference};

    #[test]
    fn device_kinds_map_to_opencl_types() {
        assert_eq!(DeviceKind::Gpu.device_type(), DeviceType::GPU);
        assert_eq!(DeviceKind::Cpu.device_type(), DeviceType::CPU);
    }

    #[test]
    fn only_missing_devices_yield_empty_lists() {
        assert!(no_device(Some(Status::CL_DEVICE_NOT_FOUND)));
        assert!(!no_device(Some(Status::CL_INVALID_PLATFORM)));
        assert!(!no_device(Some(Status::CL_OUT_OF_HOST_MEMORY)));
        assert!(!no_device(None));
    }

    #[test]
    fn oversized_dimensions_are_unsupported() {
        assert_eq!(dim(17).unwrap(), 17);
        let err = dim(usize::MAX).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    #[ignore = "requires an OpenCL runtime"]
    fn listing_platforms() {
        let mut output = Vec::new();
        list_platforms(&mut output).unwrap();
        assert!(String::from_utf8(output).unwrap().starts_with("Platform 0: "));
    }

    #[test]
    #[ignore = "requires an OpenCL runtime"]
    fn unknown_platform_is_not_found() {
        let err = Target::select(Some("no such platform, surely"), DeviceKind::Gpu).unwrap_err();
        assert!(matches!(err, LabError::PlatformNotFound(_)));
    }

    #[test]
    #[ignore = "requires an OpenCL device"]
    fn device_axpy_matches_reference() {
        let target = Target::select(None, DeviceKind::Gpu)
            .or_else(|_| Target::select(None, DeviceKind::Cpu))
            .unwrap();
        let mut rng = new_rng(Some(7));
        let x = f32::rand_vector(1000, &mut rng);
        let y = f32::rand_vector(1000, &mut rng);
        let reference = axpy_reference(2.0, &x, 1, &y, 2).unwrap();

        let report = ocl_axpy(&target, 2.0, &x, 1, &y, 2, 32, &reference, 2, 1).unwrap();
        assert!(report.max_diff().unwrap() <= 0.01);
    }

    #[test]
    #[ignore = "requires an OpenCL device"]
    fn device_gemm_matches_reference() {
        let target = Target::select(None, DeviceKind::Gpu)
            .or_else(|_| Target::select(None, DeviceKind::Cpu))
            .unwrap();
        // Not a multiple of the tile size
        let shape = GemmShape::square(37);
        let mut rng = new_rng(Some(7));
        let a = f32::rand_integers(37 * 37, &mut rng);
        let b = f32::rand_integers(37 * 37, &mut rng);
        let reference = gemm_reference(&shape, &a, &b).unwrap();

        for variant in DeviceKernelVariant::ALL {
            let report = ocl_gemm(&target, &shape, &a, &b, &reference, 2, 1, variant).unwrap();
            assert!(report.max_diff().unwrap() <= 0.01, "{variant}");
        }
    }
}
