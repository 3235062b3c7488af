use ndarray::{ArrayView2, ArrayView3, ArrayView4, ArrayViewMut3, Axis, Zip};
use num_integer::Integer;
use num_traits::Float;
use rayon::prelude::*;

/// One output cell of the fused de-grid + subspace expansion.
///
/// Gathers `width` weighted grid neighbors and, per neighbor, expands the
/// low-rank coefficients into the time domain through the adjoint basis
/// row for `frame`. The loop nesting (kernel tap outer, coefficient
/// inner) is the reproducibility contract shared by every backend; the
/// CUDA kernels mirror it statement for statement.
#[inline(always)]
fn degrid_cell<T: Float>(
    frame: usize,
    batch: usize,
    point: usize,
    cart_data: &ArrayView3<'_, T>,
    xvalue: &ArrayView3<'_, T>,
    xindex: &ArrayView3<'_, i64>,
    basis_adjoint: &ArrayView2<'_, T>,
) -> T {
    let ncoeff = cart_data.shape()[0];
    let width = xindex.shape()[2];

    let mut acc = T::zero();
    for tap in 0..width {
        let idx = xindex[[frame, point, tap]];
        debug_assert!(
            idx >= 0 && (idx as usize) < cart_data.shape()[2],
            "interp index {} out of range 0..{}",
            idx,
            cart_data.shape()[2],
        );
        let idx = idx as usize;
        let val = xvalue[[frame, point, tap]];

        for coeff in 0..ncoeff {
            acc = acc + val * basis_adjoint[[frame, coeff]] * cart_data[[coeff, batch, idx]];
        }
    }
    acc
}

/// CPU de-gridding kernel, parallel over output cells.
///
/// Accumulates into `noncart_data` `[nframes, batch, npts]`; callers own
/// initialization (pre-zero the buffer unless true accumulation across
/// calls is intended). `cart_data` is `[ncoeff, batch, ngrid]`,
/// `interp_value`/`interp_index` are `[naxes, nframes, npts, width]`
/// with axis 0 in use, `basis_adjoint` is `[nframes, ncoeff]`.
///
/// Each parallel unit owns exactly one `(frame, batch, point)` cell, so
/// writes are disjoint and no synchronization is needed on the output.
pub fn degrid_cpu<T>(
    mut noncart_data: ArrayViewMut3<'_, T>,
    cart_data: ArrayView3<'_, T>,
    interp_value: ArrayView4<'_, T>,
    interp_index: ArrayView4<'_, i64>,
    basis_adjoint: ArrayView2<'_, T>,
) where
    T: Float + Send + Sync,
{
    let (_, batch_size, npts) = noncart_data.dim();
    let xindex = interp_index.index_axis(Axis(0), 0);
    let xvalue = interp_value.index_axis(Axis(0), 0);

    if let Some(out) = noncart_data.as_slice_mut() {
        // Contiguous output: flat parallel range, decomposed back into
        // (frame, batch, point) by div/mod against the known extents.
        out.par_iter_mut().enumerate().for_each(|(i, cell)| {
            let (frame, rest) = i.div_rem(&(batch_size * npts));
            let (batch, point) = rest.div_rem(&npts);
            *cell = *cell
                + degrid_cell(frame, batch, point, &cart_data, &xvalue, &xindex, &basis_adjoint);
        });
        return;
    }

    // Strided output view: same disjoint cells, indexed zip.
    Zip::indexed(noncart_data).par_for_each(|(frame, batch, point), cell| {
        *cell = *cell
            + degrid_cell(frame, batch, point, &cart_data, &xvalue, &xindex, &basis_adjoint);
    });
}

/// Single-threaded reference with the same accumulation order, used as
/// the oracle for the parallel kernels.
pub fn degrid_cpu_serial<T: Float>(
    mut noncart_data: ArrayViewMut3<'_, T>,
    cart_data: ArrayView3<'_, T>,
    interp_value: ArrayView4<'_, T>,
    interp_index: ArrayView4<'_, i64>,
    basis_adjoint: ArrayView2<'_, T>,
) {
    let (nframes, batch_size, npts) = noncart_data.dim();
    let xindex = interp_index.index_axis(Axis(0), 0);
    let xvalue = interp_value.index_axis(Axis(0), 0);

    for frame in 0..nframes {
        for batch in 0..batch_size {
            for point in 0..npts {
                let acc =
                    degrid_cell(frame, batch, point, &cart_data, &xvalue, &xindex, &basis_adjoint);
                noncart_data[[frame, batch, point]] =
                    noncart_data[[frame, batch, point]] + acc;
            }
        }
    }
}

#[cfg(feature = "cuda")]
#[link(name = "kernel_degrid", kind = "static")]
extern "C" {
    fn degrid_flat_cuda_launcher(
        noncart_data: *mut f32,
        cart_data: *const f32,
        interp_value: *const f32,
        interp_index: *const i64,
        basis_adjoint: *const f32,
        nframes: libc::c_longlong,
        batch_size: libc::c_longlong,
        npts: libc::c_longlong,
        ncoeff: libc::c_longlong,
        ngrid: libc::c_longlong,
        width: libc::c_longlong,
    );
    fn degrid_strided_cuda_launcher(
        noncart_data: *mut f32,
        cart_data: *const f32,
        interp_value: *const f32,
        interp_index: *const i64,
        basis_adjoint: *const f32,
        nframes: libc::c_longlong,
        batch_size: libc::c_longlong,
        npts: libc::c_longlong,
        ncoeff: libc::c_longlong,
        ngrid: libc::c_longlong,
        width: libc::c_longlong,
    );
}

#[cfg(feature = "cuda")]
#[derive(Clone, Copy)]
enum CudaLaunch {
    Flat,
    Strided,
}

/// Host-side wrapper shared by both CUDA launch models: stage the five
/// arguments on the device, run the kernel, download the accumulated
/// output. Same in-place-accumulate contract as the CPU path.
#[cfg(feature = "cuda")]
fn degrid_gpu(
    launch: CudaLaunch,
    mut noncart_data: ArrayViewMut3<'_, f32>,
    cart_data: ArrayView3<'_, f32>,
    interp_value: ArrayView4<'_, f32>,
    interp_index: ArrayView4<'_, i64>,
    basis_adjoint: ArrayView2<'_, f32>,
) {
    use crate::backend::cuda::{cuda_device_synchronize, DeviceBuffer};

    let (nframes, batch_size, npts) = noncart_data.dim();
    let ncoeff = cart_data.shape()[0];
    let ngrid = cart_data.shape()[2];
    let xindex = interp_index.index_axis(Axis(0), 0);
    let xvalue = interp_value.index_axis(Axis(0), 0);
    let width = xindex.shape()[2];

    // Row-major staging copies for the FFI boundary.
    let mut out_host: Vec<f32> = noncart_data.iter().copied().collect();
    let cart_host: Vec<f32> = cart_data.iter().copied().collect();
    let value_host: Vec<f32> = xvalue.iter().copied().collect();
    let index_host: Vec<i64> = xindex.iter().copied().collect();
    let basis_host: Vec<f32> = basis_adjoint.iter().copied().collect();

    let mut d_out = DeviceBuffer::from_slice(&out_host);
    let d_cart = DeviceBuffer::from_slice(&cart_host);
    let d_value = DeviceBuffer::from_slice(&value_host);
    let d_index = DeviceBuffer::from_slice(&index_host);
    let d_basis = DeviceBuffer::from_slice(&basis_host);

    let launcher = match launch {
        CudaLaunch::Flat => degrid_flat_cuda_launcher,
        CudaLaunch::Strided => degrid_strided_cuda_launcher,
    };
    unsafe {
        launcher(
            d_out.as_mut_ptr(),
            d_cart.as_ptr(),
            d_value.as_ptr(),
            d_index.as_ptr(),
            d_basis.as_ptr(),
            nframes as libc::c_longlong,
            batch_size as libc::c_longlong,
            npts as libc::c_longlong,
            ncoeff as libc::c_longlong,
            ngrid as libc::c_longlong,
            width as libc::c_longlong,
        );
        cuda_device_synchronize();
    }

    d_out.copy_to(&mut out_host);
    for (dst, src) in noncart_data.iter_mut().zip(out_host) {
        *dst = src;
    }
}

/// CUDA de-gridding, one thread per output cell.
#[cfg(feature = "cuda")]
pub fn degrid_gpu_flat(
    noncart_data: ArrayViewMut3<'_, f32>,
    cart_data: ArrayView3<'_, f32>,
    interp_value: ArrayView4<'_, f32>,
    interp_index: ArrayView4<'_, i64>,
    basis_adjoint: ArrayView2<'_, f32>,
) {
    degrid_gpu(CudaLaunch::Flat, noncart_data, cart_data, interp_value, interp_index, basis_adjoint);
}

/// CUDA de-gridding, fixed grid with a grid-stride loop.
#[cfg(feature = "cuda")]
pub fn degrid_gpu_strided(
    noncart_data: ArrayViewMut3<'_, f32>,
    cart_data: ArrayView3<'_, f32>,
    interp_value: ArrayView4<'_, f32>,
    interp_index: ArrayView4<'_, i64>,
    basis_adjoint: ArrayView2<'_, f32>,
) {
    degrid_gpu(CudaLaunch::Strided, noncart_data, cart_data, interp_value, interp_index, basis_adjoint);
}
