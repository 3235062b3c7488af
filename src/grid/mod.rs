//! De-gridding (adjoint interpolation) kernels.
//!
//! Grid-to-non-uniform resampling fused with the adjoint low-rank
//! subspace expansion, in one CPU and two CUDA renditions of the same
//! per-cell algorithm.

pub mod degrid;

pub use self::degrid::{degrid_cpu, degrid_cpu_serial};

#[cfg(feature = "cuda")]
pub use self::degrid::{degrid_gpu_flat, degrid_gpu_strided};

use ndarray::{ArrayView2, ArrayView3, ArrayView4, ArrayViewMut3};

use crate::backend::{self, Device};
use crate::error::GridError;

/// Entry-point signature shared by every backend: accumulate into
/// `noncart_data` in place, return nothing.
pub type DegridFn = for<'a> fn(
    ArrayViewMut3<'a, f32>,
    ArrayView3<'a, f32>,
    ArrayView4<'a, f32>,
    ArrayView4<'a, i64>,
    ArrayView2<'a, f32>,
);

/// Run the de-gridding kernel bound to `device`.
///
/// `noncart_data` is accumulated into, never initialized; pre-zero it
/// unless accumulation across calls is intended. All five arguments
/// must already share the device's memory space.
pub fn degrid<'a>(
    device: Device,
    noncart_data: ArrayViewMut3<'a, f32>,
    cart_data: ArrayView3<'a, f32>,
    interp_value: ArrayView4<'a, f32>,
    interp_index: ArrayView4<'a, i64>,
    basis_adjoint: ArrayView2<'a, f32>,
) -> Result<(), GridError> {
    let kernel = backend::resolve(device).ok_or(GridError::BackendUnavailable(device))?;
    kernel(noncart_data, cart_data, interp_value, interp_index, basis_adjoint);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{Array2, Array3, Array4};

    #[test]
    fn dispatch_runs_the_cpu_kernel() {
        let mut noncart = Array3::<f32>::zeros((1, 1, 1));
        let cart = Array3::from_shape_vec((1, 1, 2), vec![2.0, 5.0]).unwrap();
        let value = Array4::from_shape_vec((1, 1, 1, 2), vec![0.5, 0.5]).unwrap();
        let index = Array4::from_shape_vec((1, 1, 1, 2), vec![0i64, 1]).unwrap();
        let basis = Array2::from_elem((1, 1), 1.0f32);

        degrid(
            Device::Cpu,
            noncart.view_mut(),
            cart.view(),
            value.view(),
            index.view(),
            basis.view(),
        )
        .unwrap();
        assert_relative_eq!(noncart[[0, 0, 0]], 3.5);
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn dispatch_to_missing_gpu_is_an_error() {
        let mut noncart = Array3::<f32>::zeros((1, 1, 1));
        let cart = Array3::<f32>::zeros((1, 1, 1));
        let value = Array4::<f32>::zeros((1, 1, 1, 1));
        let index = Array4::<i64>::zeros((1, 1, 1, 1));
        let basis = Array2::<f32>::zeros((1, 1));

        let err = degrid(
            Device::Gpu,
            noncart.view_mut(),
            cart.view(),
            value.view(),
            index.view(),
            basis.view(),
        )
        .unwrap_err();
        assert!(matches!(err, GridError::BackendUnavailable(Device::Gpu)));
    }
}
