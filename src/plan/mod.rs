//! Sampling-pattern planning.
//!
//! [`Mask`] canonicalizes a user-supplied set of non-uniform point
//! indices into the dimension-ordered per-axis tuple the interpolation
//! kernels address, decoupled from kernel execution. Built once per
//! sampling pattern and reused across invocations.

use ndarray::{Array2, ArrayViewD, Axis};

use crate::backend::Device;
use crate::error::GridError;

#[cfg(feature = "cuda")]
use crate::backend::cuda::DeviceBuffer;

/// Canonicalized sampling pattern.
///
/// `index` holds one `[nframes, npts]` array per spatial axis, in
/// reversed geometric order: (x, y, z) input becomes (z, y, x), matching
/// the row-major stride convention of the flattened grid.
#[derive(Debug)]
pub struct Mask {
    index: Vec<Array2<i64>>,
    #[cfg(feature = "cuda")]
    device_index: Vec<DeviceBuffer<i64>>,
    dshape: Vec<usize>,
    ishape: Vec<usize>,
    ndim: usize,
    device: Option<Device>,
    transfers: usize,
}

impl Mask {
    /// Normalize `indexes` (`[..., ndim]`, leading frame/spatial axes
    /// optional) against a grid `shape` (scalar, i.e. length 1, or one
    /// entry per axis).
    pub fn new(indexes: ArrayViewD<'_, i64>, shape: &[usize]) -> Result<Mask, GridError> {
        let rank = indexes.ndim();
        if rank < 2 {
            return Err(GridError::IndexRank(rank));
        }
        let ndim = indexes.shape()[rank - 1];

        // Left-pad the leading shape with singleton axes so addressing
        // is always [nframes, ...dshape, ndim].
        let mut leading: Vec<usize> = indexes.shape()[..rank - 1].to_vec();
        while leading.len() < 2 {
            leading.insert(0, 1);
        }
        let nframes = leading[0];
        let dshape: Vec<usize> = leading[1..].to_vec();
        let npts: usize = dshape.iter().product();

        let ishape: Vec<usize> = if shape.len() == 1 {
            vec![shape[0]; ndim]
        } else if shape.len() == ndim {
            shape.to_vec()
        } else {
            return Err(GridError::ShapeMismatch { ndim, got: shape.len() });
        };

        let flat = indexes
            .to_owned()
            .into_shape((nframes, npts, ndim))
            .expect("index reshape preserves element count");

        // Split coordinate-first, then revert axis order (x, y, z) ->
        // (z, y, x).
        let mut index: Vec<Array2<i64>> = (0..ndim)
            .map(|axis| flat.index_axis(Axis(2), axis).to_owned())
            .collect();
        index.reverse();

        Ok(Mask {
            index,
            #[cfg(feature = "cuda")]
            device_index: Vec::new(),
            dshape,
            ishape,
            ndim,
            device: None,
            transfers: 0,
        })
    }

    /// Per-axis index arrays, reversed axis order.
    pub fn index(&self) -> &[Array2<i64>] {
        &self.index
    }

    /// Flattened spatial shape of the point set.
    pub fn dshape(&self) -> &[usize] {
        &self.dshape
    }

    /// Per-axis grid shape.
    pub fn ishape(&self) -> &[usize] {
        &self.ishape
    }

    pub fn ndim(&self) -> usize {
        self.ndim
    }

    pub fn device(&self) -> Option<Device> {
        self.device
    }

    /// Device-resident index tuple, populated after `to(Device::Gpu)`.
    #[cfg(feature = "cuda")]
    pub fn device_index(&self) -> &[DeviceBuffer<i64>] {
        &self.device_index
    }

    /// Move the index tuple to `device`, in place. Idempotent: a no-op
    /// when already resident there. Returns `self` for chaining.
    pub fn to(&mut self, device: Device) -> Result<&mut Mask, GridError> {
        if self.device == Some(device) {
            return Ok(self);
        }

        match device {
            Device::Cpu => {
                // Host copy stays authoritative; just drop GPU mirrors.
                #[cfg(feature = "cuda")]
                self.device_index.clear();
            }
            Device::Gpu => {
                #[cfg(feature = "cuda")]
                {
                    if !crate::backend::capability().gpu_available {
                        return Err(GridError::BackendUnavailable(Device::Gpu));
                    }
                    self.device_index = self
                        .index
                        .iter()
                        .map(|axis| {
                            let host: Vec<i64> = axis.iter().copied().collect();
                            DeviceBuffer::from_slice(&host)
                        })
                        .collect();
                }
                #[cfg(not(feature = "cuda"))]
                return Err(GridError::BackendUnavailable(Device::Gpu));
            }
        }

        self.device = Some(device);
        self.transfers += 1;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array4};

    #[test]
    fn flat_point_list_is_normalized() {
        // 4 points in 2D, coords (x = p, y = 10 + p).
        let indexes =
            Array2::from_shape_fn((4, 2), |(p, axis)| if axis == 0 { p as i64 } else { 10 + p as i64 });
        let mask = Mask::new(indexes.view().into_dyn(), &[64]).unwrap();

        assert_eq!(mask.ndim(), 2);
        assert_eq!(mask.dshape(), &[4]);
        assert_eq!(mask.ishape(), &[64, 64]);
        assert_eq!(mask.device(), None);

        // Axis order is reversed: y first, then x.
        assert_eq!(mask.index().len(), 2);
        assert_eq!(mask.index()[0].dim(), (1, 4));
        for p in 0..4 {
            assert_eq!(mask.index()[0][[0, p]], 10 + p as i64);
            assert_eq!(mask.index()[1][[0, p]], p as i64);
        }
    }

    #[test]
    fn leading_spatial_axes_are_flattened() {
        let indexes = Array4::<i64>::zeros((2, 3, 5, 1));
        let mask = Mask::new(indexes.view().into_dyn(), &[32]).unwrap();

        assert_eq!(mask.dshape(), &[3, 5]);
        assert_eq!(mask.ishape(), &[32]);
        assert_eq!(mask.index()[0].dim(), (2, 15));
    }

    #[test]
    fn per_axis_shape_must_match_ndim() {
        let indexes = Array2::<i64>::zeros((4, 3));
        let err = Mask::new(indexes.view().into_dyn(), &[16, 16]).unwrap_err();
        assert!(matches!(err, GridError::ShapeMismatch { ndim: 3, got: 2 }));
    }

    #[test]
    fn scalar_index_array_is_rejected() {
        let indexes = ndarray::Array1::<i64>::zeros(3);
        let err = Mask::new(indexes.view().into_dyn(), &[16]).unwrap_err();
        assert!(matches!(err, GridError::IndexRank(1)));
    }

    #[test]
    fn device_transfer_is_idempotent() {
        let indexes = Array2::<i64>::zeros((4, 1));
        let mut mask = Mask::new(indexes.view().into_dyn(), &[8]).unwrap();
        assert_eq!(mask.transfers, 0);

        mask.to(Device::Cpu).unwrap();
        assert_eq!(mask.device(), Some(Device::Cpu));
        assert_eq!(mask.transfers, 1);

        // Second transfer to the same device must not re-trigger one.
        mask.to(Device::Cpu).unwrap();
        assert_eq!(mask.transfers, 1);
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn gpu_transfer_without_cuda_is_an_error() {
        let indexes = Array2::<i64>::zeros((4, 1));
        let mut mask = Mask::new(indexes.view().into_dyn(), &[8]).unwrap();
        let err = mask.to(Device::Gpu).unwrap_err();
        assert!(matches!(err, GridError::BackendUnavailable(Device::Gpu)));
    }
}
