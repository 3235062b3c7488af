//! Backend capability detection and kernel registry.
//!
//! Capability probing is a plain function returning a value; the result
//! is cached once per process in a `OnceLock` and turned into a mapping
//! from [`Device`] to a concrete de-gridding entry point. The CPU entry
//! point is always bound. The GPU entry point, when present, is exactly
//! one of the two launch models, never both.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::grid::DegridFn;

#[cfg(feature = "cuda")]
pub mod cuda;

/// Backend tag used to index the kernel registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Device {
    Cpu,
    Gpu,
}

/// The two mutually exclusive GPU launch models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuBackend {
    /// One thread per output cell; the launch grid is rounded up to the
    /// next block-size multiple, so the kernel bounds-checks its index.
    Flat,
    /// Fixed-size launch grid with a grid-stride loop over the cells.
    Strided,
}

/// Outcome of GPU capability detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    pub gpu_available: bool,
    pub gpu_backend: Option<GpuBackend>,
}

impl Capability {
    pub const CPU_ONLY: Capability = Capability {
        gpu_available: false,
        gpu_backend: None,
    };
}

/// Probe for a usable GPU and pick the launch model.
///
/// A CUDA runtime failure is downgraded to a CPU-only capability with a
/// warning; it never reaches kernel call sites. The launch model
/// defaults to [`GpuBackend::Flat`] and can be switched with
/// `REGRID_GPU_KERNEL=strided`.
pub fn detect_gpu_backend() -> Capability {
    #[cfg(feature = "cuda")]
    {
        match cuda::device_count() {
            Ok(n) if n > 0 => {
                let gpu_backend = match std::env::var("REGRID_GPU_KERNEL").as_deref() {
                    Ok("strided") => GpuBackend::Strided,
                    _ => GpuBackend::Flat,
                };
                log::info!("detected {} CUDA device(s), using {:?} launch model", n, gpu_backend);
                return Capability {
                    gpu_available: true,
                    gpu_backend: Some(gpu_backend),
                };
            }
            Ok(_) => {
                log::info!("CUDA runtime present but no device found, falling back to CPU");
            }
            Err(code) => {
                log::warn!("CUDA device query failed with error code {}, GPU disabled", code);
            }
        }
    }

    Capability::CPU_ONLY
}

/// Detection result, evaluated once per process lifetime.
pub fn capability() -> &'static Capability {
    static CAPABILITY: OnceLock<Capability> = OnceLock::new();
    CAPABILITY.get_or_init(detect_gpu_backend)
}

/// Build a kernel registry for a given capability.
///
/// Kept separate from [`kernels`] so that selection can be exercised
/// with injected capabilities in tests.
pub fn build_registry(cap: &Capability) -> BTreeMap<Device, DegridFn> {
    let mut registry: BTreeMap<Device, DegridFn> = BTreeMap::new();
    registry.insert(Device::Cpu, crate::grid::degrid_cpu::<f32>);

    #[cfg(feature = "cuda")]
    if cap.gpu_available {
        let kernel: DegridFn = match cap.gpu_backend {
            Some(GpuBackend::Strided) => crate::grid::degrid_gpu_strided,
            _ => crate::grid::degrid_gpu_flat,
        };
        registry.insert(Device::Gpu, kernel);
    }

    #[cfg(not(feature = "cuda"))]
    let _ = cap;

    registry
}

/// The process-wide registry, built once from the detected capability.
pub fn kernels() -> &'static BTreeMap<Device, DegridFn> {
    static KERNELS: OnceLock<BTreeMap<Device, DegridFn>> = OnceLock::new();
    KERNELS.get_or_init(|| build_registry(capability()))
}

/// Look up the entry point bound to a backend tag.
pub fn resolve(device: Device) -> Option<DegridFn> {
    kernels().get(&device).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_entry_point_always_bound() {
        let registry = build_registry(&Capability::CPU_ONLY);
        assert!(registry.contains_key(&Device::Cpu));
        assert!(!registry.contains_key(&Device::Gpu));
    }

    #[test]
    fn resolve_matches_registry() {
        assert!(resolve(Device::Cpu).is_some());
        if !capability().gpu_available {
            assert!(resolve(Device::Gpu).is_none());
        }
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn detection_without_cuda_is_cpu_only() {
        assert_eq!(detect_gpu_backend(), Capability::CPU_ONLY);
    }
}
