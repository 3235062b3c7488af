//! regrid - fast NUFFT de-gridding with fused low-rank subspace
//! expansion.
//!
//! Converts gridded (Cartesian) coefficient data into non-uniform
//! sample data: for every non-uniform point, a weighted neighborhood of
//! grid values is gathered while the low-rank temporal coefficients are
//! expanded into the frame domain through the adjoint subspace basis.
//! The kernel accumulates into a caller-owned output buffer and runs on
//! multi-core CPU (rayon) or CUDA, selected once per process through
//! the backend registry.

pub mod backend;
pub mod error;
pub mod grid;
pub mod plan;

pub use backend::{capability, detect_gpu_backend, resolve, Capability, Device, GpuBackend};
pub use error::GridError;
pub use grid::{degrid, degrid_cpu, degrid_cpu_serial, DegridFn};
pub use plan::Mask;
