use thiserror::Error;

use crate::backend::Device;

/// Errors surfaced by plan construction and backend dispatch.
///
/// Hot-loop contract violations (out-of-range interpolation indices,
/// mixed-device arguments) are deliberately not represented here; they
/// are caller preconditions checked only by `debug_assert!` in debug
/// builds.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("index array must have at least 2 axes, got {0}")]
    IndexRank(usize),

    #[error("grid shape must have 1 or {ndim} entries, got {got}")]
    ShapeMismatch { ndim: usize, got: usize },

    #[error("no kernel bound for device {0:?} (is the `cuda` feature enabled and a GPU present?)")]
    BackendUnavailable(Device),
}
