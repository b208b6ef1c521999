//! Error types for render-space conversion and rasterization.

use thiserror::Error;

use crate::BackendType;

/// Result type alias for rasterization operations.
pub type RasterResult<T> = Result<T, RasterError>;

/// Errors that can occur while converting cameras or rasterizing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RasterError {
    /// Batched cameras do not share one image size.
    #[error(
        "camera {camera} has image size {found_width}x{found_height}, \
         batch expects {expected_width}x{expected_height}"
    )]
    InconsistentImageSize {
        /// Index of the first offending camera in the batch.
        camera: usize,
        /// Width of the first camera.
        expected_width: u32,
        /// Height of the first camera.
        expected_height: u32,
        /// Width of the offending camera.
        found_width: u32,
        /// Height of the offending camera.
        found_height: u32,
    },

    /// A batch was requested with no cameras.
    #[error("camera batch is empty")]
    EmptyBatch,

    /// Output scale factor is not a positive finite number.
    #[error("invalid image scale {0}")]
    InvalidScale(f64),

    /// Invalid rasterization parameters.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// Vertex feature buffer does not match the mesh.
    #[error("vertex features hold {actual} values, expected {expected}")]
    TextureMismatch {
        /// Expected number of values (`vertex_count * channels`).
        expected: usize,
        /// Number of values supplied.
        actual: usize,
    },

    /// The requested execution backend cannot run in this build.
    #[error("backend {0:?} is not available")]
    BackendUnavailable(BackendType),

    /// The backend failed while rasterizing.
    #[error("rasterization failed: {0}")]
    BackendFailed(String),
}

impl RasterError {
    /// Create an invalid params error.
    #[must_use]
    pub fn invalid_params(details: impl Into<String>) -> Self {
        Self::InvalidParams(details.into())
    }

    /// Create a backend failure error.
    #[must_use]
    pub fn backend_failed(details: impl Into<String>) -> Self {
        Self::BackendFailed(details.into())
    }
}
