//! Error types for sensor operations.

use thiserror::Error;

/// Result type alias for sensor operations.
pub type SensorResult<T> = Result<T, SensorError>;

/// Errors that can occur when working with camera and terrain data.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SensorError {
    /// Invalid coordinate value (e.g., `NaN` or out of range).
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// Buffer size mismatch (e.g., raster buffer wrong size).
    #[error("buffer size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch {
        /// Expected buffer size.
        expected: usize,
        /// Actual buffer size.
        actual: usize,
    },

    /// Camera intrinsics are unusable.
    #[error("invalid intrinsics: {0}")]
    InvalidIntrinsics(String),

    /// World-to-camera transform is not a rigid, invertible pose.
    #[error("invalid pose: {0}")]
    InvalidPose(String),

    /// Camera index outside the set.
    #[error("camera index {index} out of range for set of {len}")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of cameras in the set.
        len: usize,
    },
}

impl SensorError {
    /// Creates a buffer size mismatch error.
    #[must_use]
    pub const fn buffer_mismatch(expected: usize, actual: usize) -> Self {
        Self::BufferSizeMismatch { expected, actual }
    }

    /// Creates an invalid intrinsics error.
    #[must_use]
    pub fn invalid_intrinsics(details: impl Into<String>) -> Self {
        Self::InvalidIntrinsics(details.into())
    }

    /// Creates an invalid pose error.
    #[must_use]
    pub fn invalid_pose(details: impl Into<String>) -> Self {
        Self::InvalidPose(details.into())
    }
}
