//! Error types for spatial chunking.

use mesh_types::MeshError;
use sensor_types::SensorError;
use thiserror::Error;

/// Result type alias for chunking operations.
pub type ChunkResult<T> = Result<T, ChunkError>;

/// Errors that can occur while chunking a scene.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ChunkError {
    /// Zero clusters were requested.
    #[error("cluster count must be at least 1")]
    ZeroClusters,

    /// Buffer distance is negative or not finite.
    #[error("invalid buffer distance {0} m")]
    InvalidBuffer(f64),

    /// The camera set is empty.
    #[error("no cameras to cluster")]
    NoCameras,

    /// Invalid chunking parameters.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// The mesh failed validation or extraction.
    #[error(transparent)]
    Mesh(#[from] MeshError),

    /// A camera subset or anchor was invalid.
    #[error(transparent)]
    Sensor(#[from] SensorError),
}

impl ChunkError {
    /// Create an invalid params error.
    #[must_use]
    pub fn invalid_params(details: impl Into<String>) -> Self {
        Self::InvalidParams(details.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert!(format!("{}", ChunkError::ZeroClusters).contains("at least 1"));
        assert!(format!("{}", ChunkError::InvalidBuffer(-3.0)).contains("-3"));
        assert!(format!("{}", ChunkError::NoCameras).contains("no cameras"));
        let err: ChunkError = SensorError::IndexOutOfRange { index: 4, len: 2 }.into();
        assert!(format!("{err}").contains('4'));
    }
}
