//! Error type of the aggregation facade.

use mesh_types::MeshError;
use projection_accumulate::AccumulateError;
use projection_chunk::ChunkError;
use projection_raster::RasterError;
use sensor_types::SensorError;
use thiserror::Error;

/// Result type alias for facade operations.
pub type ProjectionResult<T> = Result<T, ProjectionError>;

/// Errors surfaced by the aggregation pipeline.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Per-face inputs disagree in length.
    #[error("{what} has {found} entries, expected {expected}")]
    LengthMismatch {
        /// Name of the offending input.
        what: &'static str,
        /// Expected length.
        expected: usize,
        /// Actual length.
        found: usize,
    },

    /// Configuration file could not be parsed.
    #[error("configuration parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Mesh error.
    #[error(transparent)]
    Mesh(#[from] MeshError),

    /// Camera or geodesy error.
    #[error(transparent)]
    Sensor(#[from] SensorError),

    /// Rasterization error.
    #[error(transparent)]
    Raster(#[from] RasterError),

    /// Projection or accumulation error.
    #[error(transparent)]
    Accumulate(#[from] AccumulateError),

    /// Chunking error.
    #[error(transparent)]
    Chunk(#[from] ChunkError),
}

impl ProjectionError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(details: impl Into<String>) -> Self {
        Self::InvalidConfig(details.into())
    }

    /// Check a per-face input length.
    pub(crate) fn check_len(what: &'static str, expected: usize, found: usize) -> ProjectionResult<()> {
        if expected == found {
            Ok(())
        } else {
            Err(Self::LengthMismatch { what, expected, found })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProjectionError::invalid_config("num_classes missing");
        assert!(format!("{err}").contains("num_classes"));

        let err: ProjectionError = ChunkError::ZeroClusters.into();
        assert!(format!("{err}").contains("at least 1"));

        let err = ProjectionError::check_len("centroids", 3, 2).unwrap_err();
        assert_eq!(format!("{err}"), "centroids has 2 entries, expected 3");
        assert!(ProjectionError::check_len("classes", 4, 4).is_ok());
    }
}
