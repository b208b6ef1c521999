//! Error types for projection and accumulation.

use projection_raster::RasterError;
use thiserror::Error;

/// Result type alias for accumulation operations.
pub type AccumulateResult<T> = Result<T, AccumulateError>;

/// Errors that can occur while projecting images or accumulating results.
#[derive(Debug, Error)]
pub enum AccumulateError {
    /// Face id map length disagrees with the local accumulator.
    #[error("face id map holds {map_len} entries but the local accumulator has {face_count} faces")]
    FaceMapMismatch {
        /// Entries in the face id map.
        map_len: usize,
        /// Faces in the local accumulator.
        face_count: usize,
    },

    /// A face id does not exist in the target accumulator.
    #[error("face {face} out of range for {face_count} faces")]
    FaceOutOfRange {
        /// Offending face id.
        face: usize,
        /// Face count of the target.
        face_count: usize,
    },

    /// Two accumulators or a projection disagree on the class count.
    #[error("class count mismatch: expected {expected}, found {found}")]
    ClassCountMismatch {
        /// Class count of the target.
        expected: usize,
        /// Class count supplied.
        found: usize,
    },

    /// A class id is outside `0..class_count`.
    #[error("class {class} out of range for {class_count} classes")]
    ClassOutOfRange {
        /// Offending class id.
        class: u32,
        /// Valid class count.
        class_count: usize,
    },

    /// A per-image projection lists one face more than once.
    #[error("face {face} appears more than once in one projection")]
    DuplicateFace {
        /// Repeated face id.
        face: u32,
    },

    /// A label image cannot be sampled against its camera's raster.
    #[error(
        "label image for camera {camera} is {label_width}x{label_height}, \
         expected {native_width}x{native_height} or {raster_width}x{raster_height}"
    )]
    LabelShapeMismatch {
        /// Camera index.
        camera: usize,
        /// Label image width.
        label_width: u32,
        /// Label image height.
        label_height: u32,
        /// Camera native width.
        native_width: u32,
        /// Camera native height.
        native_height: u32,
        /// Rasterized width.
        raster_width: u32,
        /// Rasterized height.
        raster_height: u32,
    },

    /// A projection kind the accumulator cannot consume.
    #[error("incompatible projection: {0}")]
    IncompatibleProjection(String),

    /// Invalid parameters.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// A persisted snapshot is malformed.
    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    /// Rasterization failed.
    #[error(transparent)]
    Raster(#[from] RasterError),

    /// Snapshot file I/O failed.
    #[error("snapshot I/O: {0}")]
    Io(#[from] std::io::Error),
}

impl AccumulateError {
    /// Create an invalid params error.
    #[must_use]
    pub fn invalid_params(details: impl Into<String>) -> Self {
        Self::InvalidParams(details.into())
    }

    /// Create a corrupt snapshot error.
    #[must_use]
    pub fn corrupt(details: impl Into<String>) -> Self {
        Self::CorruptSnapshot(details.into())
    }

    /// Create an incompatible projection error.
    #[must_use]
    pub fn incompatible(details: impl Into<String>) -> Self {
        Self::IncompatibleProjection(details.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AccumulateError::FaceMapMismatch {
            map_len: 3,
            face_count: 4,
        };
        assert!(format!("{err}").contains("3 entries"));

        let err = AccumulateError::FaceOutOfRange {
            face: 10,
            face_count: 5,
        };
        assert!(format!("{err}").contains("face 10"));

        let err = AccumulateError::DuplicateFace { face: 7 };
        assert!(format!("{err}").contains("face 7"));

        let err = AccumulateError::corrupt("row offsets");
        assert!(format!("{err}").contains("row offsets"));

        let err: AccumulateError = RasterError::EmptyBatch.into();
        assert!(format!("{err}").contains("empty"));
    }
}
