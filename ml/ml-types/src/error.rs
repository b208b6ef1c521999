//! Error types for ml-types crate.

use thiserror::Error;

/// Result type alias for label image operations.
pub type MlTypesResult<T> = Result<T, MlTypesError>;

/// Errors that can occur in ml-types operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MlTypesError {
    /// Invalid image dimensions.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },

    /// Invalid channel count for a feature image.
    #[error("invalid channel count: {0}")]
    InvalidChannels(usize),

    /// Data size mismatch.
    #[error("data size mismatch: expected {expected}, got {actual}")]
    DataSizeMismatch {
        /// Expected size.
        expected: usize,
        /// Actual size.
        actual: usize,
    },
}

impl MlTypesError {
    /// Create a data size mismatch error.
    #[must_use]
    pub const fn size_mismatch(expected: usize, actual: usize) -> Self {
        Self::DataSizeMismatch { expected, actual }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MlTypesError::InvalidDimensions {
            width: 0,
            height: 4,
        };
        assert!(format!("{err}").contains("0x4"));

        let err = MlTypesError::size_mismatch(16, 12);
        let msg = format!("{err}");
        assert!(msg.contains("16"));
        assert!(msg.contains("12"));

        assert!(format!("{}", MlTypesError::InvalidChannels(0)).contains('0'));
    }
}
