//! Multi-channel floating-point feature images.

use serde::{Deserialize, Serialize};

use crate::error::{MlTypesError, MlTypesResult};

/// A per-pixel feature image with a fixed channel count.
///
/// Used for softmax scores, RGB values, or any other continuous per-pixel
/// output. `NaN` marks a missing channel value; a pixel whose channels are
/// all `NaN` carries no data.
///
/// # Storage Format
///
/// Interleaved row-major: channel `c` of pixel `(x, y)` is at
/// `(y * width + x) * channels + c`.
///
/// # Example
///
/// ```
/// use ml_types::FeatureImage;
///
/// let img = FeatureImage::from_data(2, 1, 3, vec![0.1, 0.2, 0.7, f32::NAN, f32::NAN, f32::NAN])
///     .unwrap();
/// assert_eq!(img.pixel(0, 0), Some(&[0.1, 0.2, 0.7][..]));
/// assert!(img.is_missing(1, 0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImage {
    width: u32,
    height: u32,
    channels: usize,
    data: Vec<f32>,
}

impl FeatureImage {
    /// Wrap interleaved row-major data.
    ///
    /// # Errors
    ///
    /// Returns [`MlTypesError::InvalidDimensions`] for a zero-sized image,
    /// [`MlTypesError::InvalidChannels`] for zero channels, and
    /// [`MlTypesError::DataSizeMismatch`] if `data` has the wrong length.
    pub fn from_data(
        width: u32,
        height: u32,
        channels: usize,
        data: Vec<f32>,
    ) -> MlTypesResult<Self> {
        if width == 0 || height == 0 {
            return Err(MlTypesError::InvalidDimensions { width, height });
        }
        if channels == 0 {
            return Err(MlTypesError::InvalidChannels(channels));
        }
        let expected = width as usize * height as usize * channels;
        if data.len() != expected {
            return Err(MlTypesError::size_mismatch(expected, data.len()));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Number of channels per pixel.
    #[must_use]
    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Channel values at a pixel.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[f32]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = (y as usize * self.width as usize + x as usize) * self.channels;
        self.data.get(start..start + self.channels)
    }

    /// Returns `true` if every channel of the pixel is `NaN` (or it is out of bounds).
    #[must_use]
    pub fn is_missing(&self, x: u32, y: u32) -> bool {
        self.pixel(x, y).is_none_or(|p| p.iter().all(|v| v.is_nan()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        assert!(FeatureImage::from_data(1, 1, 0, vec![]).is_err());
        assert_eq!(
            FeatureImage::from_data(2, 2, 2, vec![0.0; 7]),
            Err(MlTypesError::size_mismatch(8, 7))
        );
    }

    #[test]
    fn test_partial_nan_not_missing() {
        let img = FeatureImage::from_data(1, 1, 2, vec![f32::NAN, 1.0]).unwrap();
        assert!(!img.is_missing(0, 0));
        assert!(img.is_missing(5, 5));
    }
}
