//! Per-pixel class-id images from semantic segmentation.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::{MlTypesError, MlTypesResult};

/// A per-pixel class-id image.
///
/// Each pixel holds a class id. One id may be reserved as the null code
/// (unlabeled / background), which projection skips.
///
/// # Storage Format
///
/// Flat `Vec<u32>` in row-major order. For a pixel at `(x, y)` the index is
/// `y * width + x`.
///
/// # Example
///
/// ```
/// use ml_types::LabelImage;
///
/// let labels = LabelImage::from_data(2, 2, vec![0, 1, 255, 1])
///     .unwrap()
///     .with_null_id(255);
///
/// assert_eq!(labels.valid_at(1, 0), Some(1));
/// assert_eq!(labels.valid_at(0, 1), None); // null code
/// assert_eq!(labels.get(0, 1), Some(255));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelImage {
    width: u32,
    height: u32,
    data: Vec<u32>,
    null_id: Option<u32>,
}

impl LabelImage {
    /// An image where every pixel holds `class_id`.
    #[must_use]
    pub fn filled(width: u32, height: u32, class_id: u32) -> Self {
        Self {
            width,
            height,
            data: vec![class_id; width as usize * height as usize],
            null_id: None,
        }
    }

    /// Wrap existing row-major data.
    ///
    /// # Errors
    ///
    /// Returns [`MlTypesError::InvalidDimensions`] for a zero-sized image and
    /// [`MlTypesError::DataSizeMismatch`] if `data` has the wrong length.
    pub fn from_data(width: u32, height: u32, data: Vec<u32>) -> MlTypesResult<Self> {
        if width == 0 || height == 0 {
            return Err(MlTypesError::InvalidDimensions { width, height });
        }
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(MlTypesError::size_mismatch(expected, data.len()));
        }
        Ok(Self {
            width,
            height,
            data,
            null_id: None,
        })
    }

    /// Designate `null_id` as the unlabeled code.
    #[must_use]
    pub const fn with_null_id(mut self, null_id: u32) -> Self {
        self.null_id = Some(null_id);
        self
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

    /// The unlabeled code, if any.
    #[must_use]
    pub const fn null_id(&self) -> Option<u32> {
        self.null_id
    }

    /// Raw pixel data.
    #[must_use]
    pub fn data(&self) -> &[u32] {
        &self.data
    }

    /// Class id at a pixel, including the null code.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = y as usize * self.width as usize + x as usize;
        self.data.get(idx).copied()
    }

    /// Sets the class id at a pixel.
    ///
    /// Returns `false` if coordinates are out of bounds.
    pub fn set(&mut self, x: u32, y: u32, class_id: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let idx = y as usize * self.width as usize + x as usize;
        self.data.get_mut(idx).is_some_and(|pixel| {
            *pixel = class_id;
            true
        })
    }

    /// Returns `true` if `class_id` is the null code.
    #[must_use]
    pub fn is_null(&self, class_id: u32) -> bool {
        self.null_id == Some(class_id)
    }

    /// Class id at a pixel, or `None` if out of bounds or null.
    #[must_use]
    pub fn valid_at(&self, x: u32, y: u32) -> Option<u32> {
        self.get(x, y).filter(|&id| !self.is_null(id))
    }

    /// Largest non-null class id present.
    #[must_use]
    pub fn max_class_id(&self) -> Option<u32> {
        self.data.iter().copied().filter(|&id| !self.is_null(id)).max()
    }

    /// Pixel count per class id (null code included).
    #[must_use]
    pub fn class_counts(&self) -> HashMap<u32, usize> {
        let mut counts = HashMap::new();
        for &class_id in &self.data {
            *counts.entry(class_id).or_insert(0) += 1;
        }
        counts
    }
}
