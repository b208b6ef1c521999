//! The two per-pixel prediction forms a label source can deliver.

use serde::{Deserialize, Serialize};

use crate::{FeatureImage, LabelImage};

/// Per-pixel predictions for one image.
///
/// # Example
///
/// ```
/// use ml_types::{LabelImage, LabelKind};
///
/// let kind = LabelKind::from(LabelImage::filled(4, 3, 1));
/// assert_eq!(kind.dimensions(), (4, 3));
/// assert!(kind.as_classes().is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LabelKind {
    /// Discrete class ids.
    Classes(LabelImage),
    /// Continuous per-channel features.
    Features(FeatureImage),
}

impl LabelKind {
    /// Image size as `(width, height)`.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Classes(img) => (img.width(), img.height()),
            Self::Features(img) => (img.width(), img.height()),
        }
    }

    /// The class-id image, if this is one.
    #[must_use]
    pub const fn as_classes(&self) -> Option<&LabelImage> {
        match self {
            Self::Classes(img) => Some(img),
            Self::Features(_) => None,
        }
    }

    /// The feature image, if this is one.
    #[must_use]
    pub const fn as_features(&self) -> Option<&FeatureImage> {
        match self {
            Self::Features(img) => Some(img),
            Self::Classes(_) => None,
        }
    }
}

impl From<LabelImage> for LabelKind {
    fn from(img: LabelImage) -> Self {
        Self::Classes(img)
    }
}

impl From<FeatureImage> for LabelKind {
    fn from(img: FeatureImage) -> Self {
        Self::Features(img)
    }
}
