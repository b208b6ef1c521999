//! Parameters for per-image projection.

use serde::{Deserialize, Serialize};

use crate::error::{AccumulateError, AccumulateResult};

/// How the projector reduces the pixels that land on one face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    /// Per-channel mean; class ids are one-hot encoded first.
    #[default]
    Dense,
    /// Majority class id per face.
    Sparse,
}

/// Parameters for the per-image projector.
///
/// # Example
///
/// ```
/// use projection_accumulate::{ProjectorParams, Reduction};
///
/// let params = ProjectorParams::for_classes(5).reduction(Reduction::Sparse);
/// assert_eq!(params.num_classes, Some(5));
/// assert!(params.skip_null);
/// assert!(params.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectorParams {
    /// Reduction used for every image.
    pub reduction: Reduction,

    /// Width of the one-hot encoding for class-id images.
    ///
    /// Required for dense reduction of class-id images.
    pub num_classes: Option<usize>,

    /// Skip null-coded class pixels and all-NaN feature pixels.
    pub skip_null: bool,
}

impl Default for ProjectorParams {
    fn default() -> Self {
        Self {
            reduction: Reduction::Dense,
            num_classes: None,
            skip_null: true,
        }
    }
}

impl ProjectorParams {
    /// Dense one-hot projection over `num_classes` classes.
    #[must_use]
    pub const fn for_classes(num_classes: usize) -> Self {
        Self {
            reduction: Reduction::Dense,
            num_classes: Some(num_classes),
            skip_null: true,
        }
    }

    /// Set the reduction.
    #[must_use]
    pub const fn reduction(mut self, reduction: Reduction) -> Self {
        self.reduction = reduction;
        self
    }

    /// Set the class count.
    #[must_use]
    pub const fn num_classes(mut self, num_classes: usize) -> Self {
        self.num_classes = Some(num_classes);
        self
    }

    /// Enable or disable null skipping.
    #[must_use]
    pub const fn skip_null(mut self, skip: bool) -> Self {
        self.skip_null = skip;
        self
    }

    /// Check parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`AccumulateError::InvalidParams`] for a zero class count.
    pub fn validate(&self) -> AccumulateResult<()> {
        if self.num_classes == Some(0) {
            return Err(AccumulateError::invalid_params("class count must be at least 1"));
        }
        Ok(())
    }
}
