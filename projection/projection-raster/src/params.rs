//! Parameters for pix-to-face rasterization.

use serde::{Deserialize, Serialize};

use crate::error::{RasterError, RasterResult};

/// Parameters for rasterization.
///
/// # Example
///
/// ```
/// use projection_raster::RasterParams;
///
/// let params = RasterParams::default().scale(0.25).batch_size(16).cull_to_frustum(true);
/// assert!((params.scale - 0.25).abs() < 1e-12);
/// assert_eq!(params.batch_size, 16);
/// assert!(params.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterParams {
    /// Factor applied to each camera's native resolution.
    /// Values below 1 trade correspondence density for speed.
    pub scale: f64,

    /// Number of cameras rasterized together.
    pub batch_size: usize,

    /// Skip faces entirely outside a camera's frustum before rasterizing.
    pub cull_to_frustum: bool,

    /// Minimum view depth; triangles with a vertex nearer than this are skipped.
    ///
    /// Crossing triangles are dropped whole, not clipped, so a large face
    /// that spans the camera plane loses the pixels of its visible part.
    /// Nadir and oblique aerial views keep the whole mesh in front of the
    /// camera; close-range scenes with faces surrounding the camera should
    /// be subdivided first.
    pub near_plane: f64,
}

impl Default for RasterParams {
    fn default() -> Self {
        Self {
            scale: 1.0,
            batch_size: 8,
            cull_to_frustum: false,
            near_plane: 1e-3,
        }
    }
}

impl RasterParams {
    /// Set the output scale factor.
    #[must_use]
    pub const fn scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Set the camera batch size.
    #[must_use]
    pub const fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Enable or disable frustum culling.
    #[must_use]
    pub const fn cull_to_frustum(mut self, cull: bool) -> Self {
        self.cull_to_frustum = cull;
        self
    }

    /// Set the near plane distance.
    #[must_use]
    pub const fn near_plane(mut self, near: f64) -> Self {
        self.near_plane = near;
        self
    }

    /// Check parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidScale`] for a non-positive scale and
    /// [`RasterError::InvalidParams`] for a zero batch size or bad near plane.
    pub fn validate(&self) -> RasterResult<()> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(RasterError::InvalidScale(self.scale));
        }
        if self.batch_size == 0 {
            return Err(RasterError::invalid_params("batch size must be at least 1"));
        }
        if !(self.near_plane.is_finite() && self.near_plane > 0.0) {
            return Err(RasterError::invalid_params(format!(
                "near plane must be positive, got {}",
                self.near_plane
            )));
        }
        Ok(())
    }
}
