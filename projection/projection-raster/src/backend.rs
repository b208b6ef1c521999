//! Rasterization backend seam.
//!
//! A backend rasterizes one mesh against a batch of cameras. Face ids it
//! returns live in a *packed* index space: the mesh is conceptually
//! replicated once per camera, so camera `k` of the batch reports face `f`
//! as `k * face_count + f`. [`crate::Rasterizer`] undoes this offset.

use mesh_types::IndexedMesh;

use crate::error::RasterResult;
use crate::{ExecutionContext, RasterParams, RenderCameras};

/// Packed sentinel for a pixel with no face.
pub const NO_PACKED_FACE: i64 = -1;

/// Raw per-pixel rasterization output for one camera of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragments {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Packed face id per pixel, or [`NO_PACKED_FACE`].
    pub packed_faces: Vec<i64>,
    /// Perspective-correct barycentric weights of the visible face.
    pub barycentric: Vec<[f32; 3]>,
    /// View depth of the visible surface (`f32::INFINITY` where empty).
    pub depth: Vec<f32>,
}

impl Fragments {
    /// Empty fragments of the given size.
    #[must_use]
    pub fn empty(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            packed_faces: vec![NO_PACKED_FACE; len],
            barycentric: vec![[0.0; 3]; len],
            depth: vec![f32::INFINITY; len],
        }
    }
}

/// A rasterization primitive.
///
/// Implementations must resolve visibility with a z-buffer (nearest face
/// wins) and report ids in the packed index space described in the module
/// docs. The returned vector holds one [`Fragments`] per camera, in batch
/// order, at the batch's image size.
pub trait RasterBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Rasterize `mesh` against every camera in `cameras`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot complete the batch.
    fn rasterize_batch(
        &self,
        context: &ExecutionContext,
        cameras: &RenderCameras,
        mesh: &IndexedMesh,
        params: &RasterParams,
    ) -> RasterResult<Vec<Fragments>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_fragments() {
        let f = Fragments::empty(4, 3);
        assert_eq!(f.packed_faces.len(), 12);
        assert!(f.packed_faces.iter().all(|&p| p == NO_PACKED_FACE));
        assert!(f.depth.iter().all(|d| d.is_infinite()));
    }
}
