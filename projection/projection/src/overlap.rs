//! Which images see which faces.
//!
//! Projecting an image-identity label (every pixel of image `i` holds class
//! `i`) through the sparse accumulator yields the face × image incidence
//! matrix. It feeds view-selection optimizers that pick a minimal image set
//! covering the mesh.

use mesh_types::IndexedMesh;
use ml_types::{LabelImage, LabelKind};
use nalgebra_sparse::CsrMatrix;
use projection_accumulate::{Accumulator, LabelSource, ProjectorParams, Projections, Reduction, SparseAccumulator};
use projection_raster::Rasterizer;
use sensor_types::{Camera, CameraSet};
use tracing::info;

use crate::error::ProjectionResult;

/// Label source filling each image with its own index.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageIdLabels;

impl LabelSource for ImageIdLabels {
    fn label_for(&mut self, camera_index: usize, camera: &Camera) -> Option<LabelKind> {
        let id = u32::try_from(camera_index).ok()?;
        let (w, h) = camera.image_size();
        Some(LabelImage::filled(w, h, id).into())
    }
}

/// Face × image visibility counts.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageOverlap {
    matrix: CsrMatrix<u32>,
    counts: Vec<u32>,
}

impl ImageOverlap {
    /// Face × image matrix; entry `(f, i)` is 1 when image `i` sees face `f`.
    #[must_use]
    pub const fn matrix(&self) -> &CsrMatrix<u32> {
        &self.matrix
    }

    /// Consume into the CSR matrix.
    #[must_use]
    pub fn into_matrix(self) -> CsrMatrix<u32> {
        self.matrix
    }

    /// Number of images seeing each face.
    #[must_use]
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Images seeing one face.
    #[must_use]
    pub fn images_of(&self, face: usize) -> &[usize] {
        if face >= self.matrix.nrows() {
            return &[];
        }
        let offsets = self.matrix.row_offsets();
        &self.matrix.col_indices()[offsets[face]..offsets[face + 1]]
    }

    /// Faces seen by at least `min_images` images, ascending.
    #[must_use]
    pub fn faces_with_min_observations(&self, min_images: u32) -> Vec<usize> {
        faces_with_min_observations(&self.counts, min_images)
    }
}

/// Indices of faces whose count reaches `min_images`.
///
/// # Example
///
/// ```
/// use projection::faces_with_min_observations;
///
/// assert_eq!(faces_with_min_observations(&[0, 3, 1, 2], 2), vec![1, 3]);
/// ```
#[must_use]
pub fn faces_with_min_observations(counts: &[u32], min_images: u32) -> Vec<usize> {
    counts
        .iter()
        .enumerate()
        .filter_map(|(face, &n)| (n >= min_images).then_some(face))
        .collect()
}

/// Build the face × image incidence matrix of a scene.
///
/// # Errors
///
/// Returns rasterization or accumulation errors.
pub fn image_overlap_matrix(
    rasterizer: &Rasterizer,
    mesh: &IndexedMesh,
    cameras: &CameraSet,
) -> ProjectionResult<ImageOverlap> {
    if cameras.is_empty() {
        return Ok(ImageOverlap {
            matrix: CsrMatrix::zeros(mesh.face_count(), 0),
            counts: vec![0; mesh.face_count()],
        });
    }

    let params = ProjectorParams::for_classes(cameras.len())
        .reduction(Reduction::Sparse)
        .skip_null(false);
    let mut acc = SparseAccumulator::new(mesh.face_count(), cameras.len(), rasterizer.context())?;
    acc.add_all(Projections::new(rasterizer, mesh, cameras, ImageIdLabels, params)?)?;
    acc.flush();

    let counts = acc.counts();
    let matrix = acc.summed_csr().into_owned();
    info!(
        faces = mesh.face_count(),
        images = cameras.len(),
        incidences = matrix.nnz(),
        "built image overlap matrix"
    );
    Ok(ImageOverlap { matrix, counts })
}
