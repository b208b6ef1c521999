//! Per-pixel visible-face rasters.

use hashbrown::HashMap;

/// Sentinel for a pixel that sees no face.
pub const NO_FACE: i32 = -1;

/// The visible face for every pixel of one camera.
///
/// Shape is `(height, width)`, row-major. Face ids are in the index space
/// of the mesh that was rasterized; [`NO_FACE`] marks empty pixels.
///
/// # Example
///
/// ```
/// use projection_raster::{PixToFace, NO_FACE};
///
/// let p2f = PixToFace::from_data(2, 2, vec![0, 0, NO_FACE, 3]).unwrap();
/// assert_eq!(p2f.face_at(1, 1), Some(3));
/// assert_eq!(p2f.face_at(0, 1), None);
/// assert_eq!(p2f.unique_faces(), vec![0, 3]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixToFace {
    width: u32,
    height: u32,
    faces: Vec<i32>,
}

impl PixToFace {
    /// A raster where no pixel sees a face.
    #[must_use]
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            faces: vec![NO_FACE; width as usize * height as usize],
        }
    }

    /// Wrap row-major face ids. Returns `None` on a length mismatch.
    #[must_use]
    pub fn from_data(width: u32, height: u32, faces: Vec<i32>) -> Option<Self> {
        (faces.len() == width as usize * height as usize).then_some(Self {
            width,
            height,
            faces,
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

    /// Raw row-major face ids (including [`NO_FACE`]).
    #[must_use]
    pub fn as_slice(&self) -> &[i32] {
        &self.faces
    }

    /// Face visible at `(x, y)`.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn face_at(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let f = *self.faces.get(y as usize * self.width as usize + x as usize)?;
        (f >= 0).then_some(f as u32)
    }

    /// Iterate `(x, y, face)` over pixels that see a face.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn covered(&self) -> impl Iterator<Item = (u32, u32, u32)> + '_ {
        let width = self.width as usize;
        self.faces
            .iter()
            .enumerate()
            .filter(|&(_, &f)| f >= 0)
            .map(move |(i, &f)| ((i % width) as u32, (i / width) as u32, f as u32))
    }

    /// Distinct visible faces, ascending.
    #[must_use]
    pub fn unique_faces(&self) -> Vec<u32> {
        let mut faces: Vec<u32> = self.face_pixel_counts().into_keys().collect();
        faces.sort_unstable();
        faces
    }

    /// Pixel count per visible face.
    #[must_use]
    pub fn face_pixel_counts(&self) -> HashMap<u32, usize> {
        let mut counts = HashMap::new();
        for (_, _, f) in self.covered() {
            *counts.entry(f).or_insert(0) += 1;
        }
        counts
    }

    /// Number of pixels that see a face.
    #[must_use]
    pub fn covered_count(&self) -> usize {
        self.faces.iter().filter(|&&f| f >= 0).count()
    }

    pub(crate) fn faces_mut(&mut self) -> &mut [i32] {
        &mut self.faces
    }
}
