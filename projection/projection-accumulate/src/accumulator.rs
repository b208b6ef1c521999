//! The accumulation strategy seam and normalized results.

use mesh_types::FaceIdMap;
use nalgebra::DMatrix;
use nalgebra_sparse::CsrMatrix;

use crate::error::{AccumulateError, AccumulateResult};
use crate::projector::ImageProjection;

/// A per-face accumulation strategy.
///
/// Implementations keep one running statistic per face over a fixed number
/// of classes (or channels) and a per-face observation count. A face is
/// counted at most once per image.
pub trait Accumulator: Send {
    /// Number of faces tracked.
    fn face_count(&self) -> usize;

    /// Number of classes (or channels) tracked per face.
    fn class_count(&self) -> usize;

    /// Add one per-image projection.
    ///
    /// # Errors
    ///
    /// Returns an error if the projection's faces or classes fall outside
    /// this accumulator, or its kind cannot be consumed.
    fn add(&mut self, projection: &ImageProjection) -> AccumulateResult<()>;

    /// Scatter-add a chunk-local accumulator through its face id map.
    ///
    /// Local face `i` of `other` lands on face `map[i]` of `self`.
    ///
    /// # Errors
    ///
    /// Returns [`AccumulateError::FaceMapMismatch`],
    /// [`AccumulateError::FaceOutOfRange`] or
    /// [`AccumulateError::ClassCountMismatch`].
    fn merge(&mut self, other: &Self, map: &FaceIdMap) -> AccumulateResult<()>
    where
        Self: Sized;

    /// Observation count per face.
    fn counts(&self) -> Vec<u32>;

    /// Per-face averages. Faces never observed are marked unobserved.
    fn normalized(&self) -> AverageMatrix;

    /// Add every projection of a sequence, stopping at the first error.
    ///
    /// Returns the number of projections added.
    ///
    /// # Errors
    ///
    /// Returns the first error of the sequence or of [`Accumulator::add`].
    fn add_all<I>(&mut self, projections: I) -> AccumulateResult<usize>
    where
        Self: Sized,
        I: IntoIterator<Item = AccumulateResult<ImageProjection>>,
    {
        let mut added = 0;
        for projection in projections {
            self.add(&projection?)?;
            added += 1;
        }
        Ok(added)
    }
}

/// Check that `map` can carry `local_faces` faces into `target_faces`.
pub(crate) fn check_face_map(map: &FaceIdMap, local_faces: usize, target_faces: usize) -> AccumulateResult<()> {
    if map.len() != local_faces {
        return Err(AccumulateError::FaceMapMismatch {
            map_len: map.len(),
            face_count: local_faces,
        });
    }
    if let Some(face) = map.iter().find(|&f| f as usize >= target_faces) {
        return Err(AccumulateError::FaceOutOfRange {
            face: face as usize,
            face_count: target_faces,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
enum Storage {
    Dense(DMatrix<f64>),
    Sparse(CsrMatrix<f64>),
}

/// Normalized per-face averages with their observation counts.
///
/// Dense storage holds NaN rows for unobserved faces. Sparse storage holds
/// empty rows for them; absent entries of observed rows are zero.
#[derive(Debug, Clone, PartialEq)]
pub struct AverageMatrix {
    storage: Storage,
    counts: Vec<u32>,
}

impl AverageMatrix {
    pub(crate) fn dense(matrix: DMatrix<f64>, counts: Vec<u32>) -> Self {
        Self {
            storage: Storage::Dense(matrix),
            counts,
        }
    }

    pub(crate) fn sparse(matrix: CsrMatrix<f64>, counts: Vec<u32>) -> Self {
        Self {
            storage: Storage::Sparse(matrix),
            counts,
        }
    }

    /// Number of faces.
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.counts.len()
    }

    /// Number of classes.
    #[must_use]
    pub fn class_count(&self) -> usize {
        match &self.storage {
            Storage::Dense(m) => m.ncols(),
            Storage::Sparse(m) => m.ncols(),
        }
    }

    /// Observation count per face.
    #[must_use]
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Returns `true` if `face` has at least one observation.
    #[must_use]
    pub fn is_observed(&self, face: usize) -> bool {
        self.counts.get(face).is_some_and(|&c| c > 0)
    }

    /// Average of `(face, class)`; NaN for unobserved or out-of-range faces.
    #[must_use]
    pub fn value(&self, face: usize, class: usize) -> f64 {
        if !self.is_observed(face) || class >= self.class_count() {
            return f64::NAN;
        }
        match &self.storage {
            Storage::Dense(m) => m[(face, class)],
            Storage::Sparse(m) => {
                let row = m.row(face);
                row.col_indices()
                    .binary_search(&class)
                    .map_or(0.0, |i| row.values()[i])
            }
        }
    }

    /// All class averages of `face`, or `None` if it was never observed.
    #[must_use]
    pub fn row(&self, face: usize) -> Option<Vec<f64>> {
        if !self.is_observed(face) {
            return None;
        }
        Some(match &self.storage {
            Storage::Dense(m) => m.row(face).iter().copied().collect(),
            Storage::Sparse(m) => {
                let mut dense = vec![0.0; m.ncols()];
                let row = m.row(face);
                for (&c, &v) in row.col_indices().iter().zip(row.values()) {
                    dense[c] = v;
                }
                dense
            }
        })
    }

    /// Stored `(class, value)` entries of an observed face.
    ///
    /// Dense storage yields every class; sparse storage only stored ones.
    #[must_use]
    pub fn entries(&self, face: usize) -> Vec<(usize, f64)> {
        if !self.is_observed(face) {
            return Vec::new();
        }
        match &self.storage {
            Storage::Dense(m) => m.row(face).iter().copied().enumerate().collect(),
            Storage::Sparse(m) => {
                let row = m.row(face);
                row.col_indices().iter().copied().zip(row.values().iter().copied()).collect()
            }
        }
    }

    /// Dense faces × classes matrix with NaN rows for unobserved faces.
    #[must_use]
    pub fn to_dense(&self) -> DMatrix<f64> {
        match &self.storage {
            Storage::Dense(m) => m.clone(),
            Storage::Sparse(m) => {
                let mut out = DMatrix::from_element(m.nrows(), m.ncols(), 0.0);
                for (face, &count) in self.counts.iter().enumerate() {
                    if count == 0 {
                        out.row_mut(face).fill(f64::NAN);
                    }
                }
                for (r, c, &v) in m.triplet_iter() {
                    out[(r, c)] = v;
                }
                out
            }
        }
    }

    /// The dense matrix, if stored densely.
    #[must_use]
    pub const fn as_dense(&self) -> Option<&DMatrix<f64>> {
        match &self.storage {
            Storage::Dense(m) => Some(m),
            Storage::Sparse(_) => None,
        }
    }

    /// The sparse matrix, if stored sparsely.
    #[must_use]
    pub const fn as_sparse(&self) -> Option<&CsrMatrix<f64>> {
        match &self.storage {
            Storage::Sparse(m) => Some(m),
            Storage::Dense(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_sparse::CooMatrix;

    #[test]
    fn test_face_map_checks() {
        let map = FaceIdMap::new(vec![0, 4]);
        assert!(check_face_map(&map, 2, 5).is_ok());
        assert!(matches!(
            check_face_map(&map, 3, 5),
            Err(AccumulateError::FaceMapMismatch { map_len: 2, face_count: 3 })
        ));
        assert!(matches!(
            check_face_map(&map, 2, 4),
            Err(AccumulateError::FaceOutOfRange { face: 4, face_count: 4 })
        ));
    }

    #[test]
    fn test_sparse_average_access() {
        let mut coo = CooMatrix::new(3, 4);
        coo.push(0, 2, 0.75);
        coo.push(0, 1, 0.25);
        let avg = AverageMatrix::sparse(CsrMatrix::from(&coo), vec![4, 0, 0]);

        assert!((avg.value(0, 2) - 0.75).abs() < 1e-12);
        assert!(avg.value(0, 3).abs() < 1e-12);
        assert!(avg.value(1, 0).is_nan());
        assert_eq!(avg.row(0), Some(vec![0.0, 0.25, 0.75, 0.0]));
        assert_eq!(avg.row(2), None);
        assert_eq!(avg.entries(0), vec![(1, 0.25), (2, 0.75)]);

        let dense = avg.to_dense();
        assert!(dense[(1, 0)].is_nan());
        assert!((dense[(0, 2)] - 0.75).abs() < 1e-12);
    }
}
