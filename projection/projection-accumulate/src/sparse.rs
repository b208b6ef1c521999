//! Sparse face × class accumulation in compressed sparse row form.
//!
//! Incoming `(face, class)` observations are staged as COO triplets and
//! compacted into CSR on [`SparseAccumulator::flush`]; converting COO to CSR
//! sums duplicate entries, which is exactly the count update. Read accessors
//! fold in any staged triplets without mutating the accumulator.

use std::borrow::Cow;

use mesh_types::FaceIdMap;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use projection_raster::ExecutionContext;
use tracing::debug;

use crate::accumulator::{Accumulator, AverageMatrix, check_face_map};
use crate::error::{AccumulateError, AccumulateResult};
use crate::projector::{ImageProjection, ProjectedValues};

/// Staged triplets that trigger an automatic compaction.
const FLUSH_THRESHOLD: usize = 1 << 20;

/// Per-face class counts for large or unbounded class spaces.
///
/// Faces never observed have empty rows and no stored count; they are
/// never divided.
///
/// # Example
///
/// ```
/// use projection_accumulate::{Accumulator, ImageProjection, ProjectedValues, SparseAccumulator, SparseProjection};
/// use projection_raster::ExecutionContext;
///
/// let mut acc = SparseAccumulator::new(3, 1000, &ExecutionContext::cpu()).unwrap();
/// for (camera, class) in [(0, 17), (1, 17), (2, 900)] {
///     let view = ImageProjection {
///         camera_index: camera,
///         values: ProjectedValues::Sparse(SparseProjection::from_pairs([(1, class)]).unwrap()),
///     };
///     acc.add(&view).unwrap();
/// }
///
/// assert_eq!(acc.counts(), vec![0, 3, 0]);
/// let avg = acc.normalized();
/// assert!((avg.value(1, 17) - 2.0 / 3.0).abs() < 1e-12);
/// assert_eq!(avg.row(0), None);
/// ```
#[derive(Debug, Clone)]
pub struct SparseAccumulator {
    face_count: usize,
    class_count: usize,
    summed: CsrMatrix<u32>,
    counts: CsrMatrix<u32>,
    staged_summed: CooMatrix<u32>,
    staged_counts: CooMatrix<u32>,
}

impl SparseAccumulator {
    /// Empty accumulator over `face_count` faces and `class_count` classes.
    ///
    /// # Errors
    ///
    /// Returns [`AccumulateError::InvalidParams`] for zero classes and the
    /// context's backend error if it cannot run.
    pub fn new(face_count: usize, class_count: usize, context: &ExecutionContext) -> AccumulateResult<Self> {
        context.ensure_available()?;
        if class_count == 0 {
            return Err(AccumulateError::invalid_params("sparse accumulator needs at least one class"));
        }
        Ok(Self::with_matrices(
            CsrMatrix::zeros(face_count, class_count),
            CsrMatrix::zeros(face_count, 1),
        ))
    }

    fn with_matrices(summed: CsrMatrix<u32>, counts: CsrMatrix<u32>) -> Self {
        let (face_count, class_count) = (summed.nrows(), summed.ncols());
        Self {
            face_count,
            class_count,
            staged_summed: CooMatrix::new(face_count, class_count),
            staged_counts: CooMatrix::new(face_count, 1),
            summed,
            counts,
        }
    }

    /// Rebuild from compacted matrices.
    ///
    /// # Errors
    ///
    /// Returns [`AccumulateError::CorruptSnapshot`] if the shapes disagree
    /// or a stored count is zero.
    pub(crate) fn from_matrices(summed: CsrMatrix<u32>, counts: CsrMatrix<u32>) -> AccumulateResult<Self> {
        if counts.nrows() != summed.nrows() || counts.ncols() != 1 {
            return Err(AccumulateError::corrupt(format!(
                "count vector is {}x{} for {} faces",
                counts.nrows(),
                counts.ncols(),
                summed.nrows()
            )));
        }
        if counts.values().contains(&0) {
            return Err(AccumulateError::corrupt("explicit zero observation count"));
        }
        Ok(Self::with_matrices(summed, counts))
    }

    /// Compact staged observations into the CSR matrices.
    pub fn flush(&mut self) {
        if self.staged_summed.nnz() == 0 && self.staged_counts.nnz() == 0 {
            return;
        }
        let staged = self.staged_counts.nnz();
        self.summed = combine(&self.summed, &self.staged_summed);
        self.counts = combine(&self.counts, &self.staged_counts);
        self.staged_summed = CooMatrix::new(self.face_count, self.class_count);
        self.staged_counts = CooMatrix::new(self.face_count, 1);
        debug!(staged, nnz = self.summed.nnz(), "compacted sparse accumulator");
    }

    /// Number of staged, not yet compacted, observations.
    #[must_use]
    pub fn staged_len(&self) -> usize {
        self.staged_counts.nnz()
    }

    /// Face × class count matrix including staged observations.
    #[must_use]
    pub fn summed_csr(&self) -> Cow<'_, CsrMatrix<u32>> {
        current(&self.summed, &self.staged_summed)
    }

    /// Face × 1 observation-count matrix including staged observations.
    #[must_use]
    pub fn count_csr(&self) -> Cow<'_, CsrMatrix<u32>> {
        current(&self.counts, &self.staged_counts)
    }

    fn maybe_flush(&mut self) {
        if self.staged_summed.nnz() >= FLUSH_THRESHOLD {
            self.flush();
        }
    }
}

fn combine(base: &CsrMatrix<u32>, staged: &CooMatrix<u32>) -> CsrMatrix<u32> {
    let mut all = CooMatrix::new(base.nrows(), base.ncols());
    for (r, c, &v) in base.triplet_iter().chain(staged.triplet_iter()) {
        all.push(r, c, v);
    }
    CsrMatrix::from(&all)
}

fn current<'a>(base: &'a CsrMatrix<u32>, staged: &CooMatrix<u32>) -> Cow<'a, CsrMatrix<u32>> {
    if staged.nnz() == 0 {
        Cow::Borrowed(base)
    } else {
        Cow::Owned(combine(base, staged))
    }
}

impl Accumulator for SparseAccumulator {
    fn face_count(&self) -> usize {
        self.face_count
    }

    fn class_count(&self) -> usize {
        self.class_count
    }

    fn add(&mut self, projection: &ImageProjection) -> AccumulateResult<()> {
        let sparse = match &projection.values {
            ProjectedValues::Sparse(s) => s,
            ProjectedValues::Dense(d) if d.faces().is_empty() => return Ok(()),
            ProjectedValues::Dense(_) => {
                return Err(AccumulateError::incompatible(
                    "sparse accumulator needs majority-class projections",
                ));
            }
        };

        for (face, class) in sparse.iter() {
            if face as usize >= self.face_count {
                return Err(AccumulateError::FaceOutOfRange {
                    face: face as usize,
                    face_count: self.face_count,
                });
            }
            if class as usize >= self.class_count {
                return Err(AccumulateError::ClassOutOfRange {
                    class,
                    class_count: self.class_count,
                });
            }
        }
        for (face, class) in sparse.iter() {
            self.staged_summed.push(face as usize, class as usize, 1);
            self.staged_counts.push(face as usize, 0, 1);
        }
        self.maybe_flush();
        Ok(())
    }

    fn merge(&mut self, other: &Self, map: &FaceIdMap) -> AccumulateResult<()> {
        if other.class_count != self.class_count {
            return Err(AccumulateError::ClassCountMismatch {
                expected: self.class_count,
                found: other.class_count,
            });
        }
        check_face_map(map, other.face_count, self.face_count)?;

        let parents = map.as_slice();
        for (r, c, &v) in other.summed_csr().triplet_iter() {
            self.staged_summed.push(parents[r] as usize, c, v);
        }
        for (r, _, &v) in other.count_csr().triplet_iter() {
            self.staged_counts.push(parents[r] as usize, 0, v);
        }
        self.maybe_flush();
        debug!(faces = map.len(), "merged sparse accumulator");
        Ok(())
    }

    fn counts(&self) -> Vec<u32> {
        let mut out = vec![0; self.face_count];
        for (r, _, &v) in self.count_csr().triplet_iter() {
            out[r] += v;
        }
        out
    }

    fn normalized(&self) -> AverageMatrix {
        let counts = self.count_csr();
        let summed = self.summed_csr();

        // diag(1 / count) over stored counts only.
        let mut reciprocal = CooMatrix::new(self.face_count, self.face_count);
        for (r, _, &n) in counts.triplet_iter() {
            if n > 0 {
                reciprocal.push(r, r, 1.0 / f64::from(n));
            }
        }
        let mut values = CooMatrix::new(self.face_count, self.class_count);
        for (r, c, &v) in summed.triplet_iter() {
            values.push(r, c, f64::from(v));
        }
        let averages = &CsrMatrix::from(&reciprocal) * &CsrMatrix::from(&values);
        AverageMatrix::sparse(averages, self.counts())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ProjectorParams, Reduction};
    use crate::projector::{DenseProjection, SparseProjection, project_image};
    use approx::assert_relative_eq;
    use ml_types::LabelImage;
    use projection_raster::PixToFace;

    fn view(camera: usize, pairs: &[(u32, u32)]) -> ImageProjection {
        ImageProjection {
            camera_index: camera,
            values: ProjectedValues::Sparse(SparseProjection::from_pairs(pairs.iter().copied()).unwrap()),
        }
    }

    fn acc(faces: usize, classes: usize) -> SparseAccumulator {
        SparseAccumulator::new(faces, classes, &ExecutionContext::cpu()).unwrap()
    }

    #[test]
    fn test_counts_and_flush() {
        let mut a = acc(3, 4);
        a.add(&view(0, &[(0, 1), (2, 3)])).unwrap();
        a.add(&view(1, &[(0, 1)])).unwrap();
        assert_eq!(a.staged_len(), 3);
        let before = a.normalized();

        a.flush();
        assert_eq!(a.staged_len(), 0);
        assert_eq!(a.counts(), vec![2, 0, 1]);
        assert_eq!(a.summed_csr().nnz(), 2);
        assert_eq!(a.normalized(), before);
    }

    #[test]
    fn test_unobserved_rows_empty() {
        let mut a = acc(3, 2);
        a.add(&view(0, &[(1, 0)])).unwrap();
        let avg = a.normalized();
        let csr = avg.as_sparse().unwrap();
        assert_eq!(csr.row(0).nnz(), 0);
        assert_eq!(csr.row(2).nnz(), 0);
        assert_relative_eq!(avg.value(1, 0), 1.0);
        assert!(!avg.is_observed(0));
    }

    #[test]
    fn test_rejects_dense_projection() {
        let mut a = acc(1, 2);
        let dense = ImageProjection {
            camera_index: 0,
            values: ProjectedValues::Dense(DenseProjection::new(2, vec![0], vec![0.5, 0.5]).unwrap()),
        };
        assert!(matches!(a.add(&dense), Err(AccumulateError::IncompatibleProjection(_))));

        let empty = ImageProjection::empty(0, crate::Reduction::Dense, 2);
        assert!(a.add(&empty).is_ok());
    }

    #[test]
    fn test_validation_before_mutation() {
        let mut a = acc(2, 2);
        assert!(a.add(&view(0, &[(0, 0), (1, 5)])).is_err());
        assert_eq!(a.counts(), vec![0, 0]);
    }

    #[test]
    fn test_merge_overlapping_maps() {
        let mut global = acc(4, 3);
        let mut left = acc(2, 3);
        left.add(&view(0, &[(0, 2), (1, 1)])).unwrap();
        let mut right = acc(2, 3);
        right.add(&view(1, &[(0, 2), (1, 0)])).unwrap();

        global.merge(&left, &FaceIdMap::new(vec![0, 1])).unwrap();
        global.merge(&right, &FaceIdMap::new(vec![1, 3])).unwrap();

        assert_eq!(global.counts(), vec![1, 2, 0, 1]);
        let avg = global.normalized();
        assert_relative_eq!(avg.value(1, 1), 0.5);
        assert_relative_eq!(avg.value(1, 2), 0.5);
        assert_relative_eq!(avg.value(3, 0), 1.0);
    }

    #[test]
    fn test_one_count_per_face_per_image() {
        assert!(matches!(
            SparseProjection::from_pairs([(0, 1), (0, 1)]),
            Err(AccumulateError::DuplicateFace { face: 0 })
        ));

        // Face 0 covers the whole image; its majority class counts once.
        let pix = PixToFace::from_data(3, 2, vec![0; 6]).unwrap();
        let labels = LabelImage::from_data(3, 2, vec![0, 1, 1, 0, 1, 1]).unwrap();
        let params = ProjectorParams::for_classes(2).reduction(Reduction::Sparse);
        let mut a = acc(1, 2);
        a.add(&project_image(0, &pix, &labels.into(), (3, 2), &params).unwrap()).unwrap();
        assert_eq!(a.counts(), vec![1]);
        assert_relative_eq!(a.normalized().value(0, 1), 1.0);
    }
}
