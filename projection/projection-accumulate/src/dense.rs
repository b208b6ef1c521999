//! Dense per-face accumulation for a small fixed channel count.

use mesh_types::FaceIdMap;
use nalgebra::DMatrix;
use projection_raster::ExecutionContext;
use tracing::debug;

use crate::accumulator::{Accumulator, AverageMatrix, check_face_map};
use crate::error::{AccumulateError, AccumulateResult};
use crate::projector::{ImageProjection, ProjectedValues};

/// Running per-face sums and observation counts, stored densely.
///
/// Suited to a few channels (RGB, or tens of classes). Sparse projections
/// are accepted and one-hot encoded.
///
/// # Example
///
/// ```
/// use projection_accumulate::{Accumulator, DenseAccumulator, ImageProjection, SparseProjection, ProjectedValues};
/// use projection_raster::ExecutionContext;
///
/// let mut acc = DenseAccumulator::new(2, 3, &ExecutionContext::cpu()).unwrap();
/// let view = ImageProjection {
///     camera_index: 0,
///     values: ProjectedValues::Sparse(SparseProjection::from_pairs([(0, 2)]).unwrap()),
/// };
/// acc.add(&view).unwrap();
///
/// assert_eq!(acc.counts(), vec![1, 0]);
/// let avg = acc.normalized();
/// assert!((avg.value(0, 2) - 1.0).abs() < 1e-12);
/// assert!(avg.value(1, 0).is_nan());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DenseAccumulator {
    face_count: usize,
    class_count: usize,
    // Row-major faces x classes.
    summed: Vec<f64>,
    counts: Vec<u32>,
}

impl DenseAccumulator {
    /// Zeroed accumulator over `face_count` faces and `class_count` channels.
    ///
    /// # Errors
    ///
    /// Returns [`AccumulateError::InvalidParams`] for zero channels and the
    /// context's backend error if it cannot run.
    pub fn new(face_count: usize, class_count: usize, context: &ExecutionContext) -> AccumulateResult<Self> {
        context.ensure_available()?;
        if class_count == 0 {
            return Err(AccumulateError::invalid_params("dense accumulator needs at least one channel"));
        }
        Ok(Self::zeroed(face_count, class_count))
    }

    pub(crate) fn zeroed(face_count: usize, class_count: usize) -> Self {
        Self {
            face_count,
            class_count,
            summed: vec![0.0; face_count * class_count],
            counts: vec![0; face_count],
        }
    }

    pub(crate) fn from_raw(
        face_count: usize,
        class_count: usize,
        summed: Vec<f64>,
        counts: Vec<u32>,
    ) -> AccumulateResult<Self> {
        if summed.len() != face_count * class_count || counts.len() != face_count {
            return Err(AccumulateError::corrupt(format!(
                "dense buffers hold {} sums and {} counts for {face_count}x{class_count}",
                summed.len(),
                counts.len()
            )));
        }
        Ok(Self {
            face_count,
            class_count,
            summed,
            counts,
        })
    }

    /// Raw running sums, row-major faces × classes.
    #[must_use]
    pub fn summed(&self) -> &[f64] {
        &self.summed
    }

    /// Running sums of one face.
    #[must_use]
    pub fn face_sums(&self, face: usize) -> Option<&[f64]> {
        let start = face.checked_mul(self.class_count)?;
        self.summed.get(start..start + self.class_count)
    }

    fn check_face(&self, face: u32) -> AccumulateResult<()> {
        if face as usize >= self.face_count {
            return Err(AccumulateError::FaceOutOfRange {
                face: face as usize,
                face_count: self.face_count,
            });
        }
        Ok(())
    }
}

impl Accumulator for DenseAccumulator {
    fn face_count(&self) -> usize {
        self.face_count
    }

    fn class_count(&self) -> usize {
        self.class_count
    }

    fn add(&mut self, projection: &ImageProjection) -> AccumulateResult<()> {
        match &projection.values {
            ProjectedValues::Dense(dense) => {
                if dense.faces().is_empty() {
                    return Ok(());
                }
                if dense.channels() != self.class_count {
                    return Err(AccumulateError::ClassCountMismatch {
                        expected: self.class_count,
                        found: dense.channels(),
                    });
                }
                for &face in dense.faces() {
                    self.check_face(face)?;
                }
                for (face, values) in dense.iter() {
                    let face = face as usize;
                    self.counts[face] += 1;
                    let row = &mut self.summed[face * self.class_count..(face + 1) * self.class_count];
                    for (sum, &v) in row.iter_mut().zip(values) {
                        if !v.is_nan() {
                            *sum += v;
                        }
                    }
                }
            }
            ProjectedValues::Sparse(sparse) => {
                for (face, class) in sparse.iter() {
                    self.check_face(face)?;
                    if class as usize >= self.class_count {
                        return Err(AccumulateError::ClassOutOfRange {
                            class,
                            class_count: self.class_count,
                        });
                    }
                }
                for (face, class) in sparse.iter() {
                    let face = face as usize;
                    self.counts[face] += 1;
                    self.summed[face * self.class_count + class as usize] += 1.0;
                }
            }
        }
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

        let c = self.class_count;
        for (local, parent) in map.iter().enumerate() {
            let parent = parent as usize;
            self.counts[parent] += other.counts[local];
            let src = &other.summed[local * c..(local + 1) * c];
            let dst = &mut self.summed[parent * c..(parent + 1) * c];
            for (d, &s) in dst.iter_mut().zip(src) {
                *d += s;
            }
        }
        debug!(faces = map.len(), "merged dense accumulator");
        Ok(())
    }

    fn counts(&self) -> Vec<u32> {
        self.counts.clone()
    }

    fn normalized(&self) -> AverageMatrix {
        let c = self.class_count;
        let mut averages = DMatrix::from_element(self.face_count, c, f64::NAN);
        for (face, &count) in self.counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let n = f64::from(count);
            for (k, &s) in self.summed[face * c..(face + 1) * c].iter().enumerate() {
                averages[(face, k)] = s / n;
            }
        }
        AverageMatrix::dense(averages, self.counts.clone())
    }
}
