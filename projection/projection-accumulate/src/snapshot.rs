//! Persisted accumulator state.
//!
//! Both accumulators serialize to named blobs:
//!
//! | Blob | Dense | Sparse |
//! |------|-------|--------|
//! | `summed_projections` | row-major `f64` sums | CSR `u32` face × class counts |
//! | `projection_counts` | `u32` per face | CSR `u32` face × 1 counts |
//! | `face_class_array` | first-index consensus per face | absent |
//!
//! Reloading reproduces bit-identical normalization.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra_sparse::CsrMatrix;
use projection_raster::ExecutionContext;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::accumulator::Accumulator;
use crate::consensus::{TieBreak, consensus};
use crate::dense::DenseAccumulator;
use crate::error::{AccumulateError, AccumulateResult};
use crate::sparse::SparseAccumulator;

/// A CSR matrix as raw arrays with its exact shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrBlob {
    /// Row count.
    pub nrows: usize,
    /// Column count.
    pub ncols: usize,
    /// Row offsets, `nrows + 1` entries.
    pub row_offsets: Vec<usize>,
    /// Column index per stored entry.
    pub col_indices: Vec<usize>,
    /// Value per stored entry.
    pub values: Vec<u32>,
}

impl CsrBlob {
    /// Capture a CSR matrix.
    #[must_use]
    pub fn from_csr(matrix: &CsrMatrix<u32>) -> Self {
        Self {
            nrows: matrix.nrows(),
            ncols: matrix.ncols(),
            row_offsets: matrix.row_offsets().to_vec(),
            col_indices: matrix.col_indices().to_vec(),
            values: matrix.values().to_vec(),
        }
    }

    /// Rebuild the CSR matrix.
    ///
    /// # Errors
    ///
    /// Returns [`AccumulateError::CorruptSnapshot`] for an invalid CSR layout.
    pub fn to_csr(&self) -> AccumulateResult<CsrMatrix<u32>> {
        CsrMatrix::try_from_csr_data(
            self.nrows,
            self.ncols,
            self.row_offsets.clone(),
            self.col_indices.clone(),
            self.values.clone(),
        )
        .map_err(|e| AccumulateError::corrupt(e.to_string()))
    }
}

/// Persisted [`DenseAccumulator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseSnapshot {
    /// Face count.
    pub face_count: usize,
    /// Channel count.
    pub class_count: usize,
    /// Row-major running sums.
    pub summed_projections: Vec<f64>,
    /// Observation count per face.
    pub projection_counts: Vec<u32>,
    /// First-index consensus class per face.
    pub face_class_array: Vec<Option<usize>>,
}

/// Persisted [`SparseAccumulator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseSnapshot {
    /// Face × class counts.
    pub summed_projections: CsrBlob,
    /// Face × 1 observation counts.
    pub projection_counts: CsrBlob,
}

impl DenseAccumulator {
    /// Capture the accumulator state.
    #[must_use]
    pub fn to_snapshot(&self) -> DenseSnapshot {
        let classes = consensus(&self.normalized(), TieBreak::FirstIndex, &ExecutionContext::cpu());
        DenseSnapshot {
            face_count: self.face_count(),
            class_count: self.class_count(),
            summed_projections: self.summed().to_vec(),
            projection_counts: self.counts(),
            face_class_array: classes,
        }
    }

    /// Restore an accumulator.
    ///
    /// # Errors
    ///
    /// Returns [`AccumulateError::CorruptSnapshot`] if the blob sizes
    /// disagree with the stored shape.
    pub fn from_snapshot(snapshot: DenseSnapshot) -> AccumulateResult<Self> {
        if snapshot.face_class_array.len() != snapshot.face_count {
            return Err(AccumulateError::corrupt(format!(
                "face_class_array has {} entries for {} faces",
                snapshot.face_class_array.len(),
                snapshot.face_count
            )));
        }
        if snapshot.class_count == 0 {
            return Err(AccumulateError::corrupt("zero channels"));
        }
        Self::from_raw(
            snapshot.face_count,
            snapshot.class_count,
            snapshot.summed_projections,
            snapshot.projection_counts,
        )
    }
}

impl SparseAccumulator {
    /// Capture the accumulator state, including staged observations.
    #[must_use]
    pub fn to_snapshot(&self) -> SparseSnapshot {
        SparseSnapshot {
            summed_projections: CsrBlob::from_csr(&self.summed_csr()),
            projection_counts: CsrBlob::from_csr(&self.count_csr()),
        }
    }

    /// Restore an accumulator.
    ///
    /// # Errors
    ///
    /// Returns [`AccumulateError::CorruptSnapshot`] for invalid CSR data or
    /// mismatched shapes.
    pub fn from_snapshot(snapshot: &SparseSnapshot) -> AccumulateResult<Self> {
        let summed = snapshot.summed_projections.to_csr()?;
        let counts = snapshot.projection_counts.to_csr()?;
        if summed.ncols() == 0 {
            return Err(AccumulateError::corrupt("zero classes"));
        }
        Self::from_matrices(summed, counts)
    }
}

/// Write a snapshot as JSON.
///
/// # Errors
///
/// Returns [`AccumulateError::Io`] if the file cannot be written.
pub fn save_snapshot<T: Serialize>(path: impl AsRef<Path>, snapshot: &T) -> AccumulateResult<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, snapshot).map_err(std::io::Error::from)?;
    writer.flush()?;
    info!(path = %path.display(), "saved accumulator snapshot");
    Ok(())
}

/// Read a JSON snapshot.
///
/// # Errors
///
/// Returns [`AccumulateError::Io`] if the file cannot be read and
/// [`AccumulateError::CorruptSnapshot`] if it does not parse.
pub fn load_snapshot<T: DeserializeOwned>(path: impl AsRef<Path>) -> AccumulateResult<T> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let snapshot = serde_json::from_reader(reader).map_err(|e| {
        if e.is_io() {
            AccumulateError::Io(e.into())
        } else {
            AccumulateError::corrupt(e.to_string())
        }
    })?;
    info!(path = %path.display(), "loaded accumulator snapshot");
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projector::{DenseProjection, ImageProjection, ProjectedValues, SparseProjection};

    fn dense_acc() -> DenseAccumulator {
        let mut acc = DenseAccumulator::new(3, 2, &ExecutionContext::cpu()).unwrap();
        for camera in 0..3 {
            acc.add(&ImageProjection {
                camera_index: camera,
                values: ProjectedValues::Dense(
                    DenseProjection::new(2, vec![0, 2], vec![0.1, 0.7, 1.0 / 3.0, 2.0 / 3.0]).unwrap(),
                ),
            })
            .unwrap();
        }
        acc
    }

    fn sparse_acc() -> SparseAccumulator {
        let mut acc = SparseAccumulator::new(4, 50, &ExecutionContext::cpu()).unwrap();
        for (camera, pairs) in [vec![(0, 3), (1, 49)], vec![(0, 3)], vec![(0, 7), (3, 1)]].into_iter().enumerate() {
            acc.add(&ImageProjection {
                camera_index: camera,
                values: ProjectedValues::Sparse(SparseProjection::from_pairs(pairs).unwrap()),
            })
            .unwrap();
        }
        acc
    }

    #[test]
    fn test_dense_file_round_trip_bit_identical() {
        let acc = dense_acc();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dense.json");
        save_snapshot(&path, &acc.to_snapshot()).unwrap();

        let loaded: DenseSnapshot = load_snapshot(&path).unwrap();
        assert_eq!(loaded.face_class_array, vec![Some(1), None, Some(1)]);
        let restored = DenseAccumulator::from_snapshot(loaded).unwrap();

        let a = acc.normalized().to_dense();
        let b = restored.normalized().to_dense();
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn test_sparse_file_round_trip_bit_identical() {
        let acc = sparse_acc();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sparse.json");
        save_snapshot(&path, &acc.to_snapshot()).unwrap();

        let restored = SparseAccumulator::from_snapshot(&load_snapshot(&path).unwrap()).unwrap();
        assert_eq!(restored.counts(), acc.counts());

        let a = acc.normalized();
        let b = restored.normalized();
        let (a, b) = (a.as_sparse().unwrap(), b.as_sparse().unwrap());
        assert_eq!(a.col_indices(), b.col_indices());
        for (x, y) in a.values().iter().zip(b.values()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn test_corrupt_snapshots() {
        let mut snap = dense_acc().to_snapshot();
        snap.summed_projections.pop();
        assert!(matches!(
            DenseAccumulator::from_snapshot(snap),
            Err(AccumulateError::CorruptSnapshot(_))
        ));

        let mut snap = sparse_acc().to_snapshot();
        snap.projection_counts.row_offsets.pop();
        assert!(matches!(
            SparseAccumulator::from_snapshot(&snap),
            Err(AccumulateError::CorruptSnapshot(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_snapshot::<SparseSnapshot>(&path),
            Err(AccumulateError::CorruptSnapshot(_))
        ));
        assert!(matches!(
            load_snapshot::<SparseSnapshot>(dir.path().join("missing.json")),
            Err(AccumulateError::Io(_))
        ));
    }
}
