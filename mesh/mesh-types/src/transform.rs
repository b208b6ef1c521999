//! Local-to-global mesh transform.
//!
//! Mesh loaders may deliver vertices in a local frame together with a 4x4
//! homogeneous matrix that maps them into the global (georeferenced) frame.
//! When no matrix is supplied the mesh is assumed to already be global.

use nalgebra::{Matrix4, Point3};
use tracing::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{MeshError, MeshResult};

/// A 4x4 homogeneous transform from mesh-local to global coordinates.
///
/// # Example
///
/// ```
/// use mesh_types::{LocalToGlobal, Point3};
///
/// let rows = vec![
///     vec![1.0, 0.0, 0.0, 10.0],
///     vec![0.0, 1.0, 0.0, 0.0],
///     vec![0.0, 0.0, 1.0, 0.0],
///     vec![0.0, 0.0, 0.0, 1.0],
/// ];
/// let t = LocalToGlobal::resolve(Some(rows.as_slice())).unwrap();
/// let p = t.apply(&Point3::new(1.0, 2.0, 3.0));
/// assert!((p.x - 11.0).abs() < 1e-12);
///
/// // Missing transforms fall back to identity.
/// assert!(LocalToGlobal::resolve::<Vec<f64>>(None).unwrap().is_identity());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocalToGlobal {
    matrix: Matrix4<f64>,
}

impl LocalToGlobal {
    /// The identity transform.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Wrap an existing matrix.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::NonFiniteTransform`] if any entry is NaN or infinite.
    pub fn from_matrix(matrix: Matrix4<f64>) -> MeshResult<Self> {
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(MeshError::NonFiniteTransform);
        }
        Ok(Self { matrix })
    }

    /// Resolve the optional row-major transform delivered by a mesh loader.
    ///
    /// `None` yields identity and emits a warning.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::MalformedTransform`] if the rows do not form a
    /// 4x4 matrix, or [`MeshError::NonFiniteTransform`] for NaN entries.
    pub fn resolve<R: AsRef<[f64]>>(rows: Option<&[R]>) -> MeshResult<Self> {
        let Some(rows) = rows else {
            warn!("no local-to-global transform supplied, assuming identity");
            return Ok(Self::identity());
        };

        if rows.len() != 4 {
            let cols = rows.first().map_or(0, |r| r.as_ref().len());
            return Err(MeshError::malformed_transform(rows.len(), cols));
        }
        if let Some(bad) = rows.iter().find(|r| r.as_ref().len() != 4) {
            return Err(MeshError::malformed_transform(4, bad.as_ref().len()));
        }

        let matrix = Matrix4::from_fn(|r, c| rows[r].as_ref()[c]);
        Self::from_matrix(matrix)
    }

    /// The underlying matrix.
    #[must_use]
    pub const fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    /// Returns `true` for the identity transform.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.matrix == Matrix4::identity()
    }

    /// Map a local point to the global frame.
    #[must_use]
    pub fn apply(&self, point: &Point3<f64>) -> Point3<f64> {
        self.matrix.transform_point(point)
    }
}

impl Default for LocalToGlobal {
    fn default() -> Self {
        Self::identity()
    }
}
