//! Indexed triangle mesh.

use hashbrown::HashMap;
use nalgebra::Point3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{MeshError, MeshResult};
use crate::{Aabb, FaceIdMap, LocalToGlobal, SubMesh, Vertex};

/// An indexed triangle mesh.
///
/// Stores vertices and faces separately, with faces referencing vertices by
/// index. Face indices are the identity of a face for the whole aggregation
/// pipeline: projections, accumulators and exported labels are all indexed
/// by position in `faces`.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex};
///
/// let mut mesh = IndexedMesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
/// mesh.faces.push([0, 1, 2]);
///
/// assert_eq!(mesh.vertex_count(), 3);
/// assert_eq!(mesh.face_count(), 1);
/// assert!(mesh.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexedMesh {
    /// Vertex data.
    pub vertices: Vec<Vertex>,

    /// Triangle faces as indices into the vertex array.
    pub faces: Vec<[u32; 3]>,
}

impl IndexedMesh {
    /// Create a new empty mesh.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
        }
    }

    /// Create a mesh with pre-allocated capacity.
    #[inline]
    #[must_use]
    pub fn with_capacity(vertex_count: usize, face_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            faces: Vec::with_capacity(face_count),
        }
    }

    /// Create a mesh from vertices and faces without validation.
    #[inline]
    #[must_use]
    pub const fn from_parts(vertices: Vec<Vertex>, faces: Vec<[u32; 3]>) -> Self {
        Self { vertices, faces }
    }

    /// Create a mesh from loader output, checking every face index.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidFaceIndex`] if a face references a
    /// vertex that does not exist.
    pub fn try_from_parts(vertices: Vec<Vertex>, faces: Vec<[u32; 3]>) -> MeshResult<Self> {
        let mesh = Self::from_parts(vertices, faces);
        mesh.validate()?;
        Ok(mesh)
    }

    /// Create a mesh from flat `[x, y, z, ...]` positions and `[i0, i1, i2, ...]` indices.
    ///
    /// Trailing values that do not complete a vertex or face are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidFaceIndex`] if an index is out of range.
    pub fn from_raw(positions: &[f64], indices: &[u32]) -> MeshResult<Self> {
        let vertices = positions
            .chunks_exact(3)
            .map(|p| Vertex::from_coords(p[0], p[1], p[2]))
            .collect();
        let faces = indices.chunks_exact(3).map(|f| [f[0], f[1], f[2]]).collect();
        Self::try_from_parts(vertices, faces)
    }

    /// Check that every face references valid vertices.
    ///
    /// # Errors
    ///
    /// Returns the first [`MeshError::InvalidFaceIndex`] found.
    pub fn validate(&self) -> MeshResult<()> {
        let vertex_count = self.vertices.len();
        for (face, indices) in self.faces.iter().enumerate() {
            if let Some(&vertex) = indices.iter().find(|&&v| v as usize >= vertex_count) {
                return Err(MeshError::InvalidFaceIndex {
                    face,
                    vertex,
                    vertex_count,
                });
            }
        }
        Ok(())
    }

    /// Number of vertices.
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of faces.
    #[inline]
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Returns `true` if the mesh has no faces.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Corner positions of a face, or `None` if the face or a vertex is missing.
    #[must_use]
    pub fn face_positions(&self, face: usize) -> Option<[Point3<f64>; 3]> {
        let [a, b, c] = *self.faces.get(face)?;
        Some([
            self.vertices.get(a as usize)?.position,
            self.vertices.get(b as usize)?.position,
            self.vertices.get(c as usize)?.position,
        ])
    }

    /// Centroid of a face.
    #[must_use]
    pub fn face_centroid(&self, face: usize) -> Option<Point3<f64>> {
        let [a, b, c] = self.face_positions(face)?;
        Some(Point3::from((a.coords + b.coords + c.coords) / 3.0))
    }

    /// Centroids of all faces, in face order.
    ///
    /// Faces with dangling indices get a NaN centroid.
    #[must_use]
    pub fn face_centroids(&self) -> Vec<Point3<f64>> {
        (0..self.faces.len())
            .map(|f| {
                self.face_centroid(f)
                    .unwrap_or_else(|| Point3::new(f64::NAN, f64::NAN, f64::NAN))
            })
            .collect()
    }

    /// Bounding box of all vertices.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.vertices.iter().map(|v| &v.position))
    }

    /// Copy of this mesh with every vertex mapped through `transform`.
    #[must_use]
    pub fn transformed(&self, transform: &LocalToGlobal) -> Self {
        if transform.is_identity() {
            return self.clone();
        }
        Self {
            vertices: self
                .vertices
                .iter()
                .map(|v| Vertex::new(transform.apply(&v.position)))
                .collect(),
            faces: self.faces.clone(),
        }
    }

    /// Extract the listed faces into a new, compact mesh.
    ///
    /// Only vertices referenced by the selected faces are kept and faces are
    /// re-indexed. The returned [`SubMesh`] carries a [`FaceIdMap`] whose
    /// i-th entry is the parent index of the i-th sub-mesh face.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::FaceOutOfRange`] if a face id does not exist, or
    /// [`MeshError::InvalidFaceIndex`] if a selected face is dangling.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_types::planar_grid;
    ///
    /// let mesh = planar_grid(2, 1, 1.0);
    /// let sub = mesh.extract_faces(&[3]).unwrap();
    /// assert_eq!(sub.mesh().face_count(), 1);
    /// assert_eq!(sub.mesh().vertex_count(), 3);
    /// assert_eq!(sub.parent_face_ids().as_slice(), &[3]);
    /// ```
    pub fn extract_faces(&self, face_ids: &[u32]) -> MeshResult<SubMesh> {
        let mut remap: HashMap<u32, u32> = HashMap::with_capacity(face_ids.len() * 2);
        let mut sub = Self::with_capacity(face_ids.len() * 2, face_ids.len());

        for &face_id in face_ids {
            let face = self
                .faces
                .get(face_id as usize)
                .ok_or(MeshError::FaceOutOfRange {
                    face: face_id,
                    face_count: self.faces.len(),
                })?;

            let mut local = [0u32; 3];
            for (slot, &vertex) in local.iter_mut().zip(face) {
                let position = self
                    .vertices
                    .get(vertex as usize)
                    .ok_or(MeshError::InvalidFaceIndex {
                        face: face_id as usize,
                        vertex,
                        vertex_count: self.vertices.len(),
                    })?
                    .position;
                *slot = *remap.entry(vertex).or_insert_with(|| {
                    sub.vertices.push(Vertex::new(position));
                    index_u32(sub.vertices.len() - 1)
                });
            }
            sub.faces.push(local);
        }

        Ok(SubMesh::new(sub, FaceIdMap::new(face_ids.to_vec())))
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn index_u32(index: usize) -> u32 {
    index as u32
}

/// Build a flat grid mesh on the z = 0 plane.
///
/// The grid spans `cols * spacing` by `rows * spacing` starting at the
/// origin, with two triangles per cell (`2 * cols * rows` faces). Faces of
/// cell `(c, r)` are `2 * (r * cols + c)` and the one after it.
///
/// # Example
///
/// ```
/// use mesh_types::planar_grid;
///
/// let grid = planar_grid(3, 2, 10.0);
/// assert_eq!(grid.face_count(), 12);
/// assert_eq!(grid.vertex_count(), 12);
/// ```
#[must_use]
pub fn planar_grid(cols: u32, rows: u32, spacing: f64) -> IndexedMesh {
    let stride = cols + 1;
    let mut mesh = IndexedMesh::with_capacity(
        (stride * (rows + 1)) as usize,
        (2 * cols * rows) as usize,
    );

    for r in 0..=rows {
        for c in 0..=cols {
            mesh.vertices.push(Vertex::from_coords(
                f64::from(c) * spacing,
                f64::from(r) * spacing,
                0.0,
            ));
        }
    }

    for r in 0..rows {
        for c in 0..cols {
            let v00 = r * stride + c;
            let v10 = v00 + 1;
            let v01 = v00 + stride;
            let v11 = v01 + 1;
            mesh.faces.push([v00, v10, v11]);
            mesh.faces.push([v00, v11, v01]);
        }
    }

    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Matrix4;

    fn triangle() -> IndexedMesh {
        IndexedMesh::from_parts(
            vec![
                Vertex::from_coords(0.0, 0.0, 0.0),
                Vertex::from_coords(3.0, 0.0, 0.0),
                Vertex::from_coords(0.0, 3.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
    }

    #[test]
    fn test_validate_rejects_dangling_index() {
        let err = IndexedMesh::try_from_parts(
            vec![Vertex::from_coords(0.0, 0.0, 0.0)],
            vec![[0, 0, 5]],
        )
        .unwrap_err();
        assert_eq!(
            err,
            MeshError::InvalidFaceIndex {
                face: 0,
                vertex: 5,
                vertex_count: 1
            }
        );
    }

    #[test]
    fn test_from_raw() {
        let mesh = IndexedMesh::from_raw(
            &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            &[0, 1, 2],
        )
        .unwrap();
        assert_eq!(mesh.face_count(), 1);
        assert!(IndexedMesh::from_raw(&[0.0; 3], &[0, 1, 2]).is_err());
    }

    #[test]
    fn test_face_centroid() {
        let c = triangle().face_centroid(0).unwrap();
        assert!((c.x - 1.0).abs() < 1e-12);
        assert!((c.y - 1.0).abs() < 1e-12);
        assert!(triangle().face_centroid(1).is_none());
    }

    #[test]
    fn test_transformed() {
        let t = LocalToGlobal::from_matrix(Matrix4::new_translation(
            &nalgebra::Vector3::new(0.0, 0.0, 5.0),
        ))
        .unwrap();
        let moved = triangle().transformed(&t);
        assert!((moved.vertices[1].position.z - 5.0).abs() < 1e-12);
        assert_eq!(moved.faces, triangle().faces);
    }

    #[test]
    fn test_extract_faces_reindexes() {
        let grid = planar_grid(2, 2, 1.0);
        let sub = grid.extract_faces(&[0, 1, 7]).unwrap();
        assert_eq!(sub.mesh().face_count(), 3);
        // Faces 0 and 1 share a quad (4 vertices); face 7 adds two more.
        assert_eq!(sub.mesh().vertex_count(), 6);
        assert!(sub.mesh().validate().is_ok());

        for (local, parent) in sub.parent_face_ids().iter().enumerate() {
            let a = sub.mesh().face_centroid(local).unwrap();
            let b = grid.face_centroid(parent as usize).unwrap();
            assert!((a - b).norm() < 1e-12);
        }
    }

    #[test]
    fn test_extract_faces_out_of_range() {
        let err = triangle().extract_faces(&[2]).unwrap_err();
        assert_eq!(
            err,
            MeshError::FaceOutOfRange {
                face: 2,
                face_count: 1
            }
        );
    }

    #[test]
    fn test_planar_grid_bounds() {
        let grid = planar_grid(4, 2, 0.5);
        let b = grid.bounds();
        assert!((b.max.x - 2.0).abs() < 1e-12);
        assert!((b.max.y - 1.0).abs() < 1e-12);
        assert_eq!(grid.face_count(), 16);
    }
}
