//! Chunk meshes and their mapping back to the parent mesh.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::IndexedMesh;

/// Ordered parent-face indices for a sub-mesh.
///
/// Entry `i` is the index, in the parent mesh, of sub-mesh face `i`.
///
/// # Example
///
/// ```
/// use mesh_types::FaceIdMap;
///
/// let map = FaceIdMap::new(vec![4, 9, 2]);
/// assert_eq!(map.parent_of(1), Some(9));
/// assert_eq!(map.parent_of(3), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FaceIdMap(Vec<u32>);

impl FaceIdMap {
    /// Wrap an ordered list of parent face ids.
    #[must_use]
    pub const fn new(parent_ids: Vec<u32>) -> Self {
        Self(parent_ids)
    }

    /// A map onto itself for an unchunked mesh of `face_count` faces.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn identity(face_count: usize) -> Self {
        Self((0..face_count as u32).collect())
    }

    /// Number of mapped faces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no face is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parent id of local face `local`.
    #[must_use]
    pub fn parent_of(&self, local: usize) -> Option<u32> {
        self.0.get(local).copied()
    }

    /// The ids as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    /// Iterate over parent ids in local order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }
}

/// A mesh extracted from a parent, plus the map back to parent faces.
///
/// The chunk owns its vertex and face buffers. The face map is read-only
/// and exists only so results can be scattered back into parent-sized
/// accumulators.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SubMesh {
    mesh: IndexedMesh,
    parent_face_ids: FaceIdMap,
}

impl SubMesh {
    pub(crate) const fn new(mesh: IndexedMesh, parent_face_ids: FaceIdMap) -> Self {
        Self {
            mesh,
            parent_face_ids,
        }
    }

    /// The chunk geometry.
    #[must_use]
    pub const fn mesh(&self) -> &IndexedMesh {
        &self.mesh
    }

    /// Parent face index of each chunk face.
    #[must_use]
    pub const fn parent_face_ids(&self) -> &FaceIdMap {
        &self.parent_face_ids
    }

    /// Split into geometry and map.
    #[must_use]
    pub fn into_parts(self) -> (IndexedMesh, FaceIdMap) {
        (self.mesh, self.parent_face_ids)
    }
}
