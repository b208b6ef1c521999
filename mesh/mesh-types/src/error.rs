//! Error types for mesh construction and chunk extraction.

use thiserror::Error;

/// Result type alias for mesh operations.
pub type MeshResult<T> = Result<T, MeshError>;

/// Errors that can occur while building or slicing a mesh.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshError {
    /// A face references a vertex that does not exist.
    #[error("face {face} references vertex {vertex}, but mesh has {vertex_count} vertices")]
    InvalidFaceIndex {
        /// Face index.
        face: usize,
        /// Offending vertex index.
        vertex: u32,
        /// Number of vertices in the mesh.
        vertex_count: usize,
    },

    /// A requested face does not exist in the parent mesh.
    #[error("face {face} is out of range for mesh with {face_count} faces")]
    FaceOutOfRange {
        /// Requested face index.
        face: u32,
        /// Number of faces in the mesh.
        face_count: usize,
    },

    /// The local-to-global transform is not a 4x4 matrix.
    #[error("transform must be 4x4, got {rows}x{cols}")]
    MalformedTransform {
        /// Number of rows supplied.
        rows: usize,
        /// Number of columns in the first offending row.
        cols: usize,
    },

    /// The transform contains non-finite entries.
    #[error("transform contains non-finite values")]
    NonFiniteTransform,
}

impl MeshError {
    /// Create a malformed transform error.
    #[must_use]
    pub const fn malformed_transform(rows: usize, cols: usize) -> Self {
        Self::MalformedTransform { rows, cols }
    }
}
