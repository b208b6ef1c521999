//! Core mesh types for multi-view projection.
//!
//! This crate provides the surface model that per-image predictions are
//! fused onto:
//!
//! - [`Vertex`] - A point in 3D space
//! - [`IndexedMesh`] - A triangle mesh with indexed vertices
//! - [`LocalToGlobal`] - The optional loader transform into the global frame
//! - [`SubMesh`] / [`FaceIdMap`] - Chunk meshes and their parent face ids
//! - [`Aabb`] - Axis-aligned bounding box
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. It can be used in:
//! - CLI tools
//! - Web applications (WASM)
//! - Servers
//! - Python bindings
//!
//! # Face Identity
//!
//! A face is identified by its position in [`IndexedMesh::faces`]. Face and
//! vertex counts never change after load; chunk extraction produces a new
//! mesh and a [`FaceIdMap`] to translate chunk-local ids back.
//!
//! # Example
//!
//! ```
//! use mesh_types::{planar_grid, LocalToGlobal};
//!
//! let mesh = planar_grid(4, 4, 1.0);
//! let global = mesh.transformed(&LocalToGlobal::identity());
//! assert_eq!(global.face_count(), 32);
//!
//! let chunk = global.extract_faces(&[0, 1, 2]).unwrap();
//! assert_eq!(chunk.parent_face_ids().parent_of(2), Some(2));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod bounds;
mod error;
mod mesh;
mod submesh;
mod transform;
mod vertex;

pub use bounds::Aabb;
pub use error::{MeshError, MeshResult};
pub use mesh::{planar_grid, IndexedMesh};
pub use submesh::{FaceIdMap, SubMesh};
pub use transform::LocalToGlobal;
pub use vertex::Vertex;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point3, Vector3};
