//! Spatial chunking of large scenes.
//!
//! Cameras are clustered by their geographic anchors and the mesh is cut
//! into one buffered region per cluster, so each region can be rasterized and
//! accumulated on its own:
//!
//! - [`chunk_mesh`] - Validate inputs, cluster cameras, return a [`ChunkIter`]
//! - [`Chunk`] - Sub-mesh, camera subset and face map back to the parent
//! - [`kmeans`] - Seeded k-means++ over planar points
//! - [`ConvexHull`] - Monotone-chain hull with point distance
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**.
//!
//! # Frames
//!
//! Clustering never runs on raw degrees. Anchors are mapped to east/north
//! meters in the WGS84 tangent plane at their mean. Mesh vertices are read in
//! the same plane ([`MeshFrame::Planar`]) or as longitude/latitude degrees
//! projected through it ([`MeshFrame::Geographic`]).
//!
//! # Example
//!
//! ```
//! use mesh_types::planar_grid;
//! use nalgebra::Matrix4;
//! use projection_chunk::{ChunkParams, chunk_mesh};
//! use sensor_types::{Camera, CameraIntrinsics, CameraSet, GeoAnchor};
//!
//! let cameras: CameraSet = [0.0, 0.0001]
//!     .into_iter()
//!     .map(|lon| {
//!         Camera::new(CameraIntrinsics::ideal(50.0, 64, 64), Matrix4::identity(), GeoAnchor::new(lon, 0.0), "img")
//!             .unwrap()
//!     })
//!     .collect();
//! let mesh = planar_grid(4, 4, 5.0);
//!
//! let params = ChunkParams::default().num_clusters(1).buffer_meters(30.0);
//! let chunks: Vec<_> = chunk_mesh(&mesh, &cameras, &params).unwrap().collect::<Result<_, _>>().unwrap();
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].cameras.len(), 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]

mod chunker;
mod error;
mod hull;
mod kmeans;
mod params;

pub use chunker::{Chunk, ChunkIter, chunk_mesh};
pub use error::{ChunkError, ChunkResult};
pub use hull::ConvexHull;
pub use kmeans::{KMeans, kmeans};
pub use params::{ChunkParams, MeshFrame};
