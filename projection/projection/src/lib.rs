//! Multi-view projection of per-image predictions onto 3D meshes.
//!
//! This umbrella crate wires the projection-* crates into one pipeline:
//! cameras are rasterized against the mesh, each image's labels are reduced
//! onto the faces it sees, and the per-image results are accumulated into one
//! statistic and one consensus class per face. Large scenes can be split
//! into spatial chunks first and merged back through face id maps.
//!
//! # Quick Start
//!
//! ```
//! use mesh_types::planar_grid;
//! use ml_types::LabelImage;
//! use nalgebra::Matrix4;
//! use projection::prelude::*;
//!
//! // A camera 5 m above a 4 m x 4 m grid, looking straight down.
//! let mut w2c = Matrix4::identity();
//! w2c[(1, 1)] = -1.0;
//! w2c[(2, 2)] = -1.0;
//! w2c[(0, 3)] = -2.0;
//! w2c[(1, 3)] = 2.0;
//! w2c[(2, 3)] = 5.0;
//! let camera = Camera::new(CameraIntrinsics::ideal(40.0, 32, 32), w2c, GeoAnchor::new(8.5, 47.3), "img_0.jpg").unwrap();
//! let cameras = CameraSet::single(camera);
//! let mesh = planar_grid(4, 4, 1.0);
//!
//! let mut labels = LabelStore::new();
//! labels.insert(0, LabelImage::filled(32, 32, 1));
//!
//! let aggregator = Aggregator::<Dense>::new(
//!     ExecutionContext::cpu(),
//!     RasterParams::default(),
//!     ProjectorParams::for_classes(2),
//! )
//! .unwrap();
//! let out = aggregator.aggregate(&mesh, &cameras, labels).unwrap();
//! assert!(out.classes.iter().all(|c| *c == Some(1)));
//! ```
//!
//! # Module Organization
//!
//! ## Foundation
//! - [`types`] - Meshes, face id maps and loader transforms
//! - [`sensor`] - Cameras, camera sets, geodesy and terrain rasters
//! - [`labels`] - Class-id and feature images
//!
//! ## Pipeline
//! - [`raster`] - Camera conversion and pixel-to-face rasterization
//! - [`accumulate`] - Per-image projection, accumulators and consensus
//! - [`chunk`] - Camera clustering and buffered mesh regions
//!
//! ## This crate
//! - [`Aggregator`] - The end-to-end pipeline over a [`Strategy`] and a
//!   [`ChunkingPolicy`]
//! - [`AggregationConfig`] - JSON run configuration
//! - [`filter_ground`] / [`filter_roi`] - Class post-filters
//! - [`image_overlap_matrix`] - Face × image incidence for view selection

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]

mod aggregate;
mod config;
mod error;
mod filter;
mod overlap;

// =============================================================================
// Re-exports
// =============================================================================

/// Meshes, face id maps and loader transforms.
pub use mesh_types as types;

/// Cameras, camera sets, geodesy and terrain rasters.
pub use sensor_types as sensor;

/// Class-id and feature images.
pub use ml_types as labels;

/// Camera conversion and pixel-to-face rasterization.
pub use projection_raster as raster;

/// Per-image projection, accumulators and consensus.
pub use projection_accumulate as accumulate;

/// Camera clustering and buffered mesh regions.
pub use projection_chunk as chunk;

pub use aggregate::{
    AggregationOutput, Aggregator, ChunkingPolicy, Dense, LabelStore, SharedLabelSource, Sparse, Strategy,
};
pub use config::{AggregationConfig, AggregationParts, StrategyKind};
pub use error::{ProjectionError, ProjectionResult};
pub use filter::{GroundFilter, GroundLabel, filter_ground, filter_roi};
pub use overlap::{ImageIdLabels, ImageOverlap, faces_with_min_observations, image_overlap_matrix};

// =============================================================================
// Prelude
// =============================================================================

/// Common imports for aggregation runs.
///
/// ```
/// use projection::prelude::*;
/// ```
pub mod prelude {
    pub use mesh_types::{FaceIdMap, IndexedMesh, LocalToGlobal};
    pub use projection_accumulate::{Accumulator, ProjectorParams, Reduction, TieBreak};
    pub use projection_chunk::ChunkParams;
    pub use projection_raster::{ExecutionContext, RasterParams};
    pub use sensor_types::{Camera, CameraIntrinsics, CameraSet, GeoAnchor};

    pub use crate::{AggregationConfig, Aggregator, ChunkingPolicy, Dense, LabelStore, Sparse};
}
