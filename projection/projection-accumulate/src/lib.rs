//! Per-image projection and multi-view accumulation onto mesh faces.
//!
//! This crate turns per-camera visibility ([`projection_raster::PixToFace`])
//! and per-camera predictions into one statistic per mesh face:
//!
//! - [`Projections`] - Lazy per-image reduction of labels onto visible faces
//! - [`DenseAccumulator`] - Per-face sums for a few channels
//! - [`SparseAccumulator`] - Face × class counts for large class spaces
//! - [`consensus`] - Argmax class per face, with optional seeded jitter
//! - [`save_snapshot`] / [`load_snapshot`] - Resumable accumulator state
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**.
//!
//! # Counting Rule
//!
//! A face's observation count grows by at most one per image, however many
//! of that image's pixels land on it. Faces with a zero count have no
//! average: dense results hold NaN, sparse results an empty row, and
//! [`consensus`] yields `None`.
//!
//! # Example
//!
//! ```
//! use mesh_types::FaceIdMap;
//! use projection_accumulate::{Accumulator, DenseAccumulator, ImageProjection, ProjectedValues, SparseProjection};
//! use projection_raster::ExecutionContext;
//!
//! let ctx = ExecutionContext::cpu();
//! let mut chunk = DenseAccumulator::new(2, 2, &ctx).unwrap();
//! chunk
//!     .add(&ImageProjection {
//!         camera_index: 0,
//!         values: ProjectedValues::Sparse(SparseProjection::from_pairs([(0, 1), (1, 0)]).unwrap()),
//!     })
//!     .unwrap();
//!
//! // Chunk faces 0 and 1 are faces 7 and 3 of the full mesh.
//! let mut global = DenseAccumulator::new(10, 2, &ctx).unwrap();
//! global.merge(&chunk, &FaceIdMap::new(vec![7, 3])).unwrap();
//! assert_eq!(global.counts()[7], 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]

mod accumulator;
mod consensus;
mod dense;
mod error;
mod params;
mod projector;
mod snapshot;
mod sparse;

pub use accumulator::{Accumulator, AverageMatrix};
pub use consensus::{CountsHistogram, TieBreak, consensus, counts_histogram, vertex_labels_to_face_labels};
pub use dense::DenseAccumulator;
pub use error::{AccumulateError, AccumulateResult};
pub use params::{ProjectorParams, Reduction};
pub use projector::{
    DenseProjection, ImageProjection, LabelSource, ProjectedValues, Projections, SparseProjection,
    project_all, project_image,
};
pub use snapshot::{CsrBlob, DenseSnapshot, SparseSnapshot, load_snapshot, save_snapshot};
pub use sparse::SparseAccumulator;
