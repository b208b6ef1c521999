//! Render-space cameras and z-buffer pix-to-face rasterization.
//!
//! This crate answers one question for every pixel of every camera: which
//! mesh face, if any, is visible there?
//!
//! - [`RenderCameras`] - Domain cameras converted into the rasterizer's frame
//! - [`Rasterizer`] - Batched pix-to-face over a [`RasterBackend`]
//! - [`PixToFace`] - Per-camera visible-face map ([`NO_FACE`] where empty)
//! - [`ExecutionContext`] - Backend, parallelism and seed for one run
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. The bundled
//! [`CpuRasterBackend`] is pure Rust; other backends plug in through the
//! [`RasterBackend`] trait.
//!
//! # Coordinate Conventions
//!
//! Domain cameras are right-handed with X right, Y down and Z forward. The
//! render frame flips X and Y (see [`axis_flip`]). Image sizes inside this
//! crate are `(height, width)`.
//!
//! # Example
//!
//! ```
//! use mesh_types::planar_grid;
//! use nalgebra::{Rotation3, Translation3, Vector3};
//! use projection_raster::{ExecutionContext, RasterParams, Rasterizer};
//! use sensor_types::{Camera, CameraIntrinsics, GeoAnchor};
//!
//! let mesh = planar_grid(8, 8, 1.0);
//! let down = Rotation3::from_axis_angle(&Vector3::x_axis(), std::f64::consts::PI);
//! let w2c = Translation3::new(-4.0, 4.0, 20.0).to_homogeneous() * down.to_homogeneous();
//! let cam = Camera::new(CameraIntrinsics::ideal(60.0, 48, 48), w2c, GeoAnchor::new(0.0, 0.0), "img").unwrap();
//!
//! let raster = Rasterizer::new(ExecutionContext::cpu(), RasterParams::default()).unwrap();
//! let p2f = raster.pix_to_face_cameras([&cam], &mesh).unwrap();
//! assert!(p2f[0].unique_faces().len() > 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]

mod backend;
mod context;
mod cpu;
mod error;
mod params;
mod pix2face;
mod rasterizer;
mod render;

pub use backend::{Fragments, NO_PACKED_FACE, RasterBackend};
pub use context::{BackendType, ExecutionContext};
pub use cpu::CpuRasterBackend;
pub use error::{RasterError, RasterResult};
pub use params::RasterParams;
pub use pix2face::{NO_FACE, PixToFace};
pub use rasterizer::{Rasterizer, VertexFeatures};
pub use render::{RenderCamera, RenderCameras, axis_flip};
