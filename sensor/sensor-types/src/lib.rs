//! Camera and terrain sensor types for multi-view projection.
//!
//! This crate provides the observation side of the projection pipeline:
//! - [`CameraIntrinsics`] - Pinhole calibration
//! - [`Camera`] - Calibrated, posed camera with a geographic anchor
//! - [`CameraSet`] - Ordered camera collection with shared subsetting
//! - [`GeoAnchor`] / [`LocalTangentPlane`] - WGS84 positions and planar projection
//! - [`TerrainRaster`] - Digital terrain model for ground filtering
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. It can be used in:
//! - CLI tools
//! - Web applications (WASM)
//! - Servers
//! - Photogrammetry pipelines
//!
//! # Coordinate Frames
//!
//! - Camera frame: X right, Y down, Z forward.
//! - World frame: whatever frame the mesh vertices are expressed in.
//! - Planar frame: east/north meters on a [`LocalTangentPlane`].
//!
//! # Example
//!
//! ```
//! use nalgebra::Matrix4;
//! use sensor_types::{Camera, CameraIntrinsics, CameraSet, GeoAnchor, LocalTangentPlane};
//!
//! let camera = Camera::new(
//!     CameraIntrinsics::ideal(800.0, 640, 480),
//!     Matrix4::identity(),
//!     GeoAnchor::new(-122.0, 45.0),
//!     "IMG_0001.JPG",
//! )
//! .unwrap();
//! let set = CameraSet::single(camera);
//!
//! let plane = LocalTangentPlane::centered_on(&set.anchors()).unwrap();
//! let [east, north] = plane.to_planar(&set.get(0).unwrap().anchor());
//! assert!(east.abs() < 1e-6 && north.abs() < 1e-6);
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod camera;
mod camera_set;
mod error;
mod geo;
mod terrain;

pub use camera::{Camera, CameraIntrinsics};
pub use camera_set::CameraSet;
pub use error::{SensorError, SensorResult};
pub use geo::{ecef_to_geodetic, geodetic_to_ecef, wgs84, GeoAnchor, LocalTangentPlane};
pub use terrain::TerrainRaster;
