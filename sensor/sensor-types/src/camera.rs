//! Camera model.
//!
//! A camera is a pinhole projection (intrinsics), a rigid world-to-camera
//! transform (extrinsics), a geographic anchor used for spatial chunking,
//! and a key naming the image it captured.
//!
//! Camera coordinates follow the photogrammetry convention: X right,
//! Y down, Z forward along the optical axis.

use nalgebra::{Matrix3, Matrix4, Point3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{SensorError, SensorResult};
use crate::GeoAnchor;

/// Camera intrinsic parameters (pinhole model, no distortion).
///
/// Projects a camera-frame point `[X, Y, Z]` to pixel coordinates:
/// ```text
/// u = fx * X/Z + cx
/// v = fy * Y/Z + cy
/// ```
///
/// # Example
///
/// ```
/// use sensor_types::CameraIntrinsics;
///
/// // Principal point given as an offset from the image center.
/// let k = CameraIntrinsics::from_center_offset(1000.0, 4.0, -2.0, 640, 480);
/// assert!((k.cx - 324.0).abs() < 1e-12);
/// assert!((k.cy - 238.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CameraIntrinsics {
    /// Focal length in pixels (x direction).
    pub fx: f64,
    /// Focal length in pixels (y direction).
    pub fy: f64,
    /// Principal point x-coordinate in pixels.
    pub cx: f64,
    /// Principal point y-coordinate in pixels.
    pub cy: f64,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
}

impl CameraIntrinsics {
    /// Creates intrinsics from absolute principal point coordinates.
    #[must_use]
    pub const fn new(fx: f64, fy: f64, cx: f64, cy: f64, width: u32, height: u32) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            width,
            height,
        }
    }

    /// Creates intrinsics for an ideal pinhole camera centered in the image.
    #[must_use]
    pub fn ideal(focal_length: f64, width: u32, height: u32) -> Self {
        Self::from_center_offset(focal_length, 0.0, 0.0, width, height)
    }

    /// Creates intrinsics whose principal point is offset from the image center.
    ///
    /// This is the convention of most photogrammetry exports.
    #[must_use]
    pub fn from_center_offset(
        focal_length: f64,
        offset_x: f64,
        offset_y: f64,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            fx: focal_length,
            fy: focal_length,
            cx: f64::from(width) / 2.0 + offset_x,
            cy: f64::from(height) / 2.0 + offset_y,
            width,
            height,
        }
    }

    /// Image size as `(width, height)`.
    #[must_use]
    pub const fn image_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Checks focal lengths and image size.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::InvalidIntrinsics`] for non-positive or
    /// non-finite focal lengths, non-finite principal points, or an empty image.
    pub fn validate(&self) -> SensorResult<()> {
        if !(self.fx.is_finite() && self.fy.is_finite() && self.fx > 0.0 && self.fy > 0.0) {
            return Err(SensorError::invalid_intrinsics(format!(
                "focal lengths must be positive, got ({}, {})",
                self.fx, self.fy
            )));
        }
        if !(self.cx.is_finite() && self.cy.is_finite()) {
            return Err(SensorError::invalid_intrinsics("principal point must be finite"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(SensorError::invalid_intrinsics(format!(
                "image size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Projects a camera-frame point to pixel coordinates.
    ///
    /// Returns `None` if the point is behind the camera (Z <= 0).
    #[must_use]
    pub fn project(&self, point: [f64; 3]) -> Option<[f64; 2]> {
        let [x, y, z] = point;
        if z <= 0.0 {
            return None;
        }
        Some([self.fx * x / z + self.cx, self.fy * y / z + self.cy])
    }

    /// Unprojects a pixel to a normalized camera-frame ray direction.
    #[must_use]
    pub fn unproject(&self, pixel: [f64; 2]) -> [f64; 3] {
        let x = (pixel[0] - self.cx) / self.fx;
        let y = (pixel[1] - self.cy) / self.fy;
        let norm = x.mul_add(x, y.mul_add(y, 1.0)).sqrt();
        [x / norm, y / norm, 1.0 / norm]
    }
}

/// A calibrated, posed camera.
///
/// Immutable once constructed.
///
/// # Example
///
/// ```
/// use nalgebra::Matrix4;
/// use sensor_types::{Camera, CameraIntrinsics, GeoAnchor};
///
/// let camera = Camera::new(
///     CameraIntrinsics::ideal(100.0, 64, 48),
///     Matrix4::identity(),
///     GeoAnchor::new(-122.0, 45.0),
///     "IMG_0001.JPG",
/// )
/// .unwrap();
///
/// let px = camera.project_world(&nalgebra::Point3::new(0.0, 0.0, 10.0)).unwrap();
/// assert!((px[0] - 32.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Camera {
    intrinsics: CameraIntrinsics,
    world_to_cam: Matrix4<f64>,
    anchor: GeoAnchor,
    image_key: String,
}

impl Camera {
    /// Build a camera, validating intrinsics and pose.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::InvalidIntrinsics`] for unusable intrinsics and
    /// [`SensorError::InvalidPose`] if `world_to_cam` is not a finite rigid
    /// transform with last row `[0, 0, 0, 1]`.
    pub fn new(
        intrinsics: CameraIntrinsics,
        world_to_cam: Matrix4<f64>,
        anchor: GeoAnchor,
        image_key: impl Into<String>,
    ) -> SensorResult<Self> {
        intrinsics.validate()?;
        validate_pose(&world_to_cam)?;
        anchor.validate()?;
        Ok(Self {
            intrinsics,
            world_to_cam,
            anchor,
            image_key: image_key.into(),
        })
    }

    /// Pinhole intrinsics.
    #[must_use]
    pub const fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    /// World-to-camera homogeneous transform.
    #[must_use]
    pub const fn world_to_cam(&self) -> &Matrix4<f64> {
        &self.world_to_cam
    }

    /// Geographic anchor of the camera center.
    #[must_use]
    pub const fn anchor(&self) -> GeoAnchor {
        self.anchor
    }

    /// Key of the captured image (usually a relative path).
    #[must_use]
    pub fn image_key(&self) -> &str {
        &self.image_key
    }

    /// Image size as `(width, height)`.
    #[must_use]
    pub const fn image_size(&self) -> (u32, u32) {
        self.intrinsics.image_size()
    }

    /// Camera center in world coordinates.
    #[must_use]
    pub fn center(&self) -> Point3<f64> {
        let rotation: Matrix3<f64> = self.world_to_cam.fixed_view::<3, 3>(0, 0).into_owned();
        let translation = self.world_to_cam.fixed_view::<3, 1>(0, 3).into_owned();
        Point3::from(-(rotation.transpose() * translation))
    }

    /// Transform a world point into the camera frame.
    #[must_use]
    pub fn to_camera_frame(&self, point: &Point3<f64>) -> Point3<f64> {
        self.world_to_cam.transform_point(point)
    }

    /// Project a world point to pixel coordinates, if it is in front of the camera.
    ///
    /// The result may lie outside the image bounds.
    #[must_use]
    pub fn project_world(&self, point: &Point3<f64>) -> Option<[f64; 2]> {
        let p = self.to_camera_frame(point);
        self.intrinsics.project([p.x, p.y, p.z])
    }
}

fn validate_pose(m: &Matrix4<f64>) -> SensorResult<()> {
    if m.iter().any(|v| !v.is_finite()) {
        return Err(SensorError::invalid_pose("non-finite entries"));
    }
    let last_row_ok = m[(3, 0)].abs() < 1e-9
        && m[(3, 1)].abs() < 1e-9
        && m[(3, 2)].abs() < 1e-9
        && (m[(3, 3)] - 1.0).abs() < 1e-9;
    if !last_row_ok {
        return Err(SensorError::invalid_pose("last row must be [0, 0, 0, 1]"));
    }
    let rotation: Matrix3<f64> = m.fixed_view::<3, 3>(0, 0).into_owned();
    let orthogonality = (rotation.transpose() * rotation - Matrix3::identity()).norm();
    if orthogonality > 1e-6 || rotation.determinant() <= 0.0 {
        return Err(SensorError::invalid_pose(
            "rotation block must be orthonormal with positive determinant",
        ));
    }
    Ok(())
}
