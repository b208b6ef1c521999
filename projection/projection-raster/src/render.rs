//! Camera-to-render-space conversion.
//!
//! Domain cameras look down +Z with X right and Y down. The render space
//! used by the rasterizer has X left and Y up, so every world-to-camera
//! transform is pre-multiplied by a fixed flip about the optical axis before
//! being split into rotation and translation blocks.
//!
//! Rotation blocks are stored transposed (row-vector convention), so a world
//! point `p` maps into render view space as `R^T p + T`.

use nalgebra::{Matrix3, Matrix4, Point3, Vector3};
use sensor_types::Camera;

use crate::error::{RasterError, RasterResult};

/// Fixed flip about the optical axis: `diag(-1, -1, 1, 1)`.
#[must_use]
pub fn axis_flip() -> Matrix4<f64> {
    Matrix4::from_diagonal(&nalgebra::Vector4::new(-1.0, -1.0, 1.0, 1.0))
}

/// One camera in render space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderCamera {
    /// Transposed rotation block of the flipped world-to-camera transform.
    pub rotation: Matrix3<f64>,
    /// Translation block of the flipped world-to-camera transform.
    pub translation: Vector3<f64>,
    /// Focal lengths `(fx, fy)` in screen pixels.
    pub focal: [f64; 2],
    /// Principal point `(px, py)` in screen pixels.
    pub principal: [f64; 2],
}

impl RenderCamera {
    fn from_camera(camera: &Camera) -> Self {
        let flipped = axis_flip() * camera.world_to_cam();
        let k = camera.intrinsics();
        Self {
            rotation: flipped.fixed_view::<3, 3>(0, 0).transpose(),
            translation: flipped.fixed_view::<3, 1>(0, 3).into_owned(),
            focal: [k.fx, k.fy],
            principal: [k.cx, k.cy],
        }
    }

    /// World point in render view coordinates (X left, Y up, Z forward).
    #[must_use]
    pub fn to_view(&self, point: &Point3<f64>) -> Vector3<f64> {
        self.rotation.transpose() * point.coords + self.translation
    }

    /// Screen position `(u, v)` and depth of a view-space point.
    ///
    /// Returns `None` when the point is not in front of the camera.
    #[must_use]
    pub fn view_to_screen(&self, view: &Vector3<f64>) -> Option<([f64; 2], f64)> {
        if view.z <= 0.0 {
            return None;
        }
        let u = self.principal[0] - self.focal[0] * view.x / view.z;
        let v = self.principal[1] - self.focal[1] * view.y / view.z;
        Some(([u, v], view.z))
    }

    /// Screen position and depth of a world point.
    #[must_use]
    pub fn project(&self, point: &Point3<f64>) -> Option<([f64; 2], f64)> {
        self.view_to_screen(&self.to_view(point))
    }
}

/// A batch of render-space cameras sharing one image size.
///
/// # Example
///
/// ```
/// use nalgebra::Matrix4;
/// use projection_raster::RenderCameras;
/// use sensor_types::{Camera, CameraIntrinsics, GeoAnchor};
///
/// let a = Camera::new(CameraIntrinsics::ideal(50.0, 64, 48), Matrix4::identity(), GeoAnchor::new(0.0, 0.0), "a").unwrap();
/// let b = Camera::new(CameraIntrinsics::ideal(50.0, 32, 24), Matrix4::identity(), GeoAnchor::new(0.0, 0.0), "b").unwrap();
///
/// assert!(RenderCameras::from_cameras([&a, &a]).is_ok());
/// assert!(RenderCameras::from_cameras([&a, &b]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RenderCameras {
    cameras: Vec<RenderCamera>,
    // (height, width)
    image_size: (u32, u32),
}

impl RenderCameras {
    /// Convert a single camera.
    #[must_use]
    pub fn from_camera(camera: &Camera) -> Self {
        let (width, height) = camera.image_size();
        Self {
            cameras: vec![RenderCamera::from_camera(camera)],
            image_size: (height, width),
        }
    }

    /// Convert a batch of cameras that share one image size.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::EmptyBatch`] for no cameras and
    /// [`RasterError::InconsistentImageSize`] if any camera's resolution
    /// differs from the first.
    pub fn from_cameras<'a>(cameras: impl IntoIterator<Item = &'a Camera>) -> RasterResult<Self> {
        let mut iter = cameras.into_iter();
        let first = iter.next().ok_or(RasterError::EmptyBatch)?;
        let (expected_width, expected_height) = first.image_size();

        let mut converted = vec![RenderCamera::from_camera(first)];
        for (offset, camera) in iter.enumerate() {
            let (found_width, found_height) = camera.image_size();
            if (found_width, found_height) != (expected_width, expected_height) {
                return Err(RasterError::InconsistentImageSize {
                    camera: offset + 1,
                    expected_width,
                    expected_height,
                    found_width,
                    found_height,
                });
            }
            converted.push(RenderCamera::from_camera(camera));
        }

        Ok(Self {
            cameras: converted,
            image_size: (expected_height, expected_width),
        })
    }

    /// Copy with image size, focal lengths and principal points scaled by `factor`.
    ///
    /// Image dimensions are floored and never drop below one pixel.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidScale`] unless `factor` is positive and finite.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::float_cmp
    )]
    pub fn scaled(&self, factor: f64) -> RasterResult<Self> {
        if !(factor.is_finite() && factor > 0.0) {
            return Err(RasterError::InvalidScale(factor));
        }
        if factor == 1.0 {
            return Ok(self.clone());
        }
        let scale_dim = |d: u32| ((f64::from(d) * factor).floor() as u32).max(1);
        Ok(Self {
            cameras: self
                .cameras
                .iter()
                .map(|c| RenderCamera {
                    focal: [c.focal[0] * factor, c.focal[1] * factor],
                    principal: [c.principal[0] * factor, c.principal[1] * factor],
                    ..*c
                })
                .collect(),
            image_size: (scale_dim(self.image_size.0), scale_dim(self.image_size.1)),
        })
    }

    /// Image size as `(height, width)`.
    #[must_use]
    pub const fn image_size(&self) -> (u32, u32) {
        self.image_size
    }

    /// Image width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.image_size.1
    }

    /// Image height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.image_size.0
    }

    /// Number of cameras in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    /// Returns `true` for an empty batch.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    /// Camera `k` of the batch.
    #[must_use]
    pub fn get(&self, k: usize) -> Option<&RenderCamera> {
        self.cameras.get(k)
    }

    /// All cameras of the batch.
    #[must_use]
    pub fn cameras(&self) -> &[RenderCamera] {
        &self.cameras
    }

    /// Sub-batch of cameras `start..end`.
    #[must_use]
    pub fn slice(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.cameras.len());
        let start = start.min(end);
        Self {
            cameras: self.cameras[start..end].to_vec(),
            image_size: self.image_size,
        }
    }
}
