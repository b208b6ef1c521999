//! Ordered camera sets with cheap index-based subsetting.

use std::sync::Arc;

use crate::error::{SensorError, SensorResult};
use crate::{Camera, GeoAnchor};

/// An ordered collection of cameras.
///
/// Cameras are shared behind [`Arc`], so [`CameraSet::subset`] returns a new
/// set that references the selected cameras rather than copying them.
///
/// # Example
///
/// ```
/// use nalgebra::Matrix4;
/// use sensor_types::{Camera, CameraIntrinsics, CameraSet, GeoAnchor};
///
/// let cams: Vec<Camera> = (0..3)
///     .map(|i| {
///         Camera::new(
///             CameraIntrinsics::ideal(100.0, 64, 48),
///             Matrix4::identity(),
///             GeoAnchor::new(f64::from(i) * 0.001, 0.0),
///             format!("img_{i}.jpg"),
///         )
///         .unwrap()
///     })
///     .collect();
///
/// let set = CameraSet::new(cams);
/// let sub = set.subset(&[2, 0]).unwrap();
/// assert_eq!(sub.len(), 2);
/// assert_eq!(sub.get(0).unwrap().image_key(), "img_2.jpg");
/// ```
#[derive(Debug, Clone, Default)]
pub struct CameraSet {
    cameras: Vec<Arc<Camera>>,
}

impl CameraSet {
    /// Build a set from owned cameras.
    #[must_use]
    pub fn new(cameras: Vec<Camera>) -> Self {
        Self {
            cameras: cameras.into_iter().map(Arc::new).collect(),
        }
    }

    /// Build a set from already shared cameras.
    #[must_use]
    pub const fn from_shared(cameras: Vec<Arc<Camera>>) -> Self {
        Self { cameras }
    }

    /// A set holding one camera.
    #[must_use]
    pub fn single(camera: Camera) -> Self {
        Self::new(vec![camera])
    }

    /// Number of cameras.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    /// Returns `true` if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    /// Camera at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Camera> {
        self.cameras.get(index).map(AsRef::as_ref)
    }

    /// Shared handle to the camera at `index`.
    #[must_use]
    pub fn get_shared(&self, index: usize) -> Option<Arc<Camera>> {
        self.cameras.get(index).cloned()
    }

    /// Iterate over cameras in order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Camera> + '_ {
        self.cameras.iter().map(AsRef::as_ref)
    }

    /// Geographic anchors in camera order.
    #[must_use]
    pub fn anchors(&self) -> Vec<GeoAnchor> {
        self.iter().map(Camera::anchor).collect()
    }

    /// A new set holding the cameras at `indices`, in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::IndexOutOfRange`] for an index past the end.
    pub fn subset(&self, indices: &[usize]) -> SensorResult<Self> {
        let cameras = indices
            .iter()
            .map(|&index| {
                self.cameras
                    .get(index)
                    .cloned()
                    .ok_or(SensorError::IndexOutOfRange {
                        index,
                        len: self.cameras.len(),
                    })
            })
            .collect::<SensorResult<Vec<_>>>()?;
        Ok(Self { cameras })
    }
}

impl FromIterator<Camera> for CameraSet {
    fn from_iter<I: IntoIterator<Item = Camera>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CameraIntrinsics;
    use nalgebra::Matrix4;

    fn set_of(n: u32) -> CameraSet {
        (0..n)
            .map(|i| {
                Camera::new(
                    CameraIntrinsics::ideal(10.0, 8, 8),
                    Matrix4::identity(),
                    GeoAnchor::new(f64::from(i), 0.0),
                    format!("{i}"),
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_subset_shares_cameras() {
        let set = set_of(4);
        let sub = set.subset(&[1, 3]).unwrap();
        assert_eq!(sub.len(), 2);
        assert!(Arc::ptr_eq(
            &set.get_shared(3).unwrap(),
            &sub.get_shared(1).unwrap()
        ));
    }

    #[test]
    fn test_subset_out_of_range() {
        let err = set_of(2).subset(&[0, 5]).unwrap_err();
        assert_eq!(err, SensorError::IndexOutOfRange { index: 5, len: 2 });
    }

    #[test]
    fn test_anchors_in_order() {
        let anchors = set_of(3).anchors();
        assert!((anchors[2].lon - 2.0).abs() < f64::EPSILON);
        assert!(CameraSet::default().is_empty());
    }
}
