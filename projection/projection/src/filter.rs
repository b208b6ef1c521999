//! Post-filters over per-face classes.
//!
//! Both filters are pure: they return a new class vector and leave the
//! accumulator untouched.

use nalgebra::Point3;
use sensor_types::TerrainRaster;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProjectionError, ProjectionResult};

/// Class written over filtered faces. The default is unknown (`None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroundLabel(pub Option<usize>);

impl GroundLabel {
    /// Unknown sentinel.
    pub const UNKNOWN: Self = Self(None);

    /// A concrete class.
    #[must_use]
    pub const fn class(class: usize) -> Self {
        Self(Some(class))
    }
}

/// Parameters for [`filter_ground`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundFilter {
    /// Faces less than this far above the terrain are ground, in meters.
    pub height_threshold: f64,
    /// Replacement class for ground faces.
    pub label: GroundLabel,
}

impl Default for GroundFilter {
    fn default() -> Self {
        Self {
            height_threshold: 2.0,
            label: GroundLabel::UNKNOWN,
        }
    }
}

impl GroundFilter {
    /// Set the height threshold.
    #[must_use]
    pub const fn height_threshold(mut self, meters: f64) -> Self {
        self.height_threshold = meters;
        self
    }

    /// Set the replacement class.
    #[must_use]
    pub const fn label(mut self, label: GroundLabel) -> Self {
        self.label = label;
        self
    }
}

/// Overwrite faces close to the ground with the ground label.
///
/// `centroids` are face centroids in the terrain's planar frame. Faces
/// whose centroid falls outside the raster or on a no-data cell keep their
/// class.
///
/// # Errors
///
/// Returns [`ProjectionError::LengthMismatch`] if `centroids` and `classes`
/// differ in length, and [`ProjectionError::InvalidConfig`] for a
/// non-finite threshold.
///
/// # Example
///
/// ```
/// use nalgebra::Point3;
/// use projection::{GroundFilter, filter_ground};
/// use sensor_types::TerrainRaster;
///
/// let terrain = TerrainRaster::flat(100.0, 10, 10, [0.0, 10.0], 1.0).unwrap();
/// let centroids = [Point3::new(2.0, 2.0, 100.5), Point3::new(3.0, 3.0, 108.0)];
/// let classes = filter_ground(&[Some(4), Some(4)], &centroids, &terrain, &GroundFilter::default()).unwrap();
/// assert_eq!(classes, vec![None, Some(4)]);
/// ```
pub fn filter_ground(
    classes: &[Option<usize>],
    centroids: &[Point3<f64>],
    terrain: &TerrainRaster,
    filter: &GroundFilter,
) -> ProjectionResult<Vec<Option<usize>>> {
    ProjectionError::check_len("centroids", classes.len(), centroids.len())?;
    if !filter.height_threshold.is_finite() {
        return Err(ProjectionError::invalid_config(format!(
            "ground height threshold {} is not finite",
            filter.height_threshold
        )));
    }

    let mut replaced = 0_usize;
    let out = classes
        .iter()
        .zip(centroids)
        .map(|(&class, c)| match terrain.height_at(c.x, c.y) {
            Some(ground) if c.z - f64::from(ground) < filter.height_threshold => {
                replaced += 1;
                filter.label.0
            }
            _ => class,
        })
        .collect();
    debug!(faces = classes.len(), replaced, "ground filter applied");
    Ok(out)
}

/// Even-odd ray casting test.
fn inside_polygon(x: f64, y: f64, polygon: &[[f64; 2]]) -> bool {
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let ([xi, yi], [xj, yj]) = (polygon[i], polygon[j]);
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Overwrite faces whose centroid lies outside a planar region of interest.
///
/// # Errors
///
/// Returns [`ProjectionError::LengthMismatch`] if `centroids` and `classes`
/// differ in length, and [`ProjectionError::InvalidConfig`] for a polygon
/// with fewer than three vertices.
///
/// # Example
///
/// ```
/// use nalgebra::Point3;
/// use projection::{GroundLabel, filter_roi};
///
/// let roi = [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]];
/// let centroids = [Point3::new(5.0, 5.0, 0.0), Point3::new(15.0, 5.0, 0.0)];
/// let classes = filter_roi(&[Some(1), Some(1)], &centroids, &roi, GroundLabel::UNKNOWN).unwrap();
/// assert_eq!(classes, vec![Some(1), None]);
/// ```
pub fn filter_roi(
    classes: &[Option<usize>],
    centroids: &[Point3<f64>],
    polygon: &[[f64; 2]],
    label: GroundLabel,
) -> ProjectionResult<Vec<Option<usize>>> {
    ProjectionError::check_len("centroids", classes.len(), centroids.len())?;
    if polygon.len() < 3 {
        return Err(ProjectionError::invalid_config(format!(
            "region of interest needs at least 3 vertices, got {}",
            polygon.len()
        )));
    }
    Ok(classes
        .iter()
        .zip(centroids)
        .map(|(&class, c)| if inside_polygon(c.x, c.y, polygon) { class } else { label.0 })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terrain() -> TerrainRaster {
        // 2 x 2 cells of 5 m, north-up with origin at the top-left corner.
        TerrainRaster::new(vec![10.0, f32::NAN, 10.0, 20.0], 2, 2, [0.0, 10.0], 5.0).unwrap()
    }

    #[test]
    fn test_ground_threshold() {
        let centroids = [
            Point3::new(1.0, 9.0, 11.0),  // 1 m above
            Point3::new(1.0, 9.0, 13.0),  // 3 m above
            Point3::new(6.0, 9.0, 0.0),   // no-data cell
            Point3::new(50.0, 50.0, 0.0), // outside
            Point3::new(6.0, 1.0, 21.9),  // 1.9 m above
        ];
        let classes = vec![Some(3); 5];
        let out = filter_ground(&classes, &centroids, &terrain(), &GroundFilter::default()).unwrap();
        assert_eq!(out, vec![None, Some(3), Some(3), Some(3), None]);
    }

    #[test]
    fn test_ground_sentinel_and_threshold() {
        let centroids = [Point3::new(1.0, 9.0, 13.0)];
        let filter = GroundFilter::default().height_threshold(5.0).label(GroundLabel::class(0));
        let out = filter_ground(&[Some(2)], &centroids, &terrain(), &filter).unwrap();
        assert_eq!(out, vec![Some(0)]);

        // Unknown faces near the ground also take the sentinel.
        let out = filter_ground(&[None], &centroids, &terrain(), &filter).unwrap();
        assert_eq!(out, vec![Some(0)]);
    }

    #[test]
    fn test_ground_errors() {
        let centroids = [Point3::origin()];
        assert!(matches!(
            filter_ground(&[None, None], &centroids, &terrain(), &GroundFilter::default()),
            Err(ProjectionError::LengthMismatch { .. })
        ));
        let nan = GroundFilter::default().height_threshold(f64::NAN);
        assert!(filter_ground(&[None], &centroids, &terrain(), &nan).is_err());
    }

    #[test]
    fn test_roi_concave() {
        // L-shaped region.
        let roi = [[0.0, 0.0], [4.0, 0.0], [4.0, 1.0], [1.0, 1.0], [1.0, 4.0], [0.0, 4.0]];
        assert!(inside_polygon(0.5, 3.0, &roi));
        assert!(inside_polygon(3.0, 0.5, &roi));
        assert!(!inside_polygon(3.0, 3.0, &roi));
        assert!(filter_roi(&[], &[], &roi[..2], GroundLabel::UNKNOWN).is_err());
    }
}
