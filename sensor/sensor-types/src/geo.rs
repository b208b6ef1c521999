//! Geographic anchors and local planar projection.
//!
//! Camera clustering needs distances in meters. Longitude/latitude degrees
//! are anisotropic (a degree of longitude shrinks with `cos(lat)`), so
//! anchors are mapped onto a WGS84 local tangent plane (east, north, up)
//! before any distance computation.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{SensorError, SensorResult};

/// WGS84 ellipsoid constants.
pub mod wgs84 {
    /// Semi-major axis (equatorial radius) in meters.
    pub const A: f64 = 6_378_137.0;

    /// Flattening factor (1 / 298.257223563).
    pub const F: f64 = 1.0 / 298.257_223_563;

    /// First eccentricity squared.
    pub const E2: f64 = F * (2.0 - F);

    /// Semi-minor axis (polar radius) in meters.
    pub const B: f64 = A * (1.0 - F);

    /// Second eccentricity squared.
    pub const E2P: f64 = (A * A - B * B) / (B * B);
}

/// A geographic position in degrees (WGS84), with optional ellipsoidal height.
///
/// # Example
///
/// ```
/// use sensor_types::GeoAnchor;
///
/// let a = GeoAnchor::new(-122.4194, 37.7749);
/// let b = GeoAnchor::new(-122.4094, 37.7749);
/// let d = a.distance_to(&b);
/// assert!(d > 870.0 && d < 890.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeoAnchor {
    /// Longitude in degrees (-180 to 180).
    pub lon: f64,
    /// Latitude in degrees (-90 to 90).
    pub lat: f64,
    /// Height above the ellipsoid in meters.
    pub height: f64,
}

impl GeoAnchor {
    /// Anchor on the ellipsoid surface.
    #[must_use]
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self {
            lon,
            lat,
            height: 0.0,
        }
    }

    /// Anchor with an ellipsoidal height.
    #[must_use]
    pub const fn with_height(lon: f64, lat: f64, height: f64) -> Self {
        Self { lon, lat, height }
    }

    /// Checks that the anchor is finite and within range.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::InvalidCoordinate`] otherwise.
    pub fn validate(&self) -> SensorResult<()> {
        if !(self.lon.is_finite() && self.lat.is_finite() && self.height.is_finite()) {
            return Err(SensorError::InvalidCoordinate(
                "anchor contains non-finite values".to_string(),
            ));
        }
        if !(-90.0..=90.0).contains(&self.lat) || !(-180.0..=180.0).contains(&self.lon) {
            return Err(SensorError::InvalidCoordinate(format!(
                "anchor ({}, {}) out of range",
                self.lon, self.lat
            )));
        }
        Ok(())
    }

    /// Great-circle distance in meters (haversine, spherical Earth).
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        const EARTH_RADIUS_M: f64 = 6_371_000.0;

        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = (other.lat - self.lat).to_radians();
        let dlon = (other.lon - self.lon).to_radians();

        let a = (dlat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_M * c
    }
}

/// Convert geodetic coordinates (degrees, meters) to ECEF meters.
#[must_use]
pub fn geodetic_to_ecef(anchor: &GeoAnchor) -> [f64; 3] {
    let lat = anchor.lat.to_radians();
    let lon = anchor.lon.to_radians();
    let (sl, cl) = lat.sin_cos();
    let (so, co) = lon.sin_cos();
    let n = wgs84::A / (1.0 - wgs84::E2 * sl * sl).sqrt();
    let h = anchor.height;
    [
        (n + h) * cl * co,
        (n + h) * cl * so,
        (n * (1.0 - wgs84::E2) + h) * sl,
    ]
}

/// Convert ECEF meters back to geodetic coordinates (Bowring's method).
#[must_use]
pub fn ecef_to_geodetic(ecef: [f64; 3]) -> GeoAnchor {
    use wgs84::{A, B, E2, E2P};

    let [x, y, z] = ecef;
    let p = x.hypot(y);
    let lon = y.atan2(x);
    let theta = (z * A).atan2(p * B);
    let (st, ct) = theta.sin_cos();
    let lat = (z + E2P * B * st * st * st).atan2(p - E2 * A * ct * ct * ct);
    let sin_lat = lat.sin();
    let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let height = p / lat.cos() - n;

    GeoAnchor::with_height(lon.to_degrees(), lat.to_degrees(), height)
}

/// An east/north/up tangent plane at a fixed origin.
///
/// Distances in this frame are accurate to well under a meter across a few
/// kilometers, which is the scale of a photogrammetry survey.
///
/// # Example
///
/// ```
/// use sensor_types::{GeoAnchor, LocalTangentPlane};
///
/// let origin = GeoAnchor::new(10.0, 60.0);
/// let plane = LocalTangentPlane::new(origin);
///
/// // 0.01 degrees of longitude at 60N is ~558 m east.
/// let [e, n] = plane.to_planar(&GeoAnchor::new(10.01, 60.0));
/// assert!((e - 558.0).abs() < 1.0);
/// assert!(n.abs() < 1.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalTangentPlane {
    origin: GeoAnchor,
    origin_ecef: [f64; 3],
    // Rows are east, north, up in ECEF components.
    rotation: [[f64; 3]; 3],
}

impl LocalTangentPlane {
    /// Tangent plane at `origin`.
    #[must_use]
    pub fn new(origin: GeoAnchor) -> Self {
        let (s_lat, c_lat) = origin.lat.to_radians().sin_cos();
        let (s_lon, c_lon) = origin.lon.to_radians().sin_cos();
        Self {
            origin,
            origin_ecef: geodetic_to_ecef(&origin),
            rotation: [
                [-s_lon, c_lon, 0.0],
                [-s_lat * c_lon, -s_lat * s_lon, c_lat],
                [c_lat * c_lon, c_lat * s_lon, s_lat],
            ],
        }
    }

    /// Tangent plane at the mean of `anchors`.
    ///
    /// Returns `None` for an empty slice.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn centered_on(anchors: &[GeoAnchor]) -> Option<Self> {
        if anchors.is_empty() {
            return None;
        }
        let n = anchors.len() as f64;
        let lon = anchors.iter().map(|a| a.lon).sum::<f64>() / n;
        let lat = anchors.iter().map(|a| a.lat).sum::<f64>() / n;
        Some(Self::new(GeoAnchor::new(lon, lat)))
    }

    /// Origin of the plane.
    #[must_use]
    pub const fn origin(&self) -> GeoAnchor {
        self.origin
    }

    /// East/north/up coordinates of `anchor` in meters.
    #[must_use]
    pub fn to_enu(&self, anchor: &GeoAnchor) -> [f64; 3] {
        let p = geodetic_to_ecef(anchor);
        let d = [
            p[0] - self.origin_ecef[0],
            p[1] - self.origin_ecef[1],
            p[2] - self.origin_ecef[2],
        ];
        let r = &self.rotation;
        [
            r[0][0].mul_add(d[0], r[0][1].mul_add(d[1], r[0][2] * d[2])),
            r[1][0].mul_add(d[0], r[1][1].mul_add(d[1], r[1][2] * d[2])),
            r[2][0].mul_add(d[0], r[2][1].mul_add(d[1], r[2][2] * d[2])),
        ]
    }

    /// East/north coordinates of `anchor` in meters.
    #[must_use]
    pub fn to_planar(&self, anchor: &GeoAnchor) -> [f64; 2] {
        let [e, n, _] = self.to_enu(anchor);
        [e, n]
    }

    /// Geodetic position of an east/north/up offset.
    #[must_use]
    pub fn to_geodetic(&self, enu: [f64; 3]) -> GeoAnchor {
        let r = &self.rotation;
        // Inverse rotation is the transpose.
        let d = [
            r[0][0].mul_add(enu[0], r[1][0].mul_add(enu[1], r[2][0] * enu[2])),
            r[0][1].mul_add(enu[0], r[1][1].mul_add(enu[1], r[2][1] * enu[2])),
            r[0][2].mul_add(enu[0], r[1][2].mul_add(enu[1], r[2][2] * enu[2])),
        ];
        ecef_to_geodetic([
            self.origin_ecef[0] + d[0],
            self.origin_ecef[1] + d[1],
            self.origin_ecef[2] + d[2],
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ecef_roundtrip() {
        let a = GeoAnchor::with_height(-121.5, 38.6, 120.0);
        let b = ecef_to_geodetic(geodetic_to_ecef(&a));
        assert!((a.lon - b.lon).abs() < 1e-9);
        assert!((a.lat - b.lat).abs() < 1e-9);
        assert!((a.height - b.height).abs() < 1e-4);
    }

    #[test]
    fn test_origin_maps_to_zero() {
        let origin = GeoAnchor::new(5.0, 45.0);
        let plane = LocalTangentPlane::new(origin);
        let enu = plane.to_enu(&origin);
        assert!(enu.iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn test_planar_distance_matches_haversine() {
        // At high latitude a naive degree grid distorts badly; the tangent
        // plane keeps distances close to great-circle values.
        let a = GeoAnchor::new(20.0, 70.0);
        let b = GeoAnchor::new(20.02, 70.01);
        let plane = LocalTangentPlane::centered_on(&[a, b]).unwrap();
        let pa = plane.to_planar(&a);
        let pb = plane.to_planar(&b);
        let planar = (pa[0] - pb[0]).hypot(pa[1] - pb[1]);
        let geodesic = a.distance_to(&b);
        assert!((planar - geodesic).abs() / geodesic < 0.01);
    }

    #[test]
    fn test_to_geodetic_inverts_to_enu() {
        let plane = LocalTangentPlane::new(GeoAnchor::new(-120.0, 39.0));
        let p = GeoAnchor::with_height(-119.99, 39.005, 30.0);
        let back = plane.to_geodetic(plane.to_enu(&p));
        assert!((back.lon - p.lon).abs() < 1e-9);
        assert!((back.lat - p.lat).abs() < 1e-9);
    }

    #[test]
    fn test_anchor_validation() {
        assert!(GeoAnchor::new(0.0, 91.0).validate().is_err());
        assert!(GeoAnchor::new(f64::NAN, 0.0).validate().is_err());
        assert!(GeoAnchor::new(179.0, -89.0).validate().is_ok());
        assert!(LocalTangentPlane::centered_on(&[]).is_none());
    }
}
