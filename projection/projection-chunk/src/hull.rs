//! Planar convex hulls and point-to-hull distance.

/// Counter-clockwise convex hull of planar points.
///
/// Holds the hull vertices without repeating the first one. Degenerate
/// inputs produce degenerate hulls: a single point or a segment.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexHull {
    vertices: Vec<[f64; 2]>,
}

fn cross(o: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

fn distance_to_segment(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq > 0.0 {
        (((p[0] - a[0]) * dx + (p[1] - a[1]) * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (cx, cy) = (a[0] + t * dx, a[1] + t * dy);
    (p[0] - cx).hypot(p[1] - cy)
}

impl ConvexHull {
    /// Hull of `points` by Andrew's monotone chain.
    ///
    /// Collinear points on the boundary are dropped.
    ///
    /// # Example
    ///
    /// ```
    /// use projection_chunk::ConvexHull;
    ///
    /// let hull = ConvexHull::from_points(&[[0.0, 0.0], [2.0, 0.0], [1.0, 0.5], [2.0, 2.0], [0.0, 2.0]]);
    /// assert_eq!(hull.len(), 4);
    /// assert!(hull.distance_to([1.0, 1.0]).abs() < 1e-12);
    /// assert!((hull.distance_to([5.0, 1.0]) - 3.0).abs() < 1e-12);
    /// ```
    #[must_use]
    pub fn from_points(points: &[[f64; 2]]) -> Self {
        let mut sorted: Vec<[f64; 2]> = points.iter().copied().filter(|p| p[0].is_finite() && p[1].is_finite()).collect();
        sorted.sort_by(|a, b| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1])));
        sorted.dedup();
        if sorted.len() < 3 {
            return Self { vertices: sorted };
        }

        let mut hull: Vec<[f64; 2]> = Vec::with_capacity(sorted.len() * 2);
        for &p in &sorted {
            while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
                hull.pop();
            }
            hull.push(p);
        }
        let lower_len = hull.len() + 1;
        for &p in sorted.iter().rev().skip(1) {
            while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
                hull.pop();
            }
            hull.push(p);
        }
        hull.pop();
        Self { vertices: hull }
    }

    /// Hull vertices in counter-clockwise order.
    #[must_use]
    pub fn vertices(&self) -> &[[f64; 2]] {
        &self.vertices
    }

    /// Number of hull vertices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// True if the hull has no vertices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Whether `p` lies inside or on the hull polygon.
    #[must_use]
    pub fn contains(&self, p: [f64; 2]) -> bool {
        if self.vertices.len() < 3 {
            return false;
        }
        let n = self.vertices.len();
        (0..n).all(|i| cross(self.vertices[i], self.vertices[(i + 1) % n], p) >= 0.0)
    }

    /// Euclidean distance from `p` to the hull, zero inside.
    ///
    /// An empty hull is infinitely far from everything.
    #[must_use]
    pub fn distance_to(&self, p: [f64; 2]) -> f64 {
        match self.vertices.as_slice() {
            [] => f64::INFINITY,
            [a] => (p[0] - a[0]).hypot(p[1] - a[1]),
            [a, b] => distance_to_segment(p, *a, *b),
            vertices => {
                if self.contains(p) {
                    return 0.0;
                }
                let n = vertices.len();
                (0..n)
                    .map(|i| distance_to_segment(p, vertices[i], vertices[(i + 1) % n]))
                    .fold(f64::INFINITY, f64::min)
            }
        }
    }

    /// Axis-aligned bounds `(min, max)` of the hull, `None` if empty.
    #[must_use]
    pub fn bounds(&self) -> Option<([f64; 2], [f64; 2])> {
        let first = *self.vertices.first()?;
        Some(self.vertices.iter().fold((first, first), |(lo, hi), v| {
            ([lo[0].min(v[0]), lo[1].min(v[1])], [hi[0].max(v[0]), hi[1].max(v[1])])
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_square_hull() {
        let hull = ConvexHull::from_points(&[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.5, 0.5], [0.5, 0.0]]);
        assert_eq!(hull.len(), 4);
        assert!(hull.contains([0.5, 0.5]));
        assert!(hull.contains([1.0, 0.5]));
        assert!(!hull.contains([1.5, 0.5]));
        assert_relative_eq!(hull.distance_to([2.0, 2.0]), 2.0_f64.sqrt());
        assert_eq!(hull.bounds(), Some(([0.0, 0.0], [1.0, 1.0])));
    }

    #[test]
    fn test_counter_clockwise() {
        let hull = ConvexHull::from_points(&[[0.0, 0.0], [0.0, 3.0], [3.0, 0.0]]);
        let v = hull.vertices();
        assert!(cross(v[0], v[1], v[2]) > 0.0);
    }

    #[test]
    fn test_degenerate_hulls() {
        assert_eq!(ConvexHull::from_points(&[]).distance_to([0.0, 0.0]), f64::INFINITY);

        let point = ConvexHull::from_points(&[[1.0, 1.0], [1.0, 1.0]]);
        assert_eq!(point.len(), 1);
        assert_relative_eq!(point.distance_to([4.0, 5.0]), 5.0);

        let segment = ConvexHull::from_points(&[[0.0, 0.0], [4.0, 0.0]]);
        assert_relative_eq!(segment.distance_to([2.0, 3.0]), 3.0);
        assert_relative_eq!(segment.distance_to([-3.0, 4.0]), 5.0);

        let collinear = ConvexHull::from_points(&[[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]]);
        assert_eq!(collinear.len(), 2);
        assert_relative_eq!(collinear.distance_to([1.0, 1.0]), 0.0);
    }
}
