//! Seeded k-means over planar points.
//!
//! Centers are initialized with k-means++ from a seeded `StdRng`, then
//! refined with Lloyd iterations until assignments stop changing or the
//! iteration cap is reached.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Result of clustering.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeans {
    /// Final cluster centers. Surplus clusters (when `k > n`) keep a
    /// duplicate of an existing point and receive no members.
    pub centers: Vec<[f64; 2]>,
    /// Cluster index per input point.
    pub assignment: Vec<usize>,
    /// Lloyd iterations performed.
    pub iterations: usize,
}

impl KMeans {
    /// Member indices of one cluster.
    #[must_use]
    pub fn members(&self, cluster: usize) -> Vec<usize> {
        self.assignment
            .iter()
            .enumerate()
            .filter_map(|(i, &c)| (c == cluster).then_some(i))
            .collect()
    }

    /// Number of clusters.
    #[must_use]
    pub fn cluster_count(&self) -> usize {
        self.centers.len()
    }
}

fn distance_sq(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

/// Nearest center, lowest index on ties.
fn nearest(point: [f64; 2], centers: &[[f64; 2]]) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (i, &c) in centers.iter().enumerate() {
        let d = distance_sq(point, c);
        if d < best_d {
            best = i;
            best_d = d;
        }
    }
    best
}

/// k-means++ seeding. Returns at most `min(k, n)` distinct-draw centers.
fn seed_centers(points: &[[f64; 2]], k: usize, rng: &mut StdRng) -> Vec<[f64; 2]> {
    let mut centers = Vec::with_capacity(k);
    centers.push(points[rng.gen_range(0..points.len())]);
    let mut d2: Vec<f64> = points.iter().map(|&p| distance_sq(p, centers[0])).collect();

    while centers.len() < k.min(points.len()) {
        let total: f64 = d2.iter().sum();
        if total <= 0.0 {
            // All remaining points coincide with a center.
            break;
        }
        let mut target = rng.gen_range(0.0..total);
        let mut chosen = points.len() - 1;
        for (i, &w) in d2.iter().enumerate() {
            if target < w {
                chosen = i;
                break;
            }
            target -= w;
        }
        let center = points[chosen];
        centers.push(center);
        for (d, &p) in d2.iter_mut().zip(points) {
            *d = d.min(distance_sq(p, center));
        }
    }
    centers
}

/// Cluster `points` into `k` groups.
///
/// The result always carries exactly `k` centers. When there are fewer
/// distinct points than `k`, the extra centers duplicate the first one and,
/// since ties go to the lowest index, stay empty. Clusters that lose all
/// members during refinement keep their previous center.
///
/// Returns `None` for an empty point set or `k == 0`.
///
/// # Example
///
/// ```
/// use projection_chunk::kmeans;
///
/// let points = [[0.0, 0.0], [0.1, 0.0], [10.0, 0.0], [10.1, 0.0]];
/// let result = kmeans(&points, 2, 7, 50).unwrap();
/// assert_eq!(result.assignment[0], result.assignment[1]);
/// assert_eq!(result.assignment[2], result.assignment[3]);
/// assert_ne!(result.assignment[0], result.assignment[2]);
/// ```
#[must_use]
pub fn kmeans(points: &[[f64; 2]], k: usize, seed: u64, max_iterations: usize) -> Option<KMeans> {
    if points.is_empty() || k == 0 {
        return None;
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centers = seed_centers(points, k, &mut rng);
    let first = centers[0];
    centers.resize(k, first);

    let mut assignment: Vec<usize> = points.iter().map(|&p| nearest(p, &centers)).collect();
    let mut iterations = 0;

    while iterations < max_iterations {
        iterations += 1;

        let mut sums = vec![[0.0_f64; 2]; k];
        let mut sizes = vec![0_usize; k];
        for (&p, &c) in points.iter().zip(&assignment) {
            sums[c][0] += p[0];
            sums[c][1] += p[1];
            sizes[c] += 1;
        }
        for ((center, sum), &size) in centers.iter_mut().zip(&sums).zip(&sizes) {
            if size > 0 {
                #[allow(clippy::cast_precision_loss)]
                let n = size as f64;
                *center = [sum[0] / n, sum[1] / n];
            }
        }

        let next: Vec<usize> = points.iter().map(|&p| nearest(p, &centers)).collect();
        if next == assignment {
            break;
        }
        assignment = next;
    }

    debug!(points = points.len(), k, iterations, "k-means converged");
    Some(KMeans {
        centers,
        assignment,
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> Vec<[f64; 2]> {
        let mut points = Vec::new();
        for (cx, cy) in [(0.0, 0.0), (100.0, 0.0), (50.0, 80.0)] {
            for i in 0..5 {
                let o = f64::from(i) * 0.5;
                points.push([cx + o, cy - o]);
            }
        }
        points
    }

    #[test]
    fn test_separates_blobs() {
        let result = kmeans(&blobs(), 3, 1, 100).unwrap();
        for blob in 0..3 {
            let first = result.assignment[blob * 5];
            assert!(result.assignment[blob * 5..blob * 5 + 5].iter().all(|&c| c == first));
        }
        let mut labels: Vec<usize> = (0..3).map(|b| result.assignment[b * 5]).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), 3);
    }

    #[test]
    fn test_deterministic_per_seed() {
        let a = kmeans(&blobs(), 4, 42, 100).unwrap();
        let b = kmeans(&blobs(), 4, 42, 100).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_surplus_clusters_empty() {
        let points = [[0.0, 0.0], [5.0, 5.0]];
        let result = kmeans(&points, 5, 0, 10).unwrap();
        assert_eq!(result.cluster_count(), 5);
        let used: usize = (0..5).filter(|&c| !result.members(c).is_empty()).count();
        assert_eq!(used, 2);
    }

    #[test]
    fn test_coincident_points() {
        let points = [[1.0, 1.0]; 4];
        let result = kmeans(&points, 3, 9, 10).unwrap();
        assert!(result.assignment.iter().all(|&c| c == 0));
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(kmeans(&[], 2, 0, 10).is_none());
        assert!(kmeans(&[[0.0, 0.0]], 0, 0, 10).is_none());
    }
}
