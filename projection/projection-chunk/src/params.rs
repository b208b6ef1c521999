//! Parameters for spatial chunking.

use serde::{Deserialize, Serialize};

use crate::error::{ChunkError, ChunkResult};

/// Coordinate frame of mesh vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshFrame {
    /// `x` east and `y` north in meters, in the tangent plane centered on
    /// the camera set's mean anchor.
    #[default]
    Planar,
    /// `x` longitude and `y` latitude in degrees; projected through the
    /// same tangent plane as the cameras.
    Geographic,
}

/// Parameters for chunking.
///
/// # Example
///
/// ```
/// use projection_chunk::{ChunkParams, MeshFrame};
///
/// let params = ChunkParams::default().num_clusters(4).buffer_meters(25.0).seed(3);
/// assert_eq!(params.num_clusters, 4);
/// assert_eq!(params.mesh_frame, MeshFrame::Planar);
/// assert!(params.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkParams {
    /// Number of k-means clusters.
    pub num_clusters: usize,

    /// Distance around each cluster's camera hull that is included, in meters.
    pub buffer_meters: f64,

    /// Seed for k-means++ initialization.
    pub seed: u64,

    /// Upper bound on Lloyd iterations.
    pub max_iterations: usize,

    /// Frame of the mesh vertices.
    pub mesh_frame: MeshFrame,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            num_clusters: 8,
            buffer_meters: 50.0,
            seed: 0,
            max_iterations: 100,
            mesh_frame: MeshFrame::Planar,
        }
    }
}

impl ChunkParams {
    /// Set the cluster count.
    #[must_use]
    pub const fn num_clusters(mut self, k: usize) -> Self {
        self.num_clusters = k;
        self
    }

    /// Set the hull buffer distance.
    #[must_use]
    pub const fn buffer_meters(mut self, meters: f64) -> Self {
        self.buffer_meters = meters;
        self
    }

    /// Set the k-means seed.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the iteration cap.
    #[must_use]
    pub const fn max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Set the mesh frame.
    #[must_use]
    pub const fn mesh_frame(mut self, frame: MeshFrame) -> Self {
        self.mesh_frame = frame;
        self
    }

    /// Check parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkError::ZeroClusters`], [`ChunkError::InvalidBuffer`],
    /// or [`ChunkError::InvalidParams`] for a zero iteration cap.
    pub fn validate(&self) -> ChunkResult<()> {
        if self.num_clusters == 0 {
            return Err(ChunkError::ZeroClusters);
        }
        if !(self.buffer_meters.is_finite() && self.buffer_meters >= 0.0) {
            return Err(ChunkError::InvalidBuffer(self.buffer_meters));
        }
        if self.max_iterations == 0 {
            return Err(ChunkError::invalid_params("max_iterations must be at least 1"));
        }
        Ok(())
    }
}
