//! The aggregation pipeline: rasterize, project, accumulate, merge.

use std::marker::PhantomData;

use hashbrown::HashMap;
use mesh_types::{FaceIdMap, IndexedMesh};
use ml_types::LabelKind;
use projection_accumulate::{
    Accumulator, AverageMatrix, CountsHistogram, DenseAccumulator, LabelSource, ProjectorParams, Projections,
    Reduction, SparseAccumulator, TieBreak, consensus, counts_histogram,
};
use projection_chunk::{Chunk, ChunkParams, chunk_mesh};
use projection_raster::{ExecutionContext, RasterParams, Rasterizer};
use rayon::prelude::*;
use sensor_types::{Camera, CameraSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ProjectionError, ProjectionResult};

// =============================================================================
// Strategies
// =============================================================================

/// How per-image projections are accumulated.
pub trait Strategy: Send + Sync + 'static {
    /// Accumulator built by this strategy.
    type Accumulator: Accumulator + Send;

    /// Strategy name for logs.
    const NAME: &'static str;

    /// Whether projections of this reduction can be accumulated.
    fn accepts(reduction: Reduction) -> bool;

    /// Empty accumulator over `face_count` faces.
    ///
    /// # Errors
    ///
    /// Returns the accumulator's construction error.
    fn accumulator(face_count: usize, class_count: usize, context: &ExecutionContext)
    -> ProjectionResult<Self::Accumulator>;
}

/// Dense per-face sums ([`DenseAccumulator`]); accepts both reductions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dense;

/// Sparse face × class counts ([`SparseAccumulator`]); majority-class
/// projections only.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sparse;

impl Strategy for Dense {
    type Accumulator = DenseAccumulator;
    const NAME: &'static str = "dense";

    fn accepts(_: Reduction) -> bool {
        true
    }

    fn accumulator(face_count: usize, class_count: usize, context: &ExecutionContext) -> ProjectionResult<DenseAccumulator> {
        Ok(DenseAccumulator::new(face_count, class_count, context)?)
    }
}

impl Strategy for Sparse {
    type Accumulator = SparseAccumulator;
    const NAME: &'static str = "sparse";

    fn accepts(reduction: Reduction) -> bool {
        reduction == Reduction::Sparse
    }

    fn accumulator(face_count: usize, class_count: usize, context: &ExecutionContext) -> ProjectionResult<SparseAccumulator> {
        Ok(SparseAccumulator::new(face_count, class_count, context)?)
    }
}

/// Whether the scene is split into spatial chunks first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingPolicy {
    /// One pass over the whole mesh and camera set.
    #[default]
    None,
    /// Cluster cameras and accumulate each buffered region separately.
    Clustered(ChunkParams),
}

// =============================================================================
// Label sources
// =============================================================================

/// A label source readable from several threads at once.
pub trait SharedLabelSource: Sync {
    /// Label image for the camera at `camera_index`, if any.
    fn label(&self, camera_index: usize, camera: &Camera) -> Option<LabelKind>;
}

/// Label images held in memory, keyed by camera index.
///
/// # Example
///
/// ```
/// use ml_types::LabelImage;
/// use projection::LabelStore;
///
/// let mut store = LabelStore::new();
/// store.insert(0, LabelImage::filled(4, 4, 2));
/// assert_eq!(store.len(), 1);
/// assert!(store.get(1).is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct LabelStore {
    labels: HashMap<usize, LabelKind>,
}

impl LabelStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the label of one camera, replacing any previous one.
    pub fn insert(&mut self, camera_index: usize, label: impl Into<LabelKind>) {
        self.labels.insert(camera_index, label.into());
    }

    /// Label of one camera.
    #[must_use]
    pub fn get(&self, camera_index: usize) -> Option<&LabelKind> {
        self.labels.get(&camera_index)
    }

    /// Number of stored labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True if no labels are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl<L: Into<LabelKind>> FromIterator<(usize, L)> for LabelStore {
    fn from_iter<I: IntoIterator<Item = (usize, L)>>(iter: I) -> Self {
        Self {
            labels: iter.into_iter().map(|(i, l)| (i, l.into())).collect(),
        }
    }
}

impl SharedLabelSource for LabelStore {
    fn label(&self, camera_index: usize, _: &Camera) -> Option<LabelKind> {
        self.labels.get(&camera_index).cloned()
    }
}

impl LabelSource for LabelStore {
    fn label_for(&mut self, camera_index: usize, camera: &Camera) -> Option<LabelKind> {
        self.label(camera_index, camera)
    }
}

/// Translates chunk-local camera indices back to the parent set.
struct ChunkLabels<'a, L> {
    inner: &'a mut L,
    parents: &'a [usize],
}

impl<L: LabelSource> LabelSource for ChunkLabels<'_, L> {
    fn label_for(&mut self, camera_index: usize, camera: &Camera) -> Option<LabelKind> {
        let parent = *self.parents.get(camera_index)?;
        self.inner.label_for(parent, camera)
    }
}

/// Shared-reference counterpart of [`ChunkLabels`].
struct SharedChunkLabels<'a, L: ?Sized> {
    inner: &'a L,
    parents: &'a [usize],
}

impl<L: SharedLabelSource + ?Sized> LabelSource for SharedChunkLabels<'_, L> {
    fn label_for(&mut self, camera_index: usize, camera: &Camera) -> Option<LabelKind> {
        let parent = *self.parents.get(camera_index)?;
        self.inner.label(parent, camera)
    }
}

// =============================================================================
// Aggregator
// =============================================================================

/// Everything one aggregation run produces.
#[derive(Debug, Clone)]
pub struct AggregationOutput<A> {
    /// Global accumulator, ready to snapshot or merge further.
    pub accumulator: A,
    /// Per-face averages; NaN or empty rows for unobserved faces.
    pub averages: AverageMatrix,
    /// Observation count per face.
    pub counts: Vec<u32>,
    /// Consensus class per face, `None` where unknown.
    pub classes: Vec<Option<usize>>,
    /// Coverage summary of `counts`.
    pub histogram: CountsHistogram,
    /// Chunks accumulated; 1 without chunking.
    pub chunks: usize,
}

/// Multi-view aggregator over an injected strategy and chunking policy.
///
/// # Example
///
/// ```
/// use mesh_types::planar_grid;
/// use projection::{Aggregator, Dense, LabelStore};
/// use projection_accumulate::ProjectorParams;
/// use projection_raster::{ExecutionContext, RasterParams};
/// use sensor_types::CameraSet;
///
/// let aggregator = Aggregator::<Dense>::new(
///     ExecutionContext::cpu(),
///     RasterParams::default(),
///     ProjectorParams::for_classes(3),
/// )
/// .unwrap();
///
/// // Without cameras every face stays unknown.
/// let mesh = planar_grid(2, 1, 1.0);
/// let out = aggregator.aggregate(&mesh, &CameraSet::default(), LabelStore::new()).unwrap();
/// assert_eq!(out.counts, vec![0; 4]);
/// assert!(out.classes.iter().all(Option::is_none));
/// ```
#[derive(Debug, Clone)]
pub struct Aggregator<S: Strategy> {
    rasterizer: Rasterizer,
    projector: ProjectorParams,
    class_count: usize,
    chunking: ChunkingPolicy,
    tie_break: TieBreak,
    parallel_chunks: bool,
    strategy: PhantomData<S>,
}

impl<S: Strategy> Aggregator<S> {
    /// Build an aggregator without chunking.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::InvalidConfig`] if `projector` has no class
    /// or channel count, or uses a reduction the strategy cannot
    /// accumulate, plus the rasterizer's construction errors.
    pub fn new(context: ExecutionContext, raster: RasterParams, projector: ProjectorParams) -> ProjectionResult<Self> {
        projector.validate()?;
        let class_count = projector.num_classes.ok_or_else(|| {
            ProjectionError::invalid_config("num_classes must give the class or feature channel count")
        })?;
        if !S::accepts(projector.reduction) {
            return Err(ProjectionError::invalid_config(format!(
                "{} strategy cannot accumulate {:?} projections",
                S::NAME,
                projector.reduction
            )));
        }
        Ok(Self {
            rasterizer: Rasterizer::new(context, raster)?,
            projector,
            class_count,
            chunking: ChunkingPolicy::None,
            tie_break: TieBreak::FirstIndex,
            parallel_chunks: false,
            strategy: PhantomData,
        })
    }

    /// Set the chunking policy.
    ///
    /// # Errors
    ///
    /// Returns the chunk parameter validation error.
    pub fn with_chunking(mut self, chunking: ChunkingPolicy) -> ProjectionResult<Self> {
        if let ChunkingPolicy::Clustered(params) = &chunking {
            params.validate()?;
        }
        self.chunking = chunking;
        Ok(self)
    }

    /// Set the consensus tie-break.
    #[must_use]
    pub const fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Accumulate chunks on the rayon pool in [`Aggregator::aggregate_shared`].
    #[must_use]
    pub const fn with_parallel_chunks(mut self, parallel: bool) -> Self {
        self.parallel_chunks = parallel;
        self
    }

    /// The rasterizer in use.
    #[must_use]
    pub const fn rasterizer(&self) -> &Rasterizer {
        &self.rasterizer
    }

    /// The chunking policy in use.
    #[must_use]
    pub const fn chunking(&self) -> &ChunkingPolicy {
        &self.chunking
    }

    fn context(&self) -> &ExecutionContext {
        self.rasterizer.context()
    }

    fn accumulate_region(
        &self,
        mesh: &IndexedMesh,
        cameras: &CameraSet,
        labels: impl LabelSource,
    ) -> ProjectionResult<S::Accumulator> {
        let mut acc = S::accumulator(mesh.face_count(), self.class_count, self.context())?;
        let views = Projections::new(&self.rasterizer, mesh, cameras, labels, self.projector.clone())?;
        let images = acc.add_all(views)?;
        debug!(images, faces = mesh.face_count(), "accumulated region");
        Ok(acc)
    }

    /// Chunks of the scene, extracted lazily; `None` without chunking.
    fn chunks<'a>(
        &self,
        mesh: &'a IndexedMesh,
        cameras: &'a CameraSet,
    ) -> ProjectionResult<Option<impl Iterator<Item = ProjectionResult<Chunk>> + 'a>> {
        match &self.chunking {
            ChunkingPolicy::None => Ok(None),
            ChunkingPolicy::Clustered(params) => {
                // Nothing to cluster; the whole mesh stays unobserved.
                let iter = if cameras.is_empty() {
                    None
                } else {
                    Some(chunk_mesh(mesh, cameras, params)?)
                };
                Ok(Some(iter.into_iter().flatten().map(|c| c.map_err(ProjectionError::from))))
            }
        }
    }

    /// Merge chunk-local accumulators into a global one as they arrive.
    fn merge_chunks(
        &self,
        face_count: usize,
        locals: impl IntoIterator<Item = ProjectionResult<(S::Accumulator, FaceIdMap)>>,
    ) -> ProjectionResult<(S::Accumulator, usize)> {
        let mut global = S::accumulator(face_count, self.class_count, self.context())?;
        let mut merged = 0;
        for local in locals {
            let (local, map) = local?;
            global.merge(&local, &map)?;
            merged += 1;
            debug!(merged, faces = map.len(), "merged chunk");
        }
        Ok((global, merged))
    }

    /// Run the pipeline with any label source.
    ///
    /// Chunks are extracted, accumulated and merged one at a time in
    /// cluster order, so at most one chunk is held in memory.
    ///
    /// # Errors
    ///
    /// Returns the first mesh, chunking, rasterization or accumulation error.
    pub fn aggregate<L: LabelSource>(
        &self,
        mesh: &IndexedMesh,
        cameras: &CameraSet,
        mut labels: L,
    ) -> ProjectionResult<AggregationOutput<S::Accumulator>> {
        mesh.validate()?;
        let (acc, chunks) = match self.chunks(mesh, cameras)? {
            None => (self.accumulate_region(mesh, cameras, labels)?, 1),
            Some(chunks) => {
                let locals = chunks.map(|chunk| -> ProjectionResult<(S::Accumulator, FaceIdMap)> {
                    let chunk = chunk?;
                    let source = ChunkLabels {
                        inner: &mut labels,
                        parents: &chunk.camera_indices,
                    };
                    let acc = self.accumulate_region(&chunk.mesh, &chunk.cameras, source)?;
                    Ok((acc, chunk.face_ids))
                });
                self.merge_chunks(mesh.face_count(), locals)?
            }
        };
        Ok(self.finish(acc, chunks))
    }

    /// Run the pipeline with a label source shared across threads.
    ///
    /// Without parallel chunks this streams chunks like
    /// [`Aggregator::aggregate`]. With parallel chunks enabled, all chunks
    /// are extracted first, their accumulators are built on the rayon pool
    /// and merged afterward in cluster order, so the result does not
    /// depend on scheduling.
    ///
    /// # Errors
    ///
    /// Same as [`Aggregator::aggregate`].
    pub fn aggregate_shared<L: SharedLabelSource + ?Sized>(
        &self,
        mesh: &IndexedMesh,
        cameras: &CameraSet,
        labels: &L,
    ) -> ProjectionResult<AggregationOutput<S::Accumulator>> {
        mesh.validate()?;
        let source = |chunk: Chunk| -> ProjectionResult<(S::Accumulator, FaceIdMap)> {
            let labels = SharedChunkLabels {
                inner: labels,
                parents: &chunk.camera_indices,
            };
            let acc = self.accumulate_region(&chunk.mesh, &chunk.cameras, labels)?;
            Ok((acc, chunk.face_ids))
        };

        let (acc, chunks) = match self.chunks(mesh, cameras)? {
            None => {
                let all: Vec<usize> = (0..cameras.len()).collect();
                let labels = SharedChunkLabels {
                    inner: labels,
                    parents: &all,
                };
                (self.accumulate_region(mesh, cameras, labels)?, 1)
            }
            Some(chunks) if self.parallel_chunks => {
                let chunks = chunks.collect::<ProjectionResult<Vec<_>>>()?;
                let locals = chunks.into_par_iter().map(&source).collect::<Vec<_>>();
                self.merge_chunks(mesh.face_count(), locals)?
            }
            Some(chunks) => self.merge_chunks(mesh.face_count(), chunks.map(|chunk| chunk.and_then(&source)))?,
        };
        Ok(self.finish(acc, chunks))
    }

    fn finish(&self, accumulator: S::Accumulator, chunks: usize) -> AggregationOutput<S::Accumulator> {
        let averages = accumulator.normalized();
        let counts = accumulator.counts();
        let classes = consensus(&averages, self.tie_break, self.context());
        let histogram = counts_histogram(&counts);
        info!(
            strategy = S::NAME,
            chunks,
            faces = histogram.total(),
            unobserved = histogram.unobserved,
            single = histogram.single,
            multiple = histogram.multiple,
            max_count = histogram.max,
            "aggregation complete"
        );
        AggregationOutput {
            accumulator,
            averages,
            counts,
            classes,
            histogram,
            chunks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml_types::LabelImage;

    #[test]
    fn test_sparse_strategy_needs_sparse_reduction() {
        let err = Aggregator::<Sparse>::new(
            ExecutionContext::cpu(),
            RasterParams::default(),
            ProjectorParams::for_classes(3),
        );
        assert!(matches!(err, Err(ProjectionError::InvalidConfig(_))));

        let ok = Aggregator::<Sparse>::new(
            ExecutionContext::cpu(),
            RasterParams::default(),
            ProjectorParams::for_classes(3).reduction(Reduction::Sparse),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_class_count_required() {
        let err = Aggregator::<Dense>::new(ExecutionContext::cpu(), RasterParams::default(), ProjectorParams::default());
        assert!(matches!(err, Err(ProjectionError::InvalidConfig(_))));
    }

    #[test]
    fn test_invalid_chunking_rejected() {
        let agg = Aggregator::<Dense>::new(
            ExecutionContext::cpu(),
            RasterParams::default(),
            ProjectorParams::for_classes(2),
        )
        .unwrap();
        let err = agg.with_chunking(ChunkingPolicy::Clustered(ChunkParams::default().num_clusters(0)));
        assert!(matches!(err, Err(ProjectionError::Chunk(_))));
    }

    #[test]
    fn test_label_store_sources() {
        let store: LabelStore = [(1, LabelImage::filled(2, 2, 5))].into_iter().collect();
        let camera = Camera::new(
            sensor_types::CameraIntrinsics::ideal(10.0, 2, 2),
            nalgebra::Matrix4::identity(),
            sensor_types::GeoAnchor::new(0.0, 0.0),
            "a",
        )
        .unwrap();
        assert!(store.label(0, &camera).is_none());
        assert!(store.label(1, &camera).is_some());

        let parents = [1];
        let mut remapped = SharedChunkLabels {
            inner: &store,
            parents: &parents,
        };
        assert!(remapped.label_for(0, &camera).is_some());
        assert!(remapped.label_for(1, &camera).is_none());
    }
}
