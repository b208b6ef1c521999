//! Run configuration.

use std::path::Path;

use projection_accumulate::{ProjectorParams, Reduction, TieBreak};
use projection_raster::{BackendType, ExecutionContext, RasterParams};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate::{Aggregator, ChunkingPolicy, Strategy};
use crate::error::{ProjectionError, ProjectionResult};
use crate::filter::GroundFilter;

/// Accumulation strategy named in a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// [`crate::Dense`].
    #[default]
    Dense,
    /// [`crate::Sparse`].
    Sparse,
}

impl StrategyKind {
    /// Strategy name, as in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dense => "dense",
            Self::Sparse => "sparse",
        }
    }
}

/// Configuration for an aggregation run.
///
/// Every field has a default, so a configuration file only needs to name
/// what it changes.
///
/// # Example
///
/// ```
/// use projection::{AggregationConfig, StrategyKind};
///
/// let config = AggregationConfig::from_json_str(
///     r#"{ "strategy": "sparse", "projector": { "reduction": "sparse", "num_classes": 40 }, "seed": 7 }"#,
/// )
/// .unwrap();
/// assert_eq!(config.strategy, StrategyKind::Sparse);
/// assert_eq!(config.raster.batch_size, 8);
///
/// let parts = config.into_parts();
/// assert_eq!(parts.context.seed(), Some(7));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Compute backend.
    pub backend: BackendType,

    /// Rasterize cameras of a batch in parallel.
    pub parallel: bool,

    /// Random seed for jitter tie-breaks.
    pub seed: Option<u64>,

    /// Accumulation strategy.
    pub strategy: StrategyKind,

    /// Rasterization parameters.
    pub raster: RasterParams,

    /// Per-image projection parameters.
    pub projector: ProjectorParams,

    /// Spatial chunking.
    pub chunking: ChunkingPolicy,

    /// Accumulate chunks in parallel when the label source is shared.
    pub parallel_chunks: bool,

    /// Consensus tie-break.
    pub tie_break: TieBreak,

    /// Optional ground post-filter.
    pub ground: Option<GroundFilter>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            backend: BackendType::Cpu,
            parallel: true,
            seed: None,
            strategy: StrategyKind::Dense,
            raster: RasterParams::default(),
            projector: ProjectorParams::default(),
            chunking: ChunkingPolicy::None,
            parallel_chunks: false,
            tie_break: TieBreak::FirstIndex,
            ground: None,
        }
    }
}

/// A validated configuration split into component parameters.
#[derive(Debug, Clone)]
pub struct AggregationParts {
    /// Execution context carrying backend, parallelism and seed.
    pub context: ExecutionContext,
    /// Accumulation strategy.
    pub strategy: StrategyKind,
    /// Rasterization parameters.
    pub raster: RasterParams,
    /// Projection parameters.
    pub projector: ProjectorParams,
    /// Chunking policy.
    pub chunking: ChunkingPolicy,
    /// Parallel chunk accumulation.
    pub parallel_chunks: bool,
    /// Consensus tie-break.
    pub tie_break: TieBreak,
    /// Ground post-filter.
    pub ground: Option<GroundFilter>,
}

impl AggregationConfig {
    /// Set the seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the strategy.
    #[must_use]
    pub const fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the chunking policy.
    #[must_use]
    pub fn with_chunking(mut self, chunking: ChunkingPolicy) -> Self {
        self.chunking = chunking;
        self
    }

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first invalid component: raster, projector or chunk
    /// parameters, a strategy that cannot accumulate the configured
    /// reduction, a missing class count, a bad jitter magnitude or a
    /// non-finite ground threshold.
    pub fn validate(&self) -> ProjectionResult<()> {
        self.raster.validate()?;
        self.projector.validate()?;
        if self.projector.num_classes.is_none() {
            return Err(ProjectionError::invalid_config("projector.num_classes is required"));
        }
        if self.strategy == StrategyKind::Sparse && self.projector.reduction != Reduction::Sparse {
            return Err(ProjectionError::invalid_config(
                "sparse strategy needs projector.reduction = sparse",
            ));
        }
        if let ChunkingPolicy::Clustered(params) = &self.chunking {
            params.validate()?;
        }
        if let TieBreak::Jitter { magnitude } = self.tie_break {
            if !(magnitude.is_finite() && magnitude >= 0.0) {
                return Err(ProjectionError::invalid_config(format!(
                    "jitter magnitude {magnitude} must be finite and non-negative"
                )));
            }
        }
        if let Some(ground) = &self.ground {
            if !ground.height_threshold.is_finite() {
                return Err(ProjectionError::invalid_config("ground height threshold must be finite"));
            }
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Parse`] for malformed JSON and the
    /// [`AggregationConfig::validate`] errors.
    pub fn from_json_str(json: &str) -> ProjectionResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Parse`] if serialization fails.
    pub fn to_json_string(&self) -> ProjectionResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Io`] if the file cannot be read, plus the
    /// [`AggregationConfig::from_json_str`] errors.
    pub fn from_file(path: impl AsRef<Path>) -> ProjectionResult<Self> {
        let path = path.as_ref();
        let config = Self::from_json_str(&std::fs::read_to_string(path)?)?;
        info!(path = %path.display(), strategy = config.strategy.name(), "loaded aggregation config");
        Ok(config)
    }

    /// Split into component parameters.
    #[must_use]
    pub fn into_parts(self) -> AggregationParts {
        let mut context = ExecutionContext::new(self.backend).with_parallel(self.parallel);
        if let Some(seed) = self.seed {
            context = context.with_seed(seed);
        }
        AggregationParts {
            context,
            strategy: self.strategy,
            raster: self.raster,
            projector: self.projector,
            chunking: self.chunking,
            parallel_chunks: self.parallel_chunks,
            tie_break: self.tie_break,
            ground: self.ground,
        }
    }
}

impl AggregationParts {
    /// Build the aggregator for strategy `S`.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::InvalidConfig`] if `S` differs from the
    /// configured strategy, plus the [`Aggregator::new`] errors.
    pub fn aggregator<S: Strategy>(&self) -> ProjectionResult<Aggregator<S>> {
        if S::NAME != self.strategy.name() {
            return Err(ProjectionError::invalid_config(format!(
                "configured for {} accumulation, built as {}",
                self.strategy.name(),
                S::NAME
            )));
        }
        Ok(
            Aggregator::<S>::new(self.context.clone(), self.raster.clone(), self.projector.clone())?
                .with_chunking(self.chunking.clone())?
                .with_tie_break(self.tie_break)
                .with_parallel_chunks(self.parallel_chunks),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{Dense, Sparse};
    use projection_chunk::ChunkParams;

    fn valid() -> AggregationConfig {
        AggregationConfig {
            projector: ProjectorParams::for_classes(4),
            ..AggregationConfig::default()
        }
    }

    #[test]
    fn test_default_needs_classes() {
        assert!(AggregationConfig::default().validate().is_err());
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_json_round_trip() {
        let config = valid()
            .with_seed(3)
            .with_chunking(ChunkingPolicy::Clustered(ChunkParams::default().num_clusters(5)));
        let json = config.to_json_string().unwrap();
        assert_eq!(AggregationConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let config = valid().with_seed(11);
        std::fs::write(&path, config.to_json_string().unwrap()).unwrap();
        assert_eq!(AggregationConfig::from_file(&path).unwrap(), config);
        assert!(matches!(
            AggregationConfig::from_file(dir.path().join("missing.json")),
            Err(ProjectionError::Io(_))
        ));
    }

    #[test]
    fn test_invalid_configs() {
        assert!(matches!(
            AggregationConfig::from_json_str("{ nope"),
            Err(ProjectionError::Parse(_))
        ));

        let sparse_dense = valid().with_strategy(StrategyKind::Sparse);
        assert!(matches!(sparse_dense.validate(), Err(ProjectionError::InvalidConfig(_))));

        let zero_k = valid().with_chunking(ChunkingPolicy::Clustered(ChunkParams::default().num_clusters(0)));
        assert!(matches!(zero_k.validate(), Err(ProjectionError::Chunk(_))));

        let mut jitter = valid();
        jitter.tie_break = TieBreak::Jitter { magnitude: -1.0 };
        assert!(jitter.validate().is_err());

        let mut scale = valid();
        scale.raster.scale = 0.0;
        assert!(matches!(scale.validate(), Err(ProjectionError::Raster(_))));
    }

    #[test]
    fn test_parts_build_matching_strategy() {
        let parts = valid().with_seed(5).into_parts();
        assert_eq!(parts.context.seed(), Some(5));
        assert!(parts.aggregator::<Dense>().is_ok());
        assert!(matches!(
            parts.aggregator::<Sparse>(),
            Err(ProjectionError::InvalidConfig(_))
        ));
    }
}
