//! Execution context for one aggregation run.
//!
//! The context names the compute backend, whether per-batch work may fan
//! out over the rayon pool, and the seed for any randomized step. It is
//! created once by the caller and passed to every component that needs it;
//! nothing here is global.
//!
//! # Example
//!
//! ```
//! use projection_raster::{BackendType, ExecutionContext};
//!
//! let ctx = ExecutionContext::cpu().with_seed(7);
//! assert_eq!(ctx.backend(), BackendType::Cpu);
//! assert!(ctx.ensure_available().is_ok());
//!
//! let gpu = ExecutionContext::new(BackendType::Gpu);
//! assert!(gpu.ensure_available().is_err());
//! ```

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RasterError, RasterResult};

/// Compute backend for rasterization and accumulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BackendType {
    /// Portable CPU z-buffer backend.
    ///
    /// Always available.
    #[default]
    Cpu,

    /// Accelerator backend.
    ///
    /// Not compiled into this build; requesting it fails fast.
    Gpu,
}

impl BackendType {
    /// Returns `true` if this is the CPU backend.
    #[must_use]
    pub const fn is_cpu(&self) -> bool {
        matches!(self, Self::Cpu)
    }

    /// Returns the backend name as a string.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Gpu => "gpu",
        }
    }
}

/// Explicit execution state scoped to one aggregation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    backend: BackendType,
    parallel: bool,
    seed: Option<u64>,
}

impl ExecutionContext {
    /// Context for `backend`, parallel, unseeded.
    #[must_use]
    pub const fn new(backend: BackendType) -> Self {
        Self {
            backend,
            parallel: true,
            seed: None,
        }
    }

    /// CPU context.
    #[must_use]
    pub const fn cpu() -> Self {
        Self::new(BackendType::Cpu)
    }

    /// Set the seed used by the jitter tie-break.
    ///
    /// Chunk clustering is seeded on its own, by `ChunkParams::seed`.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Allow or forbid rayon fan-out inside a batch.
    #[must_use]
    pub const fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Selected backend.
    #[must_use]
    pub const fn backend(&self) -> BackendType {
        self.backend
    }

    /// Whether batch work may run on the rayon pool.
    #[must_use]
    pub const fn parallel(&self) -> bool {
        self.parallel
    }

    /// Configured seed.
    #[must_use]
    pub const fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Check that the backend can run.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::BackendUnavailable`] for any backend other
    /// than [`BackendType::Cpu`].
    pub fn ensure_available(&self) -> RasterResult<()> {
        match self.backend {
            BackendType::Cpu => Ok(()),
            BackendType::Gpu => Err(RasterError::BackendUnavailable(self.backend)),
        }
    }

    /// A fresh RNG: seeded from the context if a seed is set, otherwise from entropy.
    ///
    /// `stream` decorrelates independent consumers sharing one seed.
    #[must_use]
    pub fn rng(&self, stream: u64) -> StdRng {
        match self.seed {
            Some(seed) => {
                debug!(seed, stream, "seeded rng");
                StdRng::seed_from_u64(seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15))
            }
            None => StdRng::from_entropy(),
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::cpu()
    }
}
