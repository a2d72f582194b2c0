//! Run configuration and context.
//!
//! [`BipartConfig`] is the serializable description of a bipartitioning run;
//! [`BipartContext`] is the mutable state threaded through the strategy
//! interpreter (random generator, recursion cap, method table).
//!
//! All randomized decisions draw from a `SmallRng` seeded from configuration,
//! so runs are reproducible.

use crate::bgraph::bipart::{default_tab, BgraphStratTab, DEFAULT_STRATEGY};
use crate::Gnum;
use ahash::AHasher;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use std::hash::Hasher;
use std::sync::Arc;

/// Default multilevel recursion cap.
pub const LEVLMAX_DEFAULT: Gnum = 64;

/// Serializable settings of a sequential bipartitioning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BipartConfig {
    /// Strategy text, parsed against the default method table.
    pub strategy: String,
    pub rng_seed: u64,
    /// Coarsening is refused once this many levels are stacked.
    pub levlmax: Gnum,
    /// Load imbalance tolerance of the active graph.
    pub bbalval: f64,
}

impl Default for BipartConfig {
    fn default() -> Self {
        Self {
            strategy: DEFAULT_STRATEGY.to_string(),
            rng_seed: 42,
            levlmax: LEVLMAX_DEFAULT,
            bbalval: crate::bgraph::BGRAPH_BAL_DEFAULT,
        }
    }
}

/// Mutable state shared by all strategy nodes of one run.
#[derive(Debug, Clone)]
pub struct BipartContext {
    pub rng: SmallRng,
    pub levlmax: Gnum,
    tab: Arc<BgraphStratTab>,
}

impl BipartContext {
    /// Context over the default method table.
    pub fn new(seed: u64) -> Self {
        Self::with_tab(seed, default_tab())
    }

    /// Context over a caller-built method table.
    pub fn with_tab(seed: u64, tab: Arc<BgraphStratTab>) -> Self {
        BipartContext {
            rng: SmallRng::seed_from_u64(seed),
            levlmax: LEVLMAX_DEFAULT,
            tab,
        }
    }

    pub fn from_config(cfg: &BipartConfig) -> Self {
        let mut ctx = Self::new(cfg.rng_seed);
        ctx.levlmax = cfg.levlmax;
        ctx
    }

    pub fn tab(&self) -> &Arc<BgraphStratTab> {
        &self.tab
    }
}

/// Knobs of distributed coarsening.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DgraphCoarsenParam {
    /// Refuse coarsening when the global vertex count is at most this.
    pub coarnbr: Gnum,
    /// Refuse a coarse graph keeping more than this fraction of vertices.
    pub coarrat: f64,
    /// Maximum number of matching rounds.
    pub passnbr: usize,
    /// Probability that an unmatched vertex takes part in a given round.
    pub probval: f64,
    pub rng_seed: u64,
    /// Complete receives in fixed neighbor order instead of arrival order.
    pub deterministic: bool,
}

impl Default for DgraphCoarsenParam {
    fn default() -> Self {
        Self {
            coarnbr: 100,
            coarrat: 0.8,
            passnbr: 5,
            probval: 1.0,
            rng_seed: 42,
            deterministic: cfg!(feature = "deterministic"),
        }
    }
}

/// Per-rank generator derived from a global seed.
pub fn rank_rng(global_seed: u64, rank: usize) -> SmallRng {
    let mut hasher = AHasher::default();
    hasher.write_u64(global_seed ^ rank as u64);
    SmallRng::seed_from_u64(hasher.finish())
}
