//! Bipartitioning methods and their parameter records.
//!
//! Every method has the [`BgraphMethodFn`] signature: it receives the active
//! graph, the parameter record parsed from the strategy and the run context,
//! and leaves a consistent bipartition on return, whether it succeeds or not.

pub mod bd;
pub mod df;
pub mod ex;
pub mod fm;
pub mod gg;
pub mod gp;
pub mod ml;
pub mod st;
pub mod zr;

use crate::bgraph::Bgraph;
use crate::bipart_error::BipartError;
use crate::config::BipartContext;
use crate::graph::coarsen::MatchType;
use crate::strategy::{Strat, StratTab};
use crate::Gnum;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Strategy over bipartitioning methods.
pub type BgraphStrat = Strat<BgraphMethodParam>;

/// Entry point of a bipartitioning method.
pub type BgraphMethodFn =
    fn(&mut Bgraph<'_>, &BgraphMethodParam, &mut BipartContext) -> Result<(), BipartError>;

/// Strategy table of bipartitioning methods.
pub type BgraphStratTab = StratTab<BgraphMethodParam, BgraphMethodFn>;

/// Parameter record of a strategy method node.
#[derive(Debug, Clone)]
pub enum BgraphMethodParam {
    Band(BandParam),
    Diffusion(DiffusionParam),
    Exact,
    Fm(FmParam),
    GreedyGrow(GreedyGrowParam),
    Gps(GpsParam),
    Ml(MlParam),
    Zero,
}

impl BgraphMethodParam {
    pub(crate) fn mismatch(method: &'static str) -> BipartError {
        BipartError::InvalidParameter(format!("method `{method}` received a foreign parameter record"))
    }
}

/// Band method: refine only the vertices close to the frontier.
#[derive(Debug, Clone)]
pub struct BandParam {
    /// Band width, in edges from the frontier.
    pub distmax: Gnum,
    /// Strategy applied to the band graph.
    pub bnd: Arc<BgraphStrat>,
    /// Strategy applied to the whole graph when no band can be built.
    pub org: Arc<BgraphStrat>,
}

impl Default for BandParam {
    fn default() -> Self {
        BandParam {
            distmax: 3,
            bnd: Strat::empty(),
            org: Strat::empty(),
        }
    }
}

/// Diffusion method.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffusionParam {
    pub passnbr: Gnum,
    /// Weight of neighbor averages.
    pub cdifval: f64,
    /// Weight of a vertex's own previous value.
    pub cremval: f64,
}

impl Default for DiffusionParam {
    fn default() -> Self {
        DiffusionParam {
            passnbr: 40,
            cdifval: 1.0,
            cremval: 1.0,
        }
    }
}

/// Fiduccia–Mattheyses refinement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FmParam {
    /// Moves allowed past the last improvement before a pass stops.
    pub movenbr: Gnum,
    /// Number of passes; negative means until no pass improves.
    pub passnbr: Gnum,
    /// Load imbalance allowed, relative to the average part-0 load.
    pub deltrat: f64,
}

impl Default for FmParam {
    fn default() -> Self {
        FmParam {
            movenbr: 80,
            passnbr: -1,
            deltrat: 0.01,
        }
    }
}

/// Greedy graph growing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GreedyGrowParam {
    pub passnbr: Gnum,
}

impl Default for GreedyGrowParam {
    fn default() -> Self {
        GreedyGrowParam { passnbr: 5 }
    }
}

/// Gibbs–Poole–Stockmeyer growing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpsParam {
    /// Pseudo-peripheral vertex search iterations.
    pub passnbr: Gnum,
}

impl Default for GpsParam {
    fn default() -> Self {
        GpsParam { passnbr: 5 }
    }
}

/// Multilevel method.
#[derive(Debug, Clone)]
pub struct MlParam {
    /// Stop coarsening at or below this many vertices.
    pub coarnbr: Gnum,
    /// Refuse a coarse graph keeping more than this fraction of vertices.
    pub coarrat: f64,
    pub matchtype: MatchType,
    /// Strategy for the coarsest graph.
    pub low: Arc<BgraphStrat>,
    /// Strategy applied after each projection.
    pub asc: Arc<BgraphStrat>,
}

impl Default for MlParam {
    fn default() -> Self {
        MlParam {
            coarnbr: 100,
            coarrat: 0.8,
            matchtype: MatchType::HeavyEdge,
            low: Strat::empty(),
            asc: Strat::empty(),
        }
    }
}

pub use st::{bipart_st, default_strat, default_tab, DEFAULT_STRATEGY};
