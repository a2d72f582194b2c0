#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mlbipart
//!
//! mlbipart computes bipartitions of weighted graphs with the multilevel
//! scheme: the graph is coarsened by matching until it is small, an initial
//! bipartition is computed on the coarsest graph, and the result is projected
//! back level by level and refined on the way up.
//!
//! ## Features
//! - Active bipartition graphs ([`Bgraph`]) with incremental frontier and cut
//!   bookkeeping, plus snapshots ([`BgraphStore`]) for trying alternatives
//! - A strategy language combining methods with sequencing, selection and
//!   conditions, e.g. `m{vert=100,low=h{pass=10}f,asc=b{bnd=f,org=f}}`
//! - Methods: band (`b`), diffusion (`d`), exact balancing (`x`),
//!   Fiduccia-Mattheyses (`f`), greedy growing (`h`), Gibbs-Poole-Stockmeyer
//!   (`g`), multilevel (`m`) and zero (`z`)
//! - Distributed graphs ([`Dgraph`]) with a ghost-aware matching protocol and
//!   distributed coarsening over a pluggable [`Communicator`] (threads, or MPI
//!   with the `mpi-support` feature)
//!
//! ## Determinism
//!
//! All randomized decisions use `SmallRng` seeds drawn from configuration so
//! runs are reproducible. In distributed runs each rank derives its own seed
//! from the global one; receives complete in arrival order unless
//! `DgraphCoarsenParam::deterministic` (default: the `deterministic`
//! feature) fixes the order.
//!
//! ## Usage
//!
//! ```
//! use mlbipart::prelude::*;
//!
//! // Two triangles joined by one edge.
//! let graph = Graph::from_edges(6, &[(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3), (2, 3)]).unwrap();
//! let mut bgraph = Bgraph::new(&graph);
//! mlbipart::bipartition_with_config(&mut bgraph, &BipartConfig::default()).unwrap();
//! assert!(bgraph.validate_invariants().is_ok());
//! assert_eq!(bgraph.compload0() + bgraph.compload1(), 6);
//! ```

pub mod algs;
pub mod bgraph;
pub mod bipart_error;
pub mod config;
pub mod data;
pub mod debug_invariants;
pub mod dgraph;
pub mod graph;
pub mod strategy;

/// Graph vertex, edge and load numbers.
pub type Gnum = i64;
/// Architecture (target domain) numbers.
pub type Anum = i64;
/// Part of a vertex: 0 or 1.
pub type GraphPart = u8;

pub use algs::communicator::Communicator;
pub use bgraph::bipart::st::bipart_st as bipartition;
pub use bgraph::{Bgraph, BgraphStore};
pub use bipart_error::BipartError;
pub use debug_invariants::DebugInvariants;
pub use dgraph::Dgraph;
pub use graph::Graph;

use config::{BipartConfig, BipartContext};

/// Bipartition `graph` as described by `cfg`.
///
/// The strategy text is parsed against the default method table and
/// `cfg.bbalval` replaces the graph's load imbalance tolerance. As with
/// [`bipartition`], the graph holds a consistent bipartition on return.
pub fn bipartition_with_config(graph: &mut Bgraph<'_>, cfg: &BipartConfig) -> Result<(), BipartError> {
    let tab = bgraph::bipart::default_tab();
    let strat = strategy::parser::parse(&cfg.strategy, &tab)?;
    graph.bbalval = cfg.bbalval;
    graph.refresh_targets();
    let mut ctx = BipartContext::from_config(cfg);
    log::debug!(
        "bipartitioning {} vertices with strategy {:?}",
        graph.graph().vertnbr(),
        cfg.strategy
    );
    bipartition(graph, &strat, &mut ctx)
}

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{CommTag, Communicator, NoComm, ThreadComm, Wait};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::bgraph::bipart::{default_strat, default_tab, BgraphStrat, DEFAULT_STRATEGY};
    pub use crate::bgraph::{Bgraph, BgraphStore};
    pub use crate::bipart_error::BipartError;
    pub use crate::config::{BipartConfig, BipartContext, DgraphCoarsenParam};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::dgraph::coarsen::{coarsen as dgraph_coarsen, DgraphCoarsenMulti, DgraphCoarsenOutcome};
    pub use crate::dgraph::Dgraph;
    pub use crate::graph::Graph;
    pub use crate::strategy::parser::parse as parse_strategy;
    pub use crate::{bipartition, bipartition_with_config, Anum, Gnum, GraphPart};
}
