//! Sequential graph coarsening.
//!
//! A matching pairs each vertex with at most one neighbor; every pair (or
//! unmatched vertex) becomes one coarse vertex, a *multinode*. Coarse vertex
//! loads are the sums of their fine vertices' loads, parallel edges are merged
//! by summing their loads, and edges internal to a multinode disappear.

use crate::bipart_error::BipartError;
use crate::graph::{BasedVec, Graph};
use crate::Gnum;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Fine vertices merged into one coarse vertex. A singleton repeats its
/// vertex in both slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoarsenMulti {
    pub vertnum: [Gnum; 2],
}

impl CoarsenMulti {
    #[inline]
    pub fn pair(a: Gnum, b: Gnum) -> Self {
        CoarsenMulti { vertnum: [a, b] }
    }

    #[inline]
    pub fn single(v: Gnum) -> Self {
        CoarsenMulti { vertnum: [v, v] }
    }

    #[inline]
    pub fn is_single(&self) -> bool {
        self.vertnum[0] == self.vertnum[1]
    }
}

/// Result of a coarsening attempt.
#[derive(Debug, Clone)]
pub enum CoarsenOutcome {
    /// `mults[i]` lists the fine vertices of coarse vertex `baseval + i`.
    Coarsened {
        graph: Graph,
        mults: Vec<CoarsenMulti>,
    },
    /// The graph is already small enough, or matching did not shrink it enough.
    Refused,
}

/// Vertex matching heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchType {
    /// Random visit order, mate with the heaviest free edge.
    #[default]
    HeavyEdge,
    /// Random visit order, mate with a random free neighbor.
    Scan,
    /// Natural visit order, mate with the first free neighbor.
    CrystalScan,
    /// Natural visit order, mate with the heaviest free edge.
    CrystalHeavyEdge,
}

impl MatchType {
    /// Single-letter name used in strategy strings.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'h' => Some(MatchType::HeavyEdge),
            's' => Some(MatchType::Scan),
            'c' => Some(MatchType::CrystalScan),
            'd' => Some(MatchType::CrystalHeavyEdge),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            MatchType::HeavyEdge => 'h',
            MatchType::Scan => 's',
            MatchType::CrystalScan => 'c',
            MatchType::CrystalHeavyEdge => 'd',
        }
    }

    fn random_order(self) -> bool {
        matches!(self, MatchType::HeavyEdge | MatchType::Scan)
    }
}

/// Compute a matching of `graph` as a list of multinodes.
pub fn match_vertices<R: Rng + ?Sized>(
    graph: &Graph,
    matchtype: MatchType,
    rng: &mut R,
) -> Vec<CoarsenMulti> {
    let base = graph.baseval();
    let mut order: Vec<Gnum> = graph.vertices().collect();
    if matchtype.random_order() {
        order.shuffle(rng);
    }
    let mut matetax = BasedVec::from_vec(base, vec![-1 as Gnum; graph.vertnbr() as usize]);
    let mut mults = Vec::with_capacity(graph.vertnbr() as usize);
    let mut isolated: Option<Gnum> = None;
    let mut cands: Vec<Gnum> = Vec::new();

    for &v in &order {
        if matetax[v] != -1 {
            continue;
        }
        if graph.degree(v) == 0 {
            // Isolated vertices are paired together.
            match isolated.take() {
                Some(u) => {
                    matetax[u] = v;
                    matetax[v] = u;
                    mults.push(CoarsenMulti::pair(u, v));
                }
                None => isolated = Some(v),
            }
            continue;
        }
        let mate = match matchtype {
            MatchType::HeavyEdge | MatchType::CrystalHeavyEdge => {
                let mut best: Option<(Gnum, Gnum)> = None;
                for e in graph.edges(v) {
                    let w = graph.edge_end(e);
                    let load = graph.edge_load(e);
                    if matetax[w] == -1 && best.is_none_or(|(_, l)| load > l) {
                        best = Some((w, load));
                    }
                }
                best.map(|(w, _)| w)
            }
            MatchType::Scan => {
                cands.clear();
                cands.extend(graph.edges(v).map(|e| graph.edge_end(e)).filter(|&w| matetax[w] == -1));
                cands.choose(rng).copied()
            }
            MatchType::CrystalScan => graph
                .edges(v)
                .map(|e| graph.edge_end(e))
                .find(|&w| matetax[w] == -1),
        };
        match mate {
            Some(w) => {
                matetax[v] = w;
                matetax[w] = v;
                mults.push(CoarsenMulti::pair(v, w));
            }
            None => {
                matetax[v] = v;
                mults.push(CoarsenMulti::single(v));
            }
        }
    }
    if let Some(u) = isolated {
        mults.push(CoarsenMulti::single(u));
    }
    mults
}

/// Build the coarse graph induced by a multinode table.
pub fn build_coarse(graph: &Graph, mults: &[CoarsenMulti]) -> Result<Graph, BipartError> {
    let base = graph.baseval();
    let coarvertnbr = mults.len();
    let mut coartax = BasedVec::try_filled(base, graph.vertnbr() as usize, 0 as Gnum)?;
    for (i, m) in mults.iter().enumerate() {
        coartax[m.vertnum[0]] = base + i as Gnum;
        coartax[m.vertnum[1]] = base + i as Gnum;
    }

    let mut verttab = Vec::new();
    let mut vendtab = Vec::new();
    let mut velotab = Vec::new();
    verttab.try_reserve_exact(coarvertnbr)?;
    vendtab.try_reserve_exact(coarvertnbr)?;
    velotab.try_reserve_exact(coarvertnbr)?;
    let mut edgetab: Vec<Gnum> = Vec::new();
    let mut edlotab: Vec<Gnum> = Vec::new();
    edgetab.try_reserve(graph.edgenbr() as usize)?;
    edlotab.try_reserve(graph.edgenbr() as usize)?;

    // Position of coarse neighbor `c` in the current row, valid when stamped.
    let mut slottab = BasedVec::try_filled(base, coarvertnbr, (-1 as Gnum, 0usize))?;
    for (i, m) in mults.iter().enumerate() {
        let coarvertnum = base + i as Gnum;
        verttab.push(base + edgetab.len() as Gnum);
        let fineverts: &[Gnum] = if m.is_single() { &m.vertnum[..1] } else { &m.vertnum };
        let mut load = 0;
        for &v in fineverts {
            load += graph.vertex_load(v);
            for e in graph.edges(v) {
                let c = coartax[graph.edge_end(e)];
                if c == coarvertnum {
                    continue;
                }
                let (stamp, slot) = slottab[c];
                if stamp == coarvertnum {
                    edlotab[slot] += graph.edge_load(e);
                } else {
                    slottab[c] = (coarvertnum, edgetab.len());
                    edgetab.push(c);
                    edlotab.push(graph.edge_load(e));
                }
            }
        }
        velotab.push(load);
        vendtab.push(base + edgetab.len() as Gnum);
    }

    Ok(Graph::from_parts(base, verttab, vendtab, velotab, edgetab, edlotab))
}

/// Coarsen `fine` once.
///
/// Refused when `fine` has no more than `coarnbr` vertices, or when the
/// coarse graph would keep more than `coarrat * vertnbr` vertices.
pub fn coarsen<R: Rng + ?Sized>(
    fine: &Graph,
    coarnbr: Gnum,
    coarrat: f64,
    matchtype: MatchType,
    rng: &mut R,
) -> Result<CoarsenOutcome, BipartError> {
    if fine.vertnbr() <= coarnbr {
        return Ok(CoarsenOutcome::Refused);
    }
    let mults = match_vertices(fine, matchtype, rng);
    if mults.len() as f64 > coarrat * fine.vertnbr() as f64 {
        return Ok(CoarsenOutcome::Refused);
    }
    let graph = build_coarse(fine, &mults)?;
    log::debug!(
        "coarsened {} vertices to {} ({:?})",
        fine.vertnbr(),
        graph.vertnbr(),
        matchtype
    );
    Ok(CoarsenOutcome::Coarsened { graph, mults })
}
