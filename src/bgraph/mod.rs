//! Active bipartition graph.
//!
//! A [`Bgraph`] couples a source [`Graph`] with a two-way partition of its
//! vertices and the running statistics of that partition: part-0 load and
//! size, communication load of the cut, the frontier (vertices with at least
//! one neighbor in the other part) and the contribution of external gains.
//!
//! The communication load of a bipartition is
//! `domdist * cut + commloadextn0 + sum of veex over part-1 vertices`, and the
//! external gain available by swapping every vertex is
//! `commgainextn0 - 2 * sum of veex over part-1 vertices`.

pub mod bipart;
pub mod store;

pub use store::BgraphStore;

use crate::bipart_error::BipartError;
use crate::debug_invariants::DebugInvariants;
use crate::graph::{BasedVec, Graph};
use crate::{Anum, Gnum, GraphPart};
use std::borrow::Cow;

/// Default load imbalance tolerance, as a fraction of the target part-0 load.
pub const BGRAPH_BAL_DEFAULT: f64 = 0.05;

/// Frontier storage. A coarser level may borrow the buffer of the finer one
/// for the duration of its own bipartitioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontierBuf {
    Owned(Vec<Gnum>),
    Lent,
}

impl Default for FrontierBuf {
    fn default() -> Self {
        FrontierBuf::Owned(Vec::new())
    }
}

impl FrontierBuf {
    /// Hand the emptied buffer over, leaving `Lent` behind.
    pub fn lend(&mut self) -> Vec<Gnum> {
        let mut v = self.take();
        v.clear();
        v
    }

    /// Hand the buffer over with its contents, leaving `Lent` behind.
    pub fn take(&mut self) -> Vec<Gnum> {
        match std::mem::replace(self, FrontierBuf::Lent) {
            FrontierBuf::Owned(v) => v,
            FrontierBuf::Lent => Vec::new(),
        }
    }

    /// Take a buffer back.
    pub fn reclaim(&mut self, v: Vec<Gnum>) {
        *self = FrontierBuf::Owned(v);
    }

    pub fn is_lent(&self) -> bool {
        matches!(self, FrontierBuf::Lent)
    }

    fn as_slice(&self) -> &[Gnum] {
        match self {
            FrontierBuf::Owned(v) => v,
            FrontierBuf::Lent => &[],
        }
    }

    fn owned_mut(&mut self) -> &mut Vec<Gnum> {
        if self.is_lent() {
            *self = FrontierBuf::Owned(Vec::new());
        }
        match self {
            FrontierBuf::Owned(v) => v,
            FrontierBuf::Lent => unreachable!("frontier buffer was just replaced"),
        }
    }
}

/// Graph under bipartitioning.
#[derive(Debug, Clone)]
pub struct Bgraph<'g> {
    pub(crate) s: Cow<'g, Graph>,
    pub(crate) veextax: Option<BasedVec<Gnum>>,
    pub(crate) parttax: BasedVec<GraphPart>,
    pub(crate) frontab: FrontierBuf,
    pub(crate) compload0min: Gnum,
    pub(crate) compload0max: Gnum,
    pub(crate) compload0avg: Gnum,
    pub(crate) compload0dlt: Gnum,
    pub(crate) compload0: Gnum,
    pub(crate) compsize0: Gnum,
    pub(crate) commload: Gnum,
    pub(crate) commloadextn0: Gnum,
    pub(crate) commgainextn: Gnum,
    pub(crate) commgainextn0: Gnum,
    pub(crate) bbalval: f64,
    pub(crate) domdist: Anum,
    pub(crate) domwght: [Anum; 2],
    pub(crate) levlnum: Gnum,
}

impl<'g> Bgraph<'g> {
    /// Active graph over a caller-owned graph, with every vertex in part 0.
    pub fn new(graph: &'g Graph) -> Self {
        Self::with_graph(Cow::Borrowed(graph))
    }

    /// Active graph owning its source graph.
    pub fn from_owned(graph: Graph) -> Bgraph<'static> {
        Bgraph::with_graph(Cow::Owned(graph))
    }

    fn with_graph(s: Cow<'g, Graph>) -> Self {
        let vertnbr = s.vertnbr();
        let velosum = s.velosum();
        let base = s.baseval();
        let mut g = Bgraph {
            s,
            veextax: None,
            parttax: BasedVec::from_vec(base, Vec::new()),
            frontab: FrontierBuf::default(),
            compload0min: 0,
            compload0max: 0,
            compload0avg: 0,
            compload0dlt: 0,
            compload0: velosum,
            compsize0: vertnbr,
            commload: 0,
            commloadextn0: 0,
            commgainextn: 0,
            commgainextn0: 0,
            bbalval: BGRAPH_BAL_DEFAULT,
            domdist: 1,
            domwght: [1, 1],
            levlnum: 0,
        };
        g.refresh_targets();
        g
    }

    /// Attach external gains `veex`, one per vertex.
    pub fn with_external_gains(mut self, veextab: Vec<Gnum>) -> Result<Self, BipartError> {
        if veextab.len() as Gnum != self.s.vertnbr() {
            return Err(BipartError::InvalidGraph(format!(
                "external gain array has {} entries, expected {}",
                veextab.len(),
                self.s.vertnbr()
            )));
        }
        self.veextax = Some(BasedVec::from_vec(self.s.baseval(), veextab));
        self.recost_if_allocated();
        Ok(self)
    }

    /// Target domain weights and distance between the two domains.
    pub fn with_domains(mut self, domwght: [Anum; 2], domdist: Anum) -> Self {
        self.domwght = domwght;
        self.domdist = domdist;
        self.refresh_targets();
        self.recost_if_allocated();
        self
    }

    /// Load imbalance tolerance.
    pub fn with_balance(mut self, bbalval: f64) -> Self {
        self.bbalval = bbalval;
        self.refresh_targets();
        self
    }

    /// Communication load and gain contributed by the rest of the system.
    pub fn with_external_loads(mut self, commloadextn0: Gnum, commgainextn0: Gnum) -> Self {
        self.commloadextn0 = commloadextn0;
        self.commgainextn0 = commgainextn0;
        self.recost_if_allocated();
        self
    }

    fn recost_if_allocated(&mut self) {
        if self.is_allocated() {
            self.cost();
        } else {
            self.commload = self.commloadextn0;
            self.commgainextn = self.commgainextn0;
        }
    }

    /// Recompute the target part-0 load and its tolerance window.
    pub(crate) fn refresh_targets(&mut self) {
        let velosum = self.s.velosum();
        let wghtsum = self.domwght[0] + self.domwght[1];
        self.compload0avg = if wghtsum == 0 {
            velosum / 2
        } else {
            (velosum as f64 * self.domwght[0] as f64 / wghtsum as f64) as Gnum
        };
        let tolerance = (self.bbalval * self.compload0avg as f64) as Gnum;
        self.compload0min = (self.compload0avg - tolerance).max(0);
        self.compload0max = (self.compload0avg + tolerance).min(velosum);
        self.compload0dlt = self.compload0 - self.compload0avg;
    }

    /// Whether the partition array has been allocated.
    #[inline]
    pub fn is_allocated(&self) -> bool {
        self.parttax.len() as Gnum == self.s.vertnbr()
    }

    /// Allocate the partition array and frontier buffer if needed.
    pub fn alloc(&mut self) -> Result<(), BipartError> {
        self.alloc_parts()?;
        let vertnbr = self.s.vertnbr() as usize;
        let frontab = self.frontab.owned_mut();
        if frontab.capacity() < vertnbr {
            frontab
                .try_reserve_exact(vertnbr - frontab.len())
                .map_err(|_| BipartError::OutOfMemory("frontier array"))?;
        }
        Ok(())
    }

    /// Allocate the partition array only; the frontier may still be on loan.
    pub(crate) fn alloc_parts(&mut self) -> Result<(), BipartError> {
        if !self.is_allocated() {
            self.parttax = BasedVec::try_filled(self.s.baseval(), self.s.vertnbr() as usize, 0)
                .map_err(|_| BipartError::OutOfMemory("partition array"))?;
        }
        Ok(())
    }

    /// Put every vertex in part 0.
    pub fn zero(&mut self) {
        if self.is_allocated() {
            self.parttax.fill(0);
        } else {
            self.parttax = BasedVec::from_vec(self.s.baseval(), vec![0; self.s.vertnbr() as usize]);
        }
        self.frontab.owned_mut().clear();
        self.compload0 = self.s.velosum();
        self.compload0dlt = self.compload0 - self.compload0avg;
        self.compsize0 = self.s.vertnbr();
        self.commload = self.commloadextn0;
        self.commgainextn = self.commgainextn0;
    }

    /// Recompute frontier, loads and cut from the partition array.
    pub fn cost(&mut self) {
        if !self.is_allocated() {
            self.zero();
            return;
        }
        let totals = self.cost_totals();
        let frontab = self.collect_frontier();
        *self.frontab.owned_mut() = frontab;
        self.compload0 = totals.load0;
        self.compsize0 = totals.size0;
        self.compload0dlt = totals.load0 - self.compload0avg;
        self.commload = self.domdist * (totals.cutload / 2) + self.commloadextn0 + totals.veex1;
        self.commgainextn = self.commgainextn0 - 2 * totals.veex1;
    }

    #[cfg(not(feature = "rayon"))]
    fn cost_totals(&self) -> CostTotals {
        self.s
            .vertices()
            .map(|v| self.vertex_totals(v))
            .fold(CostTotals::default(), CostTotals::merge)
    }

    #[cfg(feature = "rayon")]
    fn cost_totals(&self) -> CostTotals {
        use rayon::prelude::*;
        self.s
            .vertices()
            .into_par_iter()
            .map(|v| self.vertex_totals(v))
            .reduce(CostTotals::default, CostTotals::merge)
    }

    fn vertex_totals(&self, v: Gnum) -> CostTotals {
        let p = self.parttax[v];
        let mut cutload = 0;
        for e in self.s.edges(v) {
            if self.parttax[self.s.edge_end(e)] != p {
                cutload += self.s.edge_load(e);
            }
        }
        let veex = self.veextax.as_ref().map_or(0, |t| t[v]);
        CostTotals {
            load0: if p == 0 { self.s.vertex_load(v) } else { 0 },
            size0: (p == 0) as Gnum,
            cutload,
            veex1: if p == 1 { veex } else { 0 },
        }
    }

    #[cfg(not(feature = "rayon"))]
    fn collect_frontier(&self) -> Vec<Gnum> {
        let mut frontab = Vec::with_capacity(self.s.vertnbr() as usize);
        frontab.extend(self.s.vertices().filter(|&v| self.is_frontier(v)));
        frontab
    }

    #[cfg(feature = "rayon")]
    fn collect_frontier(&self) -> Vec<Gnum> {
        use rayon::prelude::*;
        self.s
            .vertices()
            .into_par_iter()
            .filter(|&v| self.is_frontier(v))
            .collect()
    }

    /// Whether `v` has a neighbor in the other part.
    #[inline]
    pub fn is_frontier(&self, v: Gnum) -> bool {
        let p = self.parttax[v];
        self.s.edges(v).any(|e| self.parttax[self.s.edge_end(e)] != p)
    }

    /// Replace the partition with `parts` (one entry per vertex, 0 or 1).
    pub fn set_parts(&mut self, parts: &[GraphPart]) -> Result<(), BipartError> {
        if parts.len() as Gnum != self.s.vertnbr() {
            return Err(BipartError::InvalidParameter(format!(
                "partition has {} entries, expected {}",
                parts.len(),
                self.s.vertnbr()
            )));
        }
        if let Some(p) = parts.iter().find(|&&p| p > 1) {
            return Err(BipartError::InvalidParameter(format!("invalid part value {p}")));
        }
        self.alloc()?;
        self.parttax.as_mut_slice().copy_from_slice(parts);
        self.cost();
        Ok(())
    }

    /// Change of `commload` if `v` switched parts.
    pub fn move_gain(&self, v: Gnum) -> Gnum {
        let p = self.parttax[v];
        let mut gain = 0;
        for e in self.s.edges(v) {
            let load = self.s.edge_load(e);
            if self.parttax[self.s.edge_end(e)] == p {
                gain += load;
            } else {
                gain -= load;
            }
        }
        let veex = self.veextax.as_ref().map_or(0, |t| t[v]);
        gain * self.domdist + if p == 0 { veex } else { -veex }
    }

    /// Switch `v` to the other part, updating loads and cut but not the frontier.
    pub(crate) fn flip(&mut self, v: Gnum) {
        let gain = self.move_gain(v);
        let load = self.s.vertex_load(v);
        let veex = self.veextax.as_ref().map_or(0, |t| t[v]);
        if self.parttax[v] == 0 {
            self.parttax[v] = 1;
            self.compload0 -= load;
            self.compsize0 -= 1;
            self.commgainextn -= 2 * veex;
        } else {
            self.parttax[v] = 0;
            self.compload0 += load;
            self.compsize0 += 1;
            self.commgainextn += 2 * veex;
        }
        self.compload0dlt = self.compload0 - self.compload0avg;
        self.commload += gain;
    }

    /// Rebuild the frontier from the partition array.
    pub(crate) fn rebuild_frontier(&mut self) {
        let frontab = self.collect_frontier();
        *self.frontab.owned_mut() = frontab;
    }

    #[inline]
    pub fn graph(&self) -> &Graph {
        &self.s
    }

    /// Partition array, empty until allocated.
    pub fn parts(&self) -> &[GraphPart] {
        self.parttax.as_slice()
    }

    #[inline]
    pub fn part(&self, v: Gnum) -> GraphPart {
        self.parttax[v]
    }

    pub fn frontier(&self) -> &[Gnum] {
        self.frontab.as_slice()
    }

    #[inline]
    pub fn fronnbr(&self) -> Gnum {
        self.frontab.as_slice().len() as Gnum
    }

    #[inline]
    pub fn external_gain(&self, v: Gnum) -> Gnum {
        self.veextax.as_ref().map_or(0, |t| t[v])
    }

    pub fn has_external_gains(&self) -> bool {
        self.veextax.is_some()
    }

    #[inline]
    pub fn compload0(&self) -> Gnum {
        self.compload0
    }

    #[inline]
    pub fn compload1(&self) -> Gnum {
        self.s.velosum() - self.compload0
    }

    #[inline]
    pub fn compload0avg(&self) -> Gnum {
        self.compload0avg
    }

    #[inline]
    pub fn compload0dlt(&self) -> Gnum {
        self.compload0dlt
    }

    #[inline]
    pub fn compload0min(&self) -> Gnum {
        self.compload0min
    }

    #[inline]
    pub fn compload0max(&self) -> Gnum {
        self.compload0max
    }

    #[inline]
    pub fn compsize0(&self) -> Gnum {
        self.compsize0
    }

    #[inline]
    pub fn commload(&self) -> Gnum {
        self.commload
    }

    #[inline]
    pub fn commgainextn(&self) -> Gnum {
        self.commgainextn
    }

    #[inline]
    pub fn domdist(&self) -> Anum {
        self.domdist
    }

    #[inline]
    pub fn levlnum(&self) -> Gnum {
        self.levlnum
    }

    pub fn bbalval(&self) -> f64 {
        self.bbalval
    }

    /// Whether part-0 load lies inside the tolerance window.
    pub fn is_balanced(&self) -> bool {
        (self.compload0min..=self.compload0max).contains(&self.compload0)
    }

    /// Value of a strategy condition variable.
    pub fn stat(&self, var: BgraphStat) -> Gnum {
        match var {
            BgraphStat::Load => self.s.velosum(),
            BgraphStat::Load0 => self.compload0,
            BgraphStat::Edge => self.s.edgenbr(),
            BgraphStat::Vert => self.s.vertnbr(),
            BgraphStat::Levl => self.levlnum,
        }
    }
}

/// Quantities exposed to strategy conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BgraphStat {
    /// Total vertex load.
    Load,
    /// Part-0 load.
    Load0,
    /// Arc count.
    Edge,
    /// Vertex count.
    Vert,
    /// Multilevel depth.
    Levl,
}

impl BgraphStat {
    pub const ALL: [BgraphStat; 5] = [
        BgraphStat::Load,
        BgraphStat::Load0,
        BgraphStat::Edge,
        BgraphStat::Vert,
        BgraphStat::Levl,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BgraphStat::Load => "load",
            BgraphStat::Load0 => "load0",
            BgraphStat::Edge => "edge",
            BgraphStat::Vert => "vert",
            BgraphStat::Levl => "levl",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct CostTotals {
    load0: Gnum,
    size0: Gnum,
    cutload: Gnum,
    veex1: Gnum,
}

impl CostTotals {
    fn merge(a: CostTotals, b: CostTotals) -> CostTotals {
        CostTotals {
            load0: a.load0 + b.load0,
            size0: a.size0 + b.size0,
            cutload: a.cutload + b.cutload,
            veex1: a.veex1 + b.veex1,
        }
    }
}

impl DebugInvariants for Bgraph<'_> {
    const KIND: &'static str = "Bgraph";

    fn validate_invariants(&self) -> Result<(), BipartError> {
        if !self.is_allocated() {
            return Err(BipartError::Internal("partition array not allocated".into()));
        }
        if let Some(v) = self.s.vertices().find(|&v| self.parttax[v] > 1) {
            return Err(BipartError::Internal(format!("vertex {v} has invalid part")));
        }
        let totals = self.cost_totals();
        if totals.load0 != self.compload0 {
            return Err(BipartError::Internal(format!(
                "compload0 is {} but part-0 load is {}",
                self.compload0, totals.load0
            )));
        }
        if totals.size0 != self.compsize0 {
            return Err(BipartError::Internal(format!(
                "compsize0 is {} but part 0 has {} vertices",
                self.compsize0, totals.size0
            )));
        }
        if self.compload0dlt != self.compload0 - self.compload0avg {
            return Err(BipartError::Internal("compload0dlt out of sync".into()));
        }
        let commload = self.domdist * (totals.cutload / 2) + self.commloadextn0 + totals.veex1;
        if commload != self.commload {
            return Err(BipartError::Internal(format!(
                "commload is {} but computed cost is {commload}",
                self.commload
            )));
        }
        if self.commgainextn != self.commgainextn0 - 2 * totals.veex1 {
            return Err(BipartError::Internal("commgainextn out of sync".into()));
        }
        let mut expected = self.collect_frontier();
        let mut actual = self.frontier().to_vec();
        expected.sort_unstable();
        actual.sort_unstable();
        if expected != actual {
            return Err(BipartError::Internal(format!(
                "frontier has {} vertices, expected {}",
                actual.len(),
                expected.len()
            )));
        }
        Ok(())
    }
}
