//! Distributed graphs.
//!
//! Each rank owns a contiguous range of global vertex numbers, given by
//! `procvrttab`. Adjacency is stored with global end numbers (`edgeloctax`)
//! and with local-or-ghost end numbers (`edgegsttax`): local vertices keep
//! their local numbers, and the remote vertices adjacent to them (ghosts)
//! are numbered after the local ones in ascending global order.
//!
//! The adjacency relation must be symmetric across ranks; each rank only
//! checks the part of it that it can see.

pub mod coarsen;
pub mod halo;
pub mod matching;

use std::ops::Range;

use crate::algs::collective::{allgather, allreduce_sum};
use crate::algs::communicator::{CommTag, Communicator};
use crate::bipart_error::BipartError;
use crate::debug_invariants::DebugInvariants;
use crate::graph::BasedVec;
use crate::Gnum;

/// Tag base of the collectives run while building a distributed graph.
const BUILD_TAG: CommTag = CommTag::new(0x4400);

/// Local part of a distributed graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dgraph {
    baseval: Gnum,
    proclocnum: usize,
    procvrttab: Vec<Gnum>,
    vertglbnbr: Gnum,
    vertlocnbr: Gnum,
    vertgstnbr: Gnum,
    vertloctax: BasedVec<Gnum>,
    vendloctax: BasedVec<Gnum>,
    veloloctax: Option<BasedVec<Gnum>>,
    velolocsum: Gnum,
    veloglbsum: Gnum,
    edgelocnbr: Gnum,
    edgeglbnbr: Gnum,
    edgeloctax: BasedVec<Gnum>,
    edgegsttax: BasedVec<Gnum>,
    edloloctax: Option<BasedVec<Gnum>>,
    ghstglbtab: Vec<Gnum>,
    procngbtab: Vec<usize>,
    procrcvtab: Vec<Range<Gnum>>,
    procsndtab: Vec<Vec<Gnum>>,
}

impl Dgraph {
    /// Collectively build a distributed graph.
    ///
    /// `verttab` holds `vertlocnbr + 1` based edge indices; `edgetab` holds
    /// based global end numbers. If any rank's arrays are inconsistent, every
    /// rank returns an error.
    pub fn build<C: Communicator>(
        comm: &C,
        baseval: Gnum,
        vertlocnbr: Gnum,
        verttab: Vec<Gnum>,
        edgetab: Vec<Gnum>,
        velotab: Option<Vec<Gnum>>,
        edlotab: Option<Vec<Gnum>>,
    ) -> Result<Self, BipartError> {
        let proclocnum = comm.rank();
        let counts = allgather(comm, BUILD_TAG, vertlocnbr)?;
        let mut procvrttab = Vec::with_capacity(counts.len() + 1);
        procvrttab.push(baseval);
        for &n in &counts {
            let last = procvrttab[procvrttab.len() - 1];
            procvrttab.push(last + n);
        }
        let vertglbnbr = procvrttab[counts.len()] - baseval;

        let local = check_local_arrays(
            baseval,
            vertlocnbr,
            &verttab,
            &edgetab,
            velotab.as_deref(),
            edlotab.as_deref(),
            (procvrttab[proclocnum], procvrttab[proclocnum + 1]),
            vertglbnbr,
        );
        let failures = allreduce_sum(comm, BUILD_TAG.offset(1), local.is_err() as Gnum)?;
        local?;
        if failures > 0 {
            return Err(BipartError::InvalidGraph(format!(
                "{failures} rank(s) supplied inconsistent graph arrays"
            )));
        }

        let vendtab = verttab[1..].to_vec();
        let mut verttab = verttab;
        verttab.pop();
        let edgelocnbr = edgetab.len() as Gnum;
        let velolocsum = velotab.as_ref().map_or(vertlocnbr, |t| t.iter().sum());
        let veloglbsum = allreduce_sum(comm, BUILD_TAG.offset(2), velolocsum)?;
        let edgeglbnbr = allreduce_sum(comm, BUILD_TAG.offset(3), edgelocnbr)?;

        let vertlocadj = procvrttab[proclocnum] - baseval;
        let (vertlocmin, vertlocmax) = (procvrttab[proclocnum], procvrttab[proclocnum + 1]);
        let mut ghstglbtab: Vec<Gnum> = edgetab
            .iter()
            .copied()
            .filter(|&w| w < vertlocmin || w >= vertlocmax)
            .collect();
        ghstglbtab.sort_unstable();
        ghstglbtab.dedup();
        let vertlocnnd = baseval + vertlocnbr;
        let edgegsttab: Vec<Gnum> = edgetab
            .iter()
            .map(|&w| {
                if (vertlocmin..vertlocmax).contains(&w) {
                    w - vertlocadj
                } else {
                    // Present by construction of the ghost table.
                    vertlocnnd + ghstglbtab.partition_point(|&g| g < w) as Gnum
                }
            })
            .collect();

        let mut procngbtab: Vec<usize> = Vec::new();
        let mut procrcvtab: Vec<Range<Gnum>> = Vec::new();
        for (i, &g) in ghstglbtab.iter().enumerate() {
            let owner = owner_in(&procvrttab, g);
            let gst = vertlocnnd + i as Gnum;
            if procngbtab.last() == Some(&owner) {
                if let Some(r) = procrcvtab.last_mut() {
                    r.end = gst + 1;
                }
            } else {
                procngbtab.push(owner);
                procrcvtab.push(gst..gst + 1);
            }
        }

        let mut procsndtab: Vec<Vec<Gnum>> = vec![Vec::new(); procngbtab.len()];
        for (i, v) in (baseval..vertlocnnd).enumerate() {
            let (s, e) = (verttab[i] - baseval, vendtab[i] - baseval);
            for &w in &edgetab[s as usize..e as usize] {
                if (vertlocmin..vertlocmax).contains(&w) {
                    continue;
                }
                let owner = owner_in(&procvrttab, w);
                let j = procngbtab.partition_point(|&p| p < owner);
                if procsndtab[j].last() != Some(&v) {
                    procsndtab[j].push(v);
                }
            }
        }

        let vertgstnbr = vertlocnbr + ghstglbtab.len() as Gnum;
        let graph = Dgraph {
            baseval,
            proclocnum,
            procvrttab,
            vertglbnbr,
            vertlocnbr,
            vertgstnbr,
            vertloctax: BasedVec::from_vec(baseval, verttab),
            vendloctax: BasedVec::from_vec(baseval, vendtab),
            veloloctax: velotab.map(|t| BasedVec::from_vec(baseval, t)),
            velolocsum,
            veloglbsum,
            edgelocnbr,
            edgeglbnbr,
            edgeloctax: BasedVec::from_vec(baseval, edgetab),
            edgegsttax: BasedVec::from_vec(baseval, edgegsttab),
            edloloctax: edlotab.map(|t| BasedVec::from_vec(baseval, t)),
            ghstglbtab,
            procngbtab,
            procrcvtab,
            procsndtab,
        };
        graph.debug_assert_invariants();
        log::debug!(
            "rank {proclocnum}: {} local vertices, {} ghosts, {} neighbor ranks",
            graph.vertlocnbr,
            graph.ghstglbtab.len(),
            graph.procngbtab.len()
        );
        Ok(graph)
    }

    #[inline]
    pub fn baseval(&self) -> Gnum {
        self.baseval
    }

    #[inline]
    pub fn proclocnum(&self) -> usize {
        self.proclocnum
    }

    pub fn procglbnbr(&self) -> usize {
        self.procvrttab.len() - 1
    }

    /// First global vertex of each rank, plus the end marker.
    pub fn procvrttab(&self) -> &[Gnum] {
        &self.procvrttab
    }

    pub fn vertglbnbr(&self) -> Gnum {
        self.vertglbnbr
    }

    pub fn vertlocnbr(&self) -> Gnum {
        self.vertlocnbr
    }

    /// Number of local plus ghost vertices.
    pub fn vertgstnbr(&self) -> Gnum {
        self.vertgstnbr
    }

    /// One past the last local vertex; ghosts are numbered from here.
    #[inline]
    pub fn vertlocnnd(&self) -> Gnum {
        self.baseval + self.vertlocnbr
    }

    pub fn velolocsum(&self) -> Gnum {
        self.velolocsum
    }

    pub fn veloglbsum(&self) -> Gnum {
        self.veloglbsum
    }

    pub fn edgelocnbr(&self) -> Gnum {
        self.edgelocnbr
    }

    pub fn edgeglbnbr(&self) -> Gnum {
        self.edgeglbnbr
    }

    /// Local vertex numbers.
    #[inline]
    pub fn vertices(&self) -> Range<Gnum> {
        self.baseval..self.vertlocnnd()
    }

    #[inline]
    pub fn edges(&self, v: Gnum) -> Range<Gnum> {
        self.vertloctax[v]..self.vendloctax[v]
    }

    /// Global number of the end of edge `e`.
    #[inline]
    pub fn edge_global(&self, e: Gnum) -> Gnum {
        self.edgeloctax[e]
    }

    /// Local-or-ghost number of the end of edge `e`.
    #[inline]
    pub fn edge_gst(&self, e: Gnum) -> Gnum {
        self.edgegsttax[e]
    }

    #[inline]
    pub fn edge_load(&self, e: Gnum) -> Gnum {
        self.edloloctax.as_ref().map_or(1, |t| t[e])
    }

    #[inline]
    pub fn vertex_load(&self, v: Gnum) -> Gnum {
        self.veloloctax.as_ref().map_or(1, |t| t[v])
    }

    #[inline]
    pub fn is_local(&self, gst: Gnum) -> bool {
        gst < self.vertlocnnd()
    }

    /// Global number of a local or ghost vertex.
    pub fn global_of(&self, gst: Gnum) -> Gnum {
        if self.is_local(gst) {
            gst - self.baseval + self.procvrttab[self.proclocnum]
        } else {
            self.ghstglbtab[(gst - self.vertlocnnd()) as usize]
        }
    }

    /// Local number of a global vertex owned by this rank.
    pub fn local_of(&self, glb: Gnum) -> Option<Gnum> {
        let (min, max) = (self.procvrttab[self.proclocnum], self.procvrttab[self.proclocnum + 1]);
        (min..max).contains(&glb).then(|| glb - min + self.baseval)
    }

    /// Rank owning global vertex `glb`.
    pub fn owner_of(&self, glb: Gnum) -> usize {
        owner_in(&self.procvrttab, glb)
    }

    /// Neighbor ranks, ascending.
    pub fn procngbtab(&self) -> &[usize] {
        &self.procngbtab
    }

    /// Ghost numbers received from each neighbor by halo exchanges.
    pub fn procrcvtab(&self) -> &[Range<Gnum>] {
        &self.procrcvtab
    }

    /// Local vertices sent to each neighbor by halo exchanges.
    pub fn procsndtab(&self) -> &[Vec<Gnum>] {
        &self.procsndtab
    }
}

/// Rank whose range in `procvrttab` contains `glb`.
fn owner_in(procvrttab: &[Gnum], glb: Gnum) -> usize {
    procvrttab.partition_point(|&x| x <= glb).saturating_sub(1)
}

#[allow(clippy::too_many_arguments)]
fn check_local_arrays(
    baseval: Gnum,
    vertlocnbr: Gnum,
    verttab: &[Gnum],
    edgetab: &[Gnum],
    velotab: Option<&[Gnum]>,
    edlotab: Option<&[Gnum]>,
    (vertlocmin, vertlocmax): (Gnum, Gnum),
    vertglbnbr: Gnum,
) -> Result<(), BipartError> {
    let bad = |msg: String| Err(BipartError::InvalidGraph(msg));
    if vertlocnbr < 0 || verttab.len() as Gnum != vertlocnbr + 1 {
        return bad(format!(
            "vertex array has {} entries for {vertlocnbr} local vertices",
            verttab.len()
        ));
    }
    if verttab[0] != baseval || verttab[vertlocnbr as usize] - baseval != edgetab.len() as Gnum {
        return bad("vertex array does not span the edge array".into());
    }
    if verttab.windows(2).any(|w| w[1] < w[0]) {
        return bad("vertex array is not monotonic".into());
    }
    if let Some(t) = velotab {
        if t.len() as Gnum != vertlocnbr || t.iter().any(|&l| l < 0) {
            return bad("invalid vertex load array".into());
        }
    }
    if let Some(t) = edlotab {
        if t.len() != edgetab.len() || t.iter().any(|&l| l < 0) {
            return bad("invalid edge load array".into());
        }
    }
    let glbrange = baseval..baseval + vertglbnbr;
    for i in 0..vertlocnbr as usize {
        let v = vertlocmin + i as Gnum;
        for &w in &edgetab[(verttab[i] - baseval) as usize..(verttab[i + 1] - baseval) as usize] {
            if !glbrange.contains(&w) {
                return bad(format!("vertex {v} has out-of-range neighbor {w}"));
            }
            if w == v {
                return bad(format!("vertex {v} has a self loop"));
            }
        }
    }
    debug_assert!(vertlocmax - vertlocmin == vertlocnbr);
    Ok(())
}

impl DebugInvariants for Dgraph {
    const KIND: &'static str = "Dgraph";

    fn validate_invariants(&self) -> Result<(), BipartError> {
        let bad = |msg: String| Err(BipartError::InvalidGraph(msg));
        if self.ghstglbtab.windows(2).any(|w| w[0] >= w[1]) {
            return bad("ghost numbers are not strictly ascending".into());
        }
        if self.ghstglbtab.iter().any(|&g| self.local_of(g).is_some()) {
            return bad("a ghost is owned locally".into());
        }
        for v in self.vertices() {
            for e in self.edges(v) {
                let gst = self.edgegsttax[e];
                if gst < self.baseval || gst >= self.baseval + self.vertgstnbr {
                    return bad(format!("edge {e} has out-of-range ghost number {gst}"));
                }
                if self.global_of(gst) != self.edgeloctax[e] {
                    return bad(format!("edge {e} ghost number disagrees with its global end"));
                }
            }
        }
        if self.procngbtab.windows(2).any(|w| w[0] >= w[1]) || self.procngbtab.contains(&self.proclocnum) {
            return bad("neighbor table is not a sorted list of remote ranks".into());
        }
        let rcvsum: Gnum = self.procrcvtab.iter().map(|r| r.end - r.start).sum();
        if rcvsum != self.ghstglbtab.len() as Gnum {
            return bad("receive ranges do not cover the ghosts".into());
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::algs::communicator::{NoComm, ThreadComm};
    use serial_test::serial;

    /// Run `f` on every rank of a thread world and collect the results.
    pub(crate) fn on_ranks<T: Send>(size: usize, f: impl Fn(&ThreadComm) -> T + Sync) -> Vec<T> {
        let world = ThreadComm::world(size);
        std::thread::scope(|s| {
            let f = &f;
            let hs: Vec<_> = world.iter().map(|c| s.spawn(move || f(c))).collect();
            hs.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    /// Local part of the 4-cycle 0-1-2-3-0 split as {0, 1} / {2, 3}.
    pub(crate) fn cycle_part<C: Communicator>(comm: &C) -> Dgraph {
        let edgetab = if comm.rank() == 0 { vec![1, 3, 0, 2] } else { vec![1, 3, 2, 0] };
        Dgraph::build(comm, 0, 2, vec![0, 2, 4], edgetab, None, None).unwrap()
    }

    #[test]
    fn serial_graph_has_no_ghosts() {
        let g = Dgraph::build(&NoComm, 1, 3, vec![1, 2, 4, 5], vec![2, 1, 3, 2], None, None).unwrap();
        assert_eq!(g.vertglbnbr(), 3);
        assert_eq!(g.vertgstnbr(), 3);
        assert!(g.procngbtab().is_empty());
        assert_eq!(g.edgeglbnbr(), 4);
        g.validate_invariants().unwrap();
    }

    #[test]
    #[serial]
    fn cycle_split_over_two_ranks() {
        let graphs = on_ranks(2, |c| cycle_part(c));
        let (g0, g1) = (&graphs[0], &graphs[1]);
        assert_eq!(g0.procvrttab(), &[0, 2, 4]);
        assert_eq!(g0.vertglbnbr(), 4);
        assert_eq!(g0.vertgstnbr(), 4);
        assert_eq!(g0.procngbtab(), &[1]);
        assert_eq!(g1.procngbtab(), &[0]);
        // Rank 0 sees 2 and 3 as ghosts 2 and 3; rank 1 sees 0 and 1.
        assert_eq!(g0.global_of(2), 2);
        assert_eq!(g1.global_of(2), 0);
        assert_eq!(g0.procsndtab(), &[vec![0, 1]]);
        assert_eq!(g1.local_of(3), Some(1));
        for g in &graphs {
            g.validate_invariants().unwrap();
        }
    }

    #[test]
    #[serial]
    fn bad_rank_fails_everywhere() {
        let results = on_ranks(2, |c| {
            let edgetab = if c.rank() == 0 { vec![1, 3, 0, 9] } else { vec![1, 3, 0, 2] };
            Dgraph::build(c, 0, 2, vec![0, 2, 4], edgetab, None, None)
        });
        assert!(results.iter().all(|r| matches!(r, Err(BipartError::InvalidGraph(_)))));
    }
}
