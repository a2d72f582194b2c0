//! Distributed heavy-edge matching.
//!
//! Each round, every rank first scans its unmatched local vertices. A vertex
//! mates with its heaviest free local neighbor when there is one; otherwise
//! it requests its heaviest free ghost neighbor, which is reserved so that no
//! other local vertex requests it in the same round. Requests are then
//! bucketed by owner rank and exchanged with the neighbor ranks, and every
//! non-empty request message is answered:
//!
//! * a request to a free vertex is accepted, and the requester creates the
//!   multinode;
//! * two vertices requesting each other are mated without reply, and a
//!   parity rule on their global numbers picks the side creating the
//!   multinode;
//! * a request to an already matched vertex is declined, the reply carrying
//!   the actual mate;
//! * a request to a vertex that is itself requesting some third vertex is
//!   deferred, and declined after the first phase only if that vertex got
//!   matched meanwhile. Otherwise it is dropped, and the requester retries
//!   next round.

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::algs::collective::allreduce_sum;
use crate::algs::communicator::{wait_any, CoarsenCommTags, CommTag, Communicator, Test, Wait};
use crate::algs::wire::{cast_slice, decode_records, WireMatePair};
use crate::bipart_error::BipartError;
use crate::config::{rank_rng, DgraphCoarsenParam};
use crate::dgraph::coarsen::DgraphCoarsenMulti;
use crate::dgraph::Dgraph;
use crate::Gnum;

/// Matching state of a local or ghost vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mate {
    /// Available for matching.
    Free,
    /// Local vertex waiting for an answer about the end of this edge.
    Requesting(Gnum),
    /// Ghost targeted by a local request this round.
    Reserved,
    /// Mated with this global vertex; a vertex mated with itself is a singleton.
    Matched(Gnum),
}

/// Which of two mutually requesting vertices creates their multinode.
///
/// Exactly one of `creates_multinode(a, b)` and `creates_multinode(b, a)`
/// holds, and the choice alternates with the parity of the numbers so that
/// neither rank gets all the multinodes.
pub(crate) fn creates_multinode(vert: Gnum, mate: Gnum) -> bool {
    let mut flag = (mate > vert) as Gnum;
    flag = ((mate + (mate - vert) * flag) & 1) ^ flag;
    flag == 0
}

/// Matching state of one rank.
#[derive(Debug)]
pub struct DgraphMatch<'g> {
    graph: &'g Dgraph,
    /// Indexed by local-or-ghost number minus the base value.
    mategsttab: Vec<Mate>,
    /// Local vertices still unmatched.
    queuetab: Vec<Gnum>,
    /// First global vertex of each neighbor rank, plus the end marker.
    procvgbtab: Vec<Gnum>,
    /// Cached neighbor index of each ghost.
    procgsttab: Vec<Option<usize>>,
    /// Neighbor index where the send sweep starts.
    procngbnxt: usize,
    probval: f64,
    deterministic: bool,
    rng: SmallRng,
    multloctab: Vec<DgraphCoarsenMulti>,
    matelocnbr: Gnum,
    tags: CoarsenCommTags,
}

impl<'g> DgraphMatch<'g> {
    pub fn new(graph: &'g Dgraph, param: &DgraphCoarsenParam, tags: CoarsenCommTags) -> Self {
        let procngbtab = graph.procngbtab();
        let procvrttab = graph.procvrttab();
        let mut procvgbtab: Vec<Gnum> = procngbtab.iter().map(|&p| procvrttab[p]).collect();
        procvgbtab.push(procvrttab[graph.procglbnbr()]);
        let procngbnxt = procngbtab
            .iter()
            .position(|&p| p > graph.proclocnum())
            .unwrap_or(0);
        let ghstnbr = (graph.vertgstnbr() - graph.vertlocnbr()) as usize;
        DgraphMatch {
            graph,
            mategsttab: vec![Mate::Free; graph.vertgstnbr() as usize],
            queuetab: graph.vertices().collect(),
            procvgbtab,
            procgsttab: vec![None; ghstnbr],
            procngbnxt,
            // Without neighbors there is nobody to wait for.
            probval: if procngbtab.is_empty() { 1.0 } else { param.probval.clamp(0.0, 1.0) },
            deterministic: param.deterministic,
            rng: rank_rng(param.rng_seed, graph.proclocnum()),
            multloctab: Vec::new(),
            matelocnbr: 0,
            tags,
        }
    }

    #[inline]
    fn slot(&self, gst: Gnum) -> usize {
        (gst - self.graph.baseval()) as usize
    }

    /// State of a local or ghost vertex.
    pub fn mate(&self, gst: Gnum) -> Mate {
        self.mategsttab[self.slot(gst)]
    }

    fn set_mate(&mut self, gst: Gnum, mate: Mate) {
        let i = self.slot(gst);
        self.mategsttab[i] = mate;
    }

    /// Number of local vertices not yet matched.
    pub fn unmatched(&self) -> Gnum {
        self.graph.vertlocnbr() - self.matelocnbr
    }

    /// Multinodes created on this rank so far.
    pub fn multinodes(&self) -> &[DgraphCoarsenMulti] {
        &self.multloctab
    }

    fn push_multi(&mut self, a: Gnum, b: Gnum) {
        self.multloctab.push(DgraphCoarsenMulti { vertglbnum: [a, b] });
    }

    /// Local scan: mate local pairs and post requests for ghosts.
    pub fn scan(&mut self) {
        let graph = self.graph;
        let queue = std::mem::take(&mut self.queuetab);
        // Requests left unanswered last round are retried.
        for &v in &queue {
            if let Mate::Requesting(e) = self.mate(v) {
                self.set_mate(v, Mate::Free);
                let g = graph.edge_gst(e);
                if self.mate(g) == Mate::Reserved {
                    self.set_mate(g, Mate::Free);
                }
            }
        }
        let mut queue = queue;
        queue.shuffle(&mut self.rng);

        let mut next = Vec::with_capacity(queue.len());
        for v in queue {
            if self.mate(v) != Mate::Free {
                continue;
            }
            if !self.rng.gen_bool(self.probval) {
                next.push(v);
                continue;
            }
            let mut best_local: Option<(Gnum, Gnum)> = None;
            let mut best_ghost: Option<(Gnum, Gnum)> = None;
            let mut pending = false;
            for e in graph.edges(v) {
                let w = graph.edge_gst(e);
                let load = graph.edge_load(e);
                match self.mate(w) {
                    Mate::Free if graph.is_local(w) => {
                        if best_local.is_none_or(|(_, l)| load > l) {
                            best_local = Some((w, load));
                        }
                    }
                    Mate::Free => {
                        if best_ghost.is_none_or(|(_, l)| load > l) {
                            best_ghost = Some((e, load));
                        }
                    }
                    Mate::Matched(_) => {}
                    Mate::Requesting(_) | Mate::Reserved => pending = true,
                }
            }
            if let Some((w, _)) = best_local {
                let (vg, wg) = (graph.global_of(v), graph.global_of(w));
                self.set_mate(v, Mate::Matched(wg));
                self.set_mate(w, Mate::Matched(vg));
                self.push_multi(vg, wg);
                self.matelocnbr += 2;
            } else if let Some((e, _)) = best_ghost {
                self.set_mate(v, Mate::Requesting(e));
                self.set_mate(graph.edge_gst(e), Mate::Reserved);
                next.push(v);
            } else if pending {
                next.push(v);
            } else {
                let vg = graph.global_of(v);
                self.set_mate(v, Mate::Matched(vg));
                self.push_multi(vg, vg);
                self.matelocnbr += 1;
            }
        }
        // Partners matched later in the scan are dropped at the next one.
        next.retain(|&v| !matches!(self.mate(v), Mate::Matched(_)));
        self.queuetab = next;
    }

    /// Neighbor index of the owner of ghost `gst`, whose global number is `glb`.
    fn owner_index(&mut self, gst: Gnum, glb: Gnum) -> usize {
        let k = (gst - self.graph.vertlocnnd()) as usize;
        if let Some(j) = self.procgsttab[k] {
            return j;
        }
        let (mut lo, mut hi) = (0, self.procvgbtab.len() - 1);
        while hi - lo > 1 {
            let med = (lo + hi) / 2;
            if self.procvgbtab[med] > glb {
                hi = med;
            } else {
                lo = med;
            }
        }
        self.procgsttab[k] = Some(lo);
        lo
    }

    /// Neighbor indices in the order receives are posted: descending from
    /// the start of the send sweep, wrapping around.
    fn recv_order(&self) -> impl Iterator<Item = usize> + use<> {
        let n = self.graph.procngbtab().len();
        let start = self.procngbnxt;
        (1..=n).map(move |k| (start + n - k) % n)
    }

    /// Neighbor indices in the order sends are posted.
    fn send_order(&self) -> impl Iterator<Item = usize> + use<> {
        let n = self.graph.procngbtab().len();
        let start = self.procngbnxt;
        (0..n).map(move |k| (start + k) % n)
    }

    /// Complete every pending receive, in arrival order or, when
    /// deterministic, in descending neighbor order.
    fn complete_all<H: Wait + Test>(
        &mut self,
        recvs: &mut [Option<H>],
        mut handle: impl FnMut(&mut Self, usize, Option<Vec<u8>>) -> Result<(), BipartError>,
    ) -> Result<(), BipartError> {
        let mut maybe_err = None;
        loop {
            let next = if self.deterministic {
                match (0..recvs.len()).rev().find(|&j| recvs[j].is_some()) {
                    Some(j) => recvs[j].take().map(|h| (j, h.wait())),
                    None => None,
                }
            } else {
                wait_any(recvs)
            };
            let Some((j, data)) = next else { break };
            if maybe_err.is_some() {
                continue; // drain
            }
            if let Err(e) = handle(self, j, data) {
                maybe_err = Some(e);
            }
        }
        maybe_err.map_or(Ok(()), Err)
    }

    /// Exchange requests and replies with the neighbor ranks.
    pub fn sync<C: Communicator>(&mut self, comm: &C) -> Result<(), BipartError> {
        let graph = self.graph;
        let procngbtab = graph.procngbtab();
        let n = procngbtab.len();
        if n == 0 {
            return Ok(());
        }

        let mut sendtab: Vec<Vec<WireMatePair>> = vec![Vec::new(); n];
        for k in 0..self.queuetab.len() {
            let v = self.queuetab[k];
            if let Mate::Requesting(e) = self.mate(v) {
                let glb = graph.edge_global(e);
                let j = self.owner_index(graph.edge_gst(e), glb);
                sendtab[j].push(WireMatePair::new(graph.global_of(v), glb));
            }
        }

        // Phase 1: requests.
        let mut recvs: Vec<Option<C::RecvHandle>> = (0..n).map(|_| None).collect();
        for j in self.recv_order() {
            recvs[j] = Some(comm.irecv(procngbtab[j], self.tags.request.as_u16()));
        }
        let sends: Vec<C::SendHandle> = self
            .send_order()
            .map(|j| comm.isend(procngbtab[j], self.tags.request.as_u16(), cast_slice(&sendtab[j])))
            .collect();

        let mut replytab: Vec<Option<(Vec<WireMatePair>, Vec<(Gnum, Gnum)>)>> = vec![None; n];
        let got = self.complete_all(&mut recvs, |this, j, data| {
            let peer = procngbtab[j];
            let data = data.ok_or_else(|| BipartError::comm(peer, "matching request receive failed"))?;
            let reqs = decode_records::<WireMatePair>(&data).map_err(|e| BipartError::comm(peer, e))?;
            if !reqs.is_empty() {
                replytab[j] = Some(this.answer_requests(peer, &reqs)?);
            }
            Ok(())
        });
        for s in sends {
            let _ = s.wait();
        }
        got?;

        // Phase 2: replies, one per non-empty request message.
        let reply_tag = self.tags.reply.as_u16();
        let mut recvs: Vec<Option<C::RecvHandle>> = (0..n).map(|_| None).collect();
        for j in self.recv_order() {
            if !sendtab[j].is_empty() {
                recvs[j] = Some(comm.irecv(procngbtab[j], reply_tag));
            }
        }
        let mut sends = Vec::new();
        for j in self.send_order() {
            if let Some((mut reply, deferred)) = replytab[j].take() {
                for (vmat, v) in deferred {
                    if let Mate::Matched(m) = self.mate(v) {
                        reply.push(WireMatePair::new(vmat, m));
                    }
                }
                sends.push(comm.isend(procngbtab[j], reply_tag, cast_slice(&reply)));
            }
        }
        let got = self.complete_all(&mut recvs, |this, j, data| {
            let peer = procngbtab[j];
            let data = data.ok_or_else(|| BipartError::comm(peer, "matching reply receive failed"))?;
            let replies = decode_records::<WireMatePair>(&data).map_err(|e| BipartError::comm(peer, e))?;
            this.apply_replies(peer, &replies)
        });
        for s in sends {
            let _ = s.wait();
        }
        got?;

        self.queuetab.retain(|&v| !matches!(self.mategsttab[(v - graph.baseval()) as usize], Mate::Matched(_)));
        Ok(())
    }

    /// Handle the requests received from one neighbor.
    ///
    /// Returns the immediate replies and the deferred requests, as
    /// (requester, local requested vertex) pairs.
    fn answer_requests(
        &mut self,
        peer: usize,
        reqs: &[WireMatePair],
    ) -> Result<(Vec<WireMatePair>, Vec<(Gnum, Gnum)>), BipartError> {
        let graph = self.graph;
        let mut reply = Vec::new();
        let mut deferred = Vec::new();
        for req in reqs {
            let (vmat, vertglb) = (req.vert(), req.mate());
            let v = graph
                .local_of(vertglb)
                .ok_or_else(|| BipartError::comm(peer, format!("request for vertex {vertglb} not owned here")))?;
            match self.mate(v) {
                Mate::Free => {
                    let e = graph
                        .edges(v)
                        .find(|&e| graph.edge_global(e) == vmat)
                        .ok_or_else(|| BipartError::Internal(format!("vertex {vmat} is not adjacent to {vertglb}")))?;
                    self.set_mate(graph.edge_gst(e), Mate::Matched(vertglb));
                    self.set_mate(v, Mate::Matched(vmat));
                    self.matelocnbr += 1;
                    reply.push(*req);
                }
                Mate::Requesting(e) if graph.edge_global(e) == vmat => {
                    self.set_mate(v, Mate::Matched(vmat));
                    self.set_mate(graph.edge_gst(e), Mate::Matched(vertglb));
                    self.matelocnbr += 1;
                    if creates_multinode(vertglb, vmat) {
                        self.push_multi(vertglb, vmat);
                    }
                }
                Mate::Requesting(_) => deferred.push((vmat, v)),
                Mate::Matched(m) => reply.push(WireMatePair::new(vmat, m)),
                Mate::Reserved => {
                    return Err(BipartError::Internal(format!("local vertex {vertglb} is reserved")));
                }
            }
        }
        Ok((reply, deferred))
    }

    /// Handle the replies to our requests received from one neighbor.
    fn apply_replies(&mut self, peer: usize, replies: &[WireMatePair]) -> Result<(), BipartError> {
        let graph = self.graph;
        for rep in replies {
            let (vertglb, vmat) = (rep.vert(), rep.mate());
            let v = graph
                .local_of(vertglb)
                .ok_or_else(|| BipartError::comm(peer, format!("reply for vertex {vertglb} not owned here")))?;
            let Mate::Requesting(e) = self.mate(v) else {
                return Err(BipartError::comm(peer, format!("unexpected reply for vertex {vertglb}")));
            };
            let g = graph.edge_gst(e);
            if graph.edge_global(e) == vmat {
                self.set_mate(v, Mate::Matched(vmat));
                self.set_mate(g, Mate::Matched(vertglb));
                self.push_multi(vertglb, vmat);
                self.matelocnbr += 1;
            } else {
                self.set_mate(v, Mate::Free);
                self.set_mate(g, Mate::Matched(vmat));
            }
        }
        Ok(())
    }

    /// Turn every vertex still unmatched into a singleton multinode.
    pub fn finish(mut self) -> (Vec<DgraphCoarsenMulti>, Vec<Mate>) {
        let graph = self.graph;
        for v in graph.vertices() {
            if !matches!(self.mate(v), Mate::Matched(_)) {
                let vg = graph.global_of(v);
                self.set_mate(v, Mate::Matched(vg));
                self.push_multi(vg, vg);
                self.matelocnbr += 1;
            }
        }
        (self.multloctab, self.mategsttab)
    }
}

/// Run matching rounds until every vertex is matched or `passnbr` rounds
/// have been done, then make singletons of the leftovers.
///
/// Collective: all ranks run the same number of rounds.
pub fn match_vertices<C: Communicator>(
    graph: &Dgraph,
    comm: &C,
    param: &DgraphCoarsenParam,
    tags: CoarsenCommTags,
) -> Result<(Vec<DgraphCoarsenMulti>, Vec<Mate>), BipartError> {
    let mut mat = DgraphMatch::new(graph, param, tags);
    let count_tag: CommTag = tags.collective;
    for pass in 0..param.passnbr {
        mat.scan();
        mat.sync(comm)?;
        let left = allreduce_sum(comm, count_tag, mat.unmatched())?;
        log::trace!(
            "rank {}: matching round {pass}, {left} vertices left globally",
            graph.proclocnum()
        );
        if left == 0 {
            break;
        }
    }
    Ok(mat.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dgraph::tests::{cycle_part, on_ranks};
    use proptest::prelude::*;
    use serial_test::serial;

    proptest! {
        #[test]
        fn exactly_one_side_creates(a in -1000i64..1000, b in -1000i64..1000) {
            prop_assume!(a != b);
            prop_assert_ne!(creates_multinode(a, b), creates_multinode(b, a));
        }
    }

    fn param() -> DgraphCoarsenParam {
        DgraphCoarsenParam {
            coarnbr: 1,
            passnbr: 20,
            deterministic: true,
            ..Default::default()
        }
    }

    /// Every global vertex is covered by exactly one multinode.
    fn assert_covering(all: &[Vec<DgraphCoarsenMulti>], vertglbnbr: Gnum) {
        let mut seen = vec![0; vertglbnbr as usize];
        for m in all.iter().flatten() {
            let [a, b] = m.vertglbnum;
            seen[a as usize] += 1;
            if b != a {
                seen[b as usize] += 1;
            }
        }
        assert!(seen.iter().all(|&k| k == 1), "coverage {seen:?}");
    }

    #[test]
    #[serial]
    fn cycle_over_two_ranks_matches_locally() {
        let out = on_ranks(2, |c| {
            let g = cycle_part(c);
            let (mults, mates) = match_vertices(&g, c, &param(), CoarsenCommTags::default()).unwrap();
            let all_matched = g.vertices().all(|v| matches!(mates[v as usize], Mate::Matched(_)));
            (mults, all_matched)
        });
        assert!(out.iter().all(|(_, ok)| *ok));
        let all: Vec<_> = out.into_iter().map(|(m, _)| m).collect();
        // Each rank holds an adjacent pair, mated locally.
        for (r, mults) in all.iter().enumerate() {
            assert_eq!(mults.len(), 1);
            let mut pair = mults[0].vertglbnum;
            pair.sort_unstable();
            assert_eq!(pair, [2 * r as Gnum, 2 * r as Gnum + 1]);
        }
        assert_covering(&all, 4);
    }

    /// Complete bipartite K(2,2) with each side on its own rank: every
    /// candidate mate is remote.
    fn cross_part<C: Communicator>(comm: &C) -> Dgraph {
        let edgetab = if comm.rank() == 0 { vec![2, 3, 2, 3] } else { vec![0, 1, 0, 1] };
        Dgraph::build(comm, 0, 2, vec![0, 2, 4], edgetab, None, None).unwrap()
    }

    #[test]
    #[serial]
    fn remote_only_matching_covers_every_vertex() {
        for seed in 0..8 {
            let out = on_ranks(2, |c| {
                let g = cross_part(c);
                let p = DgraphCoarsenParam { rng_seed: seed, ..param() };
                let (mults, mates) = match_vertices(&g, c, &p, CoarsenCommTags::default()).unwrap();
                // Mates agree with the multinodes: no vertex left requesting.
                assert!(g.vertices().all(|v| matches!(mates[v as usize], Mate::Matched(_))));
                mults
            });
            assert_covering(&out, 4);
        }
    }

    #[test]
    #[serial]
    fn arrival_order_completion_covers_every_vertex() {
        let out = on_ranks(3, |c| {
            // Path 0-1-2-3-4-5 split in pairs, so every rank has remote edges.
            let r = c.rank() as Gnum;
            let (a, b) = (2 * r, 2 * r + 1);
            let mut verttab = vec![0];
            let mut edgetab = Vec::new();
            for v in [a, b] {
                for w in [v - 1, v + 1] {
                    if (0..6).contains(&w) {
                        edgetab.push(w);
                    }
                }
                verttab.push(edgetab.len() as Gnum);
            }
            let g = Dgraph::build(c, 0, 2, verttab, edgetab, None, None).unwrap();
            let p = DgraphCoarsenParam { deterministic: false, probval: 0.5, ..param() };
            match_vertices(&g, c, &p, CoarsenCommTags::default()).unwrap().0
        });
        assert_covering(&out, 6);
    }
}
