//! Distributed coarsening.
//!
//! After matching, every multinode is owned by the rank that created it and
//! is numbered globally by the rank-ordered concatenation of the per-rank
//! multinode lists. Fine vertices whose mate lives on another rank and who
//! did not create the multinode ship their load and adjacency, already
//! renumbered in coarse numbers, to the creating rank.

use hashbrown::HashMap;

use crate::algs::collective::{allgather, allreduce_sum};
use crate::algs::communicator::{CoarsenCommTags, Communicator};
use crate::algs::size_exchange::{exchange_records, exchange_sizes};
use crate::algs::wire::WireGnum;
use crate::bipart_error::BipartError;
use crate::config::DgraphCoarsenParam;
use crate::dgraph::halo;
use crate::dgraph::matching::{match_vertices, Mate};
use crate::dgraph::Dgraph;
use crate::Gnum;

/// Fine global numbers of the vertices merged into one coarse vertex.
/// Both entries are equal for a singleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DgraphCoarsenMulti {
    pub vertglbnum: [Gnum; 2],
}

impl DgraphCoarsenMulti {
    pub fn is_singleton(&self) -> bool {
        self.vertglbnum[0] == self.vertglbnum[1]
    }
}

#[derive(Debug)]
pub enum DgraphCoarsenOutcome {
    /// Coarse graph plus the multinode of each coarse local vertex.
    Coarsened {
        graph: Dgraph,
        mults: Vec<DgraphCoarsenMulti>,
    },
    /// The graph is small enough, or matching did not shrink it enough.
    Refused,
}

/// Collectively coarsen `fine` with the default message tags.
pub fn coarsen<C: Communicator>(
    fine: &Dgraph,
    comm: &C,
    param: &DgraphCoarsenParam,
) -> Result<DgraphCoarsenOutcome, BipartError> {
    coarsen_with_tags(fine, comm, param, CoarsenCommTags::default())
}

pub fn coarsen_with_tags<C: Communicator>(
    fine: &Dgraph,
    comm: &C,
    param: &DgraphCoarsenParam,
    tags: CoarsenCommTags,
) -> Result<DgraphCoarsenOutcome, BipartError> {
    if fine.vertglbnbr() <= param.coarnbr {
        return Ok(DgraphCoarsenOutcome::Refused);
    }
    let (mults, mates) = match_vertices(fine, comm, param, tags)?;

    let coarvertlocnbr = mults.len() as Gnum;
    let counts = allgather(comm, tags.collective, coarvertlocnbr)?;
    let coarvertglbnbr: Gnum = counts.iter().sum();
    if coarvertglbnbr as f64 > param.coarrat * fine.vertglbnbr() as f64 {
        log::debug!(
            "rank {}: coarsening refused, {coarvertglbnbr} of {} vertices kept",
            fine.proclocnum(),
            fine.vertglbnbr()
        );
        return Ok(DgraphCoarsenOutcome::Refused);
    }
    let baseval = fine.baseval();
    let coarvertlocbas = baseval + counts[..fine.proclocnum()].iter().sum::<Gnum>();

    // Coarse number of every local and ghost vertex; -1 until known.
    let mut coargsttab: Vec<Gnum> = vec![-1; fine.vertgstnbr() as usize];
    for (i, m) in mults.iter().enumerate() {
        for glb in m.vertglbnum {
            if let Some(v) = fine.local_of(glb) {
                coargsttab[(v - baseval) as usize] = coarvertlocbas + i as Gnum;
            }
        }
    }
    halo::sync(fine, comm, tags.halo, &mut coargsttab)?;

    // Non-creators adopt the coarse number of their remote mate.
    let mut shipped: Vec<(Gnum, Gnum)> = Vec::new(); // (local vertex, mate ghost)
    for v in fine.vertices() {
        let slot = (v - baseval) as usize;
        if coargsttab[slot] >= 0 {
            continue;
        }
        let Mate::Matched(m) = mates[slot] else {
            return Err(BipartError::Internal(format!("vertex {v} left unmatched")));
        };
        let g = fine
            .edges(v)
            .map(|e| fine.edge_gst(e))
            .find(|&g| fine.global_of(g) == m)
            .ok_or_else(|| BipartError::Internal(format!("mate {m} of vertex {v} is not a neighbor")))?;
        let c = coargsttab[(g - baseval) as usize];
        if c < 0 {
            return Err(BipartError::Internal(format!("mate {m} of vertex {v} has no multinode")));
        }
        coargsttab[slot] = c;
        shipped.push((v, g));
    }
    halo::sync(fine, comm, tags.halo, &mut coargsttab)?;

    // Records: coarse number, load, degree, then (coarse end, edge load) pairs.
    let procngbtab = fine.procngbtab();
    let mut outgoing: Vec<Vec<WireGnum>> = vec![Vec::new(); procngbtab.len()];
    for &(v, g) in &shipped {
        let owner = fine.owner_of(fine.global_of(g));
        let j = procngbtab.partition_point(|&p| p < owner);
        let rec = &mut outgoing[j];
        rec.push(WireGnum::of(coargsttab[(v - baseval) as usize]));
        rec.push(WireGnum::of(fine.vertex_load(v)));
        let edges = fine.edges(v);
        rec.push(WireGnum::of(edges.end - edges.start));
        for e in edges {
            rec.push(WireGnum::of(coargsttab[(fine.edge_gst(e) - baseval) as usize]));
            rec.push(WireGnum::of(fine.edge_load(e)));
        }
    }
    let sizes: Vec<usize> = outgoing.iter().map(Vec::len).collect();
    let expected = exchange_sizes(comm, tags.count, procngbtab, &sizes)?;
    let incoming = exchange_records(comm, tags.data, procngbtab, &outgoing, Some(&expected))?;

    // Remote halves, keyed by coarse number.
    let mut remote: HashMap<Gnum, (Gnum, Vec<(Gnum, Gnum)>)> = HashMap::new();
    for (recs, &peer) in incoming.iter().zip(procngbtab) {
        let recs: Vec<Gnum> = recs.iter().map(WireGnum::get).collect();
        let mut k = 0;
        while k < recs.len() {
            let bad = || BipartError::comm(peer, "truncated coarse vertex record");
            let head: [Gnum; 3] = recs.get(k..k + 3).ok_or_else(bad)?.try_into().map_err(|_| bad())?;
            let [c, velo, degr] = head;
            let body = recs.get(k + 3..k + 3 + 2 * degr.max(0) as usize).ok_or_else(bad)?;
            if !(coarvertlocbas..coarvertlocbas + coarvertlocnbr).contains(&c) {
                return Err(BipartError::comm(peer, format!("coarse vertex {c} is not owned here")));
            }
            let entry = remote.entry(c).or_insert_with(|| (0, Vec::new()));
            entry.0 += velo;
            entry.1.extend(body.chunks_exact(2).map(|p| (p[0], p[1])));
            k += 3 + body.len();
        }
    }

    let mut verttab = Vec::with_capacity(mults.len() + 1);
    let mut edgetab = Vec::new();
    let mut velotab = Vec::with_capacity(mults.len());
    let mut edlotab = Vec::new();
    let mut adjtab: Vec<(Gnum, Gnum)> = Vec::new();
    verttab.push(baseval);
    for (i, m) in mults.iter().enumerate() {
        let c = coarvertlocbas + i as Gnum;
        adjtab.clear();
        let mut velo = 0;
        let members = if m.is_singleton() { &m.vertglbnum[..1] } else { &m.vertglbnum[..] };
        for &glb in members {
            if let Some(v) = fine.local_of(glb) {
                velo += fine.vertex_load(v);
                adjtab.extend(
                    fine.edges(v)
                        .map(|e| (coargsttab[(fine.edge_gst(e) - baseval) as usize], fine.edge_load(e))),
                );
            }
        }
        if let Some((rvelo, redges)) = remote.remove(&c) {
            velo += rvelo;
            adjtab.extend(redges);
        }
        adjtab.retain(|&(w, _)| w != c);
        adjtab.sort_unstable_by_key(|&(w, _)| w);
        for &(w, load) in adjtab.iter() {
            if edgetab.last() == Some(&w) && edgetab.len() as Gnum > verttab[i] - baseval {
                if let Some(l) = edlotab.last_mut() {
                    *l += load;
                }
            } else {
                edgetab.push(w);
                edlotab.push(load);
            }
        }
        velotab.push(velo);
        verttab.push(baseval + edgetab.len() as Gnum);
    }
    if !remote.is_empty() {
        return Err(BipartError::Internal("received halves of unknown multinodes".into()));
    }

    let graph = Dgraph::build(comm, baseval, coarvertlocnbr, verttab, edgetab, Some(velotab), Some(edlotab))?;
    let fineedges = allreduce_sum(comm, tags.collective, fine.edgelocnbr())?;
    log::debug!(
        "rank {}: coarsened {} -> {} vertices, {} -> {} edges",
        fine.proclocnum(),
        fine.vertglbnbr(),
        graph.vertglbnbr(),
        fineedges,
        graph.edgeglbnbr()
    );
    Ok(DgraphCoarsenOutcome::Coarsened { graph, mults })
}
