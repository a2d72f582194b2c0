//! Multilevel bipartitioning.
//!
//! The active graph is coarsened recursively until coarsening is refused;
//! the coarsest graph is bipartitioned with the `low` strategy, then every
//! level projects the coarse bipartition back and refines it with the `asc`
//! strategy.
//!
//! Coarse graphs borrow the frontier buffer of the next finer level, and give
//! it back, rewritten as the fine frontier, on projection.

use super::st::bipart_st;
use super::{BgraphMethodParam, MlParam};
use crate::bgraph::{Bgraph, FrontierBuf};
use crate::bipart_error::BipartError;
use crate::config::BipartContext;
use crate::debug_invariants::DebugInvariants;
use crate::graph::coarsen::{self as graph_coarsen, CoarsenMulti, CoarsenOutcome};
use crate::graph::BasedVec;
use crate::Gnum;

/// Build the next coarser active graph, or `None` when coarsening is refused.
///
/// The coarse graph has no partition yet; it inherits the target loads,
/// external loads and domain data of `fine`, the merged external gains of its
/// multinodes, and `fine`'s frontier buffer.
pub fn coarsen(
    fine: &mut Bgraph<'_>,
    param: &MlParam,
    ctx: &mut BipartContext,
) -> Result<Option<(Bgraph<'static>, Vec<CoarsenMulti>)>, BipartError> {
    if fine.levlnum >= ctx.levlmax {
        log::debug!("level {} reached the recursion cap", fine.levlnum);
        return Ok(None);
    }
    let (graph, mults) = match graph_coarsen::coarsen(
        &fine.s,
        param.coarnbr,
        param.coarrat,
        param.matchtype,
        &mut ctx.rng,
    )? {
        CoarsenOutcome::Coarsened { graph, mults } => (graph, mults),
        CoarsenOutcome::Refused => return Ok(None),
    };

    let veextax = match &fine.veextax {
        None => None,
        Some(fineveex) => {
            let mut coarveex = Vec::new();
            coarveex
                .try_reserve_exact(mults.len())
                .map_err(|_| BipartError::OutOfMemory("coarse external gains"))?;
            coarveex.extend(mults.iter().map(|m| {
                if m.is_single() {
                    fineveex[m.vertnum[0]]
                } else {
                    fineveex[m.vertnum[0]] + fineveex[m.vertnum[1]]
                }
            }));
            Some(BasedVec::from_vec(graph.baseval(), coarveex))
        }
    };

    let mut coarse = Bgraph::from_owned(graph);
    coarse.veextax = veextax;
    coarse.frontab = FrontierBuf::Owned(fine.frontab.lend());
    coarse.compload0avg = fine.compload0avg;
    coarse.compload0min = fine.compload0min;
    coarse.compload0max = fine.compload0max;
    coarse.compload0dlt = coarse.compload0 - coarse.compload0avg;
    coarse.commloadextn0 = fine.commloadextn0;
    coarse.commgainextn0 = fine.commgainextn0;
    coarse.commload = fine.commloadextn0;
    coarse.commgainextn = fine.commgainextn0;
    coarse.domdist = fine.domdist;
    coarse.domwght = fine.domwght;
    coarse.bbalval = fine.bbalval;
    coarse.levlnum = fine.levlnum + 1;
    Ok(Some((coarse, mults)))
}

/// Project the bipartition of `coarse` onto `fine`, or reset `fine` to part 0
/// when there is no coarse graph.
///
/// The coarse frontier buffer is rewritten in place as the fine frontier and
/// handed back to `fine`.
pub fn uncoarsen(
    fine: &mut Bgraph<'_>,
    coarse: Option<&mut Bgraph<'_>>,
    mults: &[CoarsenMulti],
) -> Result<(), BipartError> {
    fine.alloc_parts()?;
    let Some(coarse) = coarse else {
        fine.alloc()?;
        fine.zero();
        return Ok(());
    };

    let base = coarse.s.baseval();
    let mut finecompsize1 = coarse.s.vertnbr() - coarse.compsize0;
    for (i, m) in mults.iter().enumerate() {
        let partval = coarse.parttax[base + i as Gnum];
        fine.parttax[m.vertnum[0]] = partval;
        if !m.is_single() {
            fine.parttax[m.vertnum[1]] = partval;
            finecompsize1 += partval as Gnum;
        }
    }
    fine.compload0 = coarse.compload0;
    fine.compload0dlt = coarse.compload0dlt;
    fine.compsize0 = fine.s.vertnbr() - finecompsize1;
    fine.commload = coarse.commload;
    fine.commgainextn = coarse.commgainextn;

    let mut frontab = coarse.frontab.take();
    let coarfronnbr = frontab.len();
    for fronnum in 0..coarfronnbr {
        let coarvertnum = frontab[fronnum];
        let m = mults[(coarvertnum - base) as usize];
        if m.is_single() {
            frontab[fronnum] = m.vertnum[0];
            continue;
        }
        let partval = coarse.parttax[coarvertnum];
        let crosses = |v: Gnum| {
            fine.s
                .edges(v)
                .any(|e| fine.parttax[fine.s.edge_end(e)] != partval)
        };
        if crosses(m.vertnum[0]) {
            frontab[fronnum] = m.vertnum[0];
            if crosses(m.vertnum[1]) {
                frontab.push(m.vertnum[1]);
            }
        } else {
            frontab[fronnum] = m.vertnum[1];
        }
    }
    fine.frontab.reclaim(frontab);
    fine.debug_assert_invariants();
    Ok(())
}

fn ml2(graph: &mut Bgraph<'_>, param: &MlParam, ctx: &mut BipartContext) -> Result<(), BipartError> {
    match coarsen(graph, param, ctx)? {
        Some((mut coarse, mults)) => {
            log::debug!(
                "level {}: {} vertices coarsened to {}",
                graph.levlnum,
                graph.s.vertnbr(),
                coarse.s.vertnbr()
            );
            let o = ml2(&mut coarse, param, ctx);
            if coarse.is_allocated() {
                uncoarsen(graph, Some(&mut coarse), &mults)?;
            } else {
                graph.frontab.reclaim(coarse.frontab.take());
                uncoarsen(graph, None, &[])?;
            }
            o?;
            bipart_st(graph, &param.asc, ctx).inspect_err(|e| {
                log::warn!("level {}: cannot apply ascending strategy: {e}", graph.levlnum)
            })
        }
        None => {
            uncoarsen(graph, None, &[])?;
            bipart_st(graph, &param.low, ctx).inspect_err(|e| {
                log::warn!("level {}: cannot apply low strategy: {e}", graph.levlnum)
            })
        }
    }
}

/// Multilevel method entry point.
pub fn bipart_ml(
    graph: &mut Bgraph<'_>,
    param: &BgraphMethodParam,
    ctx: &mut BipartContext,
) -> Result<(), BipartError> {
    let BgraphMethodParam::Ml(param) = param else {
        return Err(BgraphMethodParam::mismatch("m"));
    };
    let levlnum = graph.levlnum;
    graph.levlnum = 0;
    let o = ml2(graph, param, ctx);
    graph.levlnum = levlnum;
    o
}
