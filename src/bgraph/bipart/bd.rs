//! Band refinement.
//!
//! The vertices within `distmax` edges of the frontier are extracted into a
//! band graph. Everything outside the band is folded into two anchor
//! vertices, one per part, which carry the outside loads and are linked to
//! the band vertices of the outermost layer. The `bnd` strategy is applied to
//! the band graph and its result projected back, unless it moved an anchor,
//! in which case the `org` strategy is applied to the whole graph instead.

use std::collections::VecDeque;

use super::st::bipart_st;
use super::{BandParam, BgraphMethodParam};
use crate::bgraph::Bgraph;
use crate::bipart_error::BipartError;
use crate::config::BipartContext;
use crate::debug_invariants::DebugInvariants;
use crate::graph::Graph;
use crate::Gnum;

/// Band graph and the fine vertex of each band vertex, anchors excluded.
struct Band {
    graph: Graph,
    veex: Option<Vec<Gnum>>,
    vnumtab: Vec<Gnum>,
}

fn build_band(fine: &Bgraph<'_>, distmax: Gnum) -> Result<Band, BipartError> {
    let src = fine.graph();
    let base = src.baseval();
    let vertnbr = src.vertnbr() as usize;
    let mut bandnum = vec![-1; vertnbr];
    let mut levels = vec![0; vertnbr];
    let mut vnumtab = Vec::new();
    vnumtab
        .try_reserve(fine.frontier().len())
        .map_err(|_| BipartError::OutOfMemory("band vertex list"))?;
    let mut queue: VecDeque<Gnum> = fine.frontier().iter().copied().collect();
    for &v in fine.frontier() {
        bandnum[(v - base) as usize] = base + vnumtab.len() as Gnum;
        vnumtab.push(v);
    }
    while let Some(v) = queue.pop_front() {
        let levl = levels[(v - base) as usize];
        if levl >= distmax {
            continue;
        }
        for w in src.edges(v).map(|e| src.edge_end(e)) {
            let slot = &mut bandnum[(w - base) as usize];
            if *slot < 0 {
                *slot = base + vnumtab.len() as Gnum;
                levels[(w - base) as usize] = levl + 1;
                vnumtab.push(w);
                queue.push_back(w);
            }
        }
    }

    let bandnbr = vnumtab.len();
    let anchor = |p: u8| base + bandnbr as Gnum + p as Gnum;
    let mut velotab = Vec::with_capacity(bandnbr + 2);
    let mut verttab = Vec::with_capacity(bandnbr + 2);
    let mut vendtab = Vec::with_capacity(bandnbr + 2);
    let mut edgetab = Vec::new();
    let mut edlotab = Vec::new();
    let mut anchedges: [Vec<(Gnum, Gnum)>; 2] = [Vec::new(), Vec::new()];
    let mut bandload = [0; 2];
    let mut bandveex = [0; 2];

    for (i, &v) in vnumtab.iter().enumerate() {
        let p = fine.part(v);
        let load = src.vertex_load(v);
        velotab.push(load);
        bandload[p as usize] += load;
        bandveex[p as usize] += fine.external_gain(v);
        verttab.push(base + edgetab.len() as Gnum);
        let mut outload = 0;
        for (w, edlo) in src.neighbors(v) {
            let bw = bandnum[(w - base) as usize];
            if bw >= 0 {
                edgetab.push(bw);
                edlotab.push(edlo);
            } else {
                outload += edlo;
            }
        }
        if outload > 0 {
            edgetab.push(anchor(p));
            edlotab.push(outload);
            anchedges[p as usize].push((base + i as Gnum, outload));
        }
        vendtab.push(base + edgetab.len() as Gnum);
    }
    let totload = [fine.compload0(), fine.compload1()];
    for p in 0..2 {
        velotab.push(totload[p] - bandload[p]);
        verttab.push(base + edgetab.len() as Gnum);
        for &(bv, edlo) in &anchedges[p] {
            edgetab.push(bv);
            edlotab.push(edlo);
        }
        vendtab.push(base + edgetab.len() as Gnum);
    }

    let veex = fine.has_external_gains().then(|| {
        let mut veex: Vec<Gnum> = vnumtab.iter().map(|&v| fine.external_gain(v)).collect();
        let fulveex: [Gnum; 2] = src.vertices().fold([0, 0], |mut acc, v| {
            acc[fine.part(v) as usize] += fine.external_gain(v);
            acc
        });
        veex.push(fulveex[0] - bandveex[0]);
        veex.push(fulveex[1] - bandveex[1]);
        veex
    });

    Ok(Band {
        graph: Graph::from_parts(base, verttab, vendtab, velotab, edgetab, edlotab),
        veex,
        vnumtab,
    })
}

pub fn bipart_bd(
    graph: &mut Bgraph<'_>,
    param: &BgraphMethodParam,
    ctx: &mut BipartContext,
) -> Result<(), BipartError> {
    let BgraphMethodParam::Band(BandParam { distmax, bnd, org }) = param else {
        return Err(BgraphMethodParam::mismatch("b"));
    };
    if !graph.is_allocated() {
        graph.alloc()?;
        graph.zero();
    }
    if graph.fronnbr() == 0 {
        log::trace!("band: empty frontier, applying original strategy");
        return bipart_st(graph, org, ctx);
    }

    let band = build_band(graph, *distmax)?;
    let bandnbr = band.vnumtab.len();
    let mut parts: Vec<u8> = band.vnumtab.iter().map(|&v| graph.part(v)).collect();
    parts.extend([0, 1]);

    let mut bgraph = Bgraph::from_owned(band.graph);
    if let Some(veex) = band.veex {
        bgraph = bgraph.with_external_gains(veex)?;
    }
    bgraph.compload0avg = graph.compload0avg;
    bgraph.compload0min = graph.compload0min;
    bgraph.compload0max = graph.compload0max;
    bgraph.commloadextn0 = graph.commloadextn0;
    bgraph.commgainextn0 = graph.commgainextn0;
    bgraph.domdist = graph.domdist;
    bgraph.domwght = graph.domwght;
    bgraph.bbalval = graph.bbalval;
    bgraph.levlnum = graph.levlnum;
    bgraph.set_parts(&parts)?;
    debug_assert_eq!(bgraph.commload, graph.commload);
    log::trace!(
        "band of {bandnbr} vertices out of {} at level {}",
        graph.graph().vertnbr(),
        graph.levlnum
    );

    bipart_st(&mut bgraph, bnd, ctx)?;

    let base = bgraph.graph().baseval();
    let anchor0 = base + bandnbr as Gnum;
    if bgraph.part(anchor0) != 0 || bgraph.part(anchor0 + 1) != 1 {
        log::trace!("band: anchors moved, applying original strategy");
        return bipart_st(graph, org, ctx);
    }
    for (i, &v) in band.vnumtab.iter().enumerate() {
        graph.parttax[v] = bgraph.part(base + i as Gnum);
    }
    graph.cost();
    graph.debug_assert_invariants();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgraph::bipart::{default_tab, FmParam};
    use crate::strategy::Strat;
    use std::sync::Arc;

    fn ladder(n: Gnum) -> Graph {
        // Two rails of n vertices joined by rungs.
        let mut edges = Vec::new();
        for i in 0..n {
            edges.push((i, n + i));
            if i + 1 < n {
                edges.push((i, i + 1));
                edges.push((n + i, n + i + 1));
            }
        }
        Graph::from_edges(2 * n as usize, &edges).unwrap()
    }

    fn fm_strat() -> Arc<Strat<BgraphMethodParam>> {
        let tab = default_tab();
        Arc::new(Strat::Method {
            meth: tab.method_index("f").unwrap(),
            name: "f",
            data: BgraphMethodParam::Fm(FmParam {
                deltrat: 0.1,
                ..FmParam::default()
            }),
        })
    }

    #[test]
    fn band_graph_keeps_total_load() {
        let g = ladder(10);
        let mut b = Bgraph::new(&g);
        let parts: Vec<u8> = (0..20).map(|v| u8::from(v % 10 >= 5)).collect();
        b.set_parts(&parts).unwrap();
        let band = build_band(&b, 1).unwrap();
        // Frontier 4,5,14,15 plus one layer on each side.
        assert_eq!(band.vnumtab.len(), 8);
        assert_eq!(band.graph.vertnbr(), 10);
        assert_eq!(band.graph.velosum(), 20);
        band.graph.validate_invariants().unwrap();
    }

    #[test]
    fn refines_inside_the_band() {
        let g = ladder(10);
        let mut b = Bgraph::new(&g);
        // Jagged cut: the top rail splits after column 3, the bottom one after column 5.
        let parts: Vec<u8> = (0..20)
            .map(|v| if v < 10 { u8::from(v >= 4) } else { u8::from(v - 10 >= 6) })
            .collect();
        b.set_parts(&parts).unwrap();
        let param = BgraphMethodParam::Band(BandParam {
            distmax: 3,
            bnd: fm_strat(),
            org: Strat::empty(),
        });
        bipart_bd(&mut b, &param, &mut BipartContext::new(0)).unwrap();
        assert_eq!(b.commload(), 2);
        assert_eq!(b.compload0dlt(), 0);
        b.validate_invariants().unwrap();
    }

    #[test]
    fn empty_frontier_runs_original_strategy() {
        let g = ladder(4);
        let mut b = Bgraph::new(&g);
        b.zero();
        let tab = default_tab();
        let org = Arc::new(Strat::Method {
            meth: tab.method_index("h").unwrap(),
            name: "h",
            data: BgraphMethodParam::GreedyGrow(Default::default()),
        });
        let param = BgraphMethodParam::Band(BandParam {
            distmax: 3,
            bnd: Strat::empty(),
            org,
        });
        bipart_bd(&mut b, &param, &mut BipartContext::new(0)).unwrap();
        assert_eq!(b.compload0(), 4);
        b.validate_invariants().unwrap();
    }
}
