//! Exact balancing.
//!
//! Vertices of the heavier part are moved to the lighter one, cheapest
//! communication increase first, as long as each move strictly reduces the
//! load imbalance. Vertices whose move would overshoot are skipped. The
//! method fails when the part-0 load still lies outside the tolerance window
//! afterwards; the partial improvement is kept.

use super::BgraphMethodParam;
use crate::bgraph::Bgraph;
use crate::bipart_error::BipartError;
use crate::config::BipartContext;
use crate::data::FiboHeap;
use crate::Gnum;

pub fn bipart_ex(
    graph: &mut Bgraph<'_>,
    _param: &BgraphMethodParam,
    _ctx: &mut BipartContext,
) -> Result<(), BipartError> {
    if !graph.is_allocated() {
        graph.alloc()?;
        graph.zero();
    }
    if graph.compload0dlt == 0 {
        return Ok(());
    }
    let base = graph.s.baseval();
    let heavy = if graph.compload0dlt > 0 { 0 } else { 1 };
    let mut heap: FiboHeap<(Gnum, Gnum)> = FiboHeap::new(graph.s.vertnbr() as usize);
    for v in graph.s.vertices() {
        if graph.parttax[v] == heavy {
            heap.add((v - base) as usize, (graph.move_gain(v), v));
        }
    }

    let mut movenbr = 0;
    while let Some((_, (_, v))) = heap.pop_min() {
        if graph.compload0dlt == 0 {
            break;
        }
        let load = graph.s.vertex_load(v);
        let newdlt = if heavy == 0 {
            graph.compload0dlt - load
        } else {
            graph.compload0dlt + load
        };
        if newdlt.abs() >= graph.compload0dlt.abs() {
            continue;
        }
        graph.flip(v);
        movenbr += 1;
        for e in graph.s.edges(v) {
            let w = graph.s.edge_end(e);
            let item = (w - base) as usize;
            if heap.contains(item) {
                heap.update(item, (graph.move_gain(w), w));
            }
        }
    }
    graph.cost();
    log::trace!("exact balancing moved {movenbr} vertices, imbalance now {}", graph.compload0dlt);
    if !(graph.compload0min..=graph.compload0max).contains(&graph.compload0) {
        return Err(BipartError::MethodFailed {
            method: "x",
            reason: format!(
                "part 0 load {} outside [{}, {}]",
                graph.compload0, graph.compload0min, graph.compload0max
            ),
        });
    }
    Ok(())
}
