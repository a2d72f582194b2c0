//! Fiduccia–Mattheyses refinement.
//!
//! Each pass moves unlocked vertices one at a time, always taking the move
//! with the smallest communication increase among those that keep the load
//! imbalance inside the allowed window. Every moved vertex is locked for the
//! rest of the pass. A pass stops after `movenbr` moves without improvement;
//! the moves made after the best state seen are then undone.

use super::{BgraphMethodParam, FmParam};
use crate::bgraph::Bgraph;
use crate::bipart_error::BipartError;
use crate::config::BipartContext;
use crate::data::FiboHeap;
use crate::Gnum;

/// Gain queues of the two parts, keyed by `(gain, vertex)`.
struct GainQueues {
    heaps: [FiboHeap<(Gnum, Gnum)>; 2],
    base: Gnum,
}

impl GainQueues {
    fn new(vertnbr: usize, base: Gnum) -> Self {
        GainQueues {
            heaps: [FiboHeap::new(vertnbr), FiboHeap::new(vertnbr)],
            base,
        }
    }

    fn item(&self, v: Gnum) -> usize {
        (v - self.base) as usize
    }

    fn set(&mut self, graph: &Bgraph<'_>, v: Gnum) {
        let item = self.item(v);
        let part = graph.parttax[v] as usize;
        let key = (graph.move_gain(v), v);
        let other = &mut self.heaps[1 - part];
        if other.contains(item) {
            other.del(item);
        }
        let heap = &mut self.heaps[part];
        if heap.contains(item) {
            heap.update(item, key);
        } else {
            heap.add(item, key);
        }
    }

    fn remove(&mut self, v: Gnum) {
        let item = self.item(v);
        for heap in &mut self.heaps {
            if heap.contains(item) {
                heap.del(item);
            }
        }
    }

    fn clear(&mut self) {
        for heap in &mut self.heaps {
            heap.clear();
        }
    }
}

/// Score of a state: states inside the window beat states outside it, then
/// lower communication load, then lower imbalance.
fn score(graph: &Bgraph<'_>, deltmax: Gnum) -> (bool, Gnum, Gnum) {
    let dlt = graph.compload0dlt.abs();
    if dlt <= deltmax {
        (false, graph.commload, dlt)
    } else {
        (true, dlt, graph.commload)
    }
}

pub fn bipart_fm(
    graph: &mut Bgraph<'_>,
    param: &BgraphMethodParam,
    _ctx: &mut BipartContext,
) -> Result<(), BipartError> {
    let BgraphMethodParam::Fm(param) = param else {
        return Err(BgraphMethodParam::mismatch("f"));
    };
    let FmParam {
        movenbr,
        passnbr,
        deltrat,
    } = *param;
    if !graph.is_allocated() {
        graph.alloc()?;
        graph.zero();
    }
    let deltmax = ((deltrat * graph.compload0avg as f64) as Gnum).max(graph.compload0dlt.abs());
    let base = graph.s.baseval();
    let vertnbr = graph.s.vertnbr() as usize;
    let mut queues = GainQueues::new(vertnbr, base);
    let mut locked = vec![false; vertnbr];
    let mut swaps: Vec<Gnum> = Vec::new();
    swaps
        .try_reserve(vertnbr)
        .map_err(|_| BipartError::OutOfMemory("move log"))?;

    let mut passnum = 0;
    while passnbr < 0 || passnum < passnbr {
        passnum += 1;
        let initial = score(graph, deltmax);
        let mut best = initial;
        let mut bestmove = 0;
        swaps.clear();
        locked.fill(false);
        queues.clear();
        let frontier: Vec<Gnum> = graph.frontier().to_vec();
        for v in frontier {
            queues.set(graph, v);
        }

        loop {
            if (swaps.len() - bestmove) as Gnum > movenbr {
                break;
            }
            let Some(v) = pick_move(graph, &queues, deltmax) else {
                break;
            };
            queues.remove(v);
            locked[(v - base) as usize] = true;
            graph.flip(v);
            swaps.push(v);
            for e in graph.s.edges(v) {
                let w = graph.s.edge_end(e);
                if !locked[(w - base) as usize] {
                    queues.set(graph, w);
                }
            }
            let now = score(graph, deltmax);
            if now < best {
                best = now;
                bestmove = swaps.len();
            }
        }

        for &v in swaps[bestmove..].iter().rev() {
            graph.flip(v);
        }
        graph.rebuild_frontier();
        log::trace!(
            "fm pass {passnum}: {} moves kept, commload {}",
            bestmove,
            graph.commload
        );
        if best >= initial || bestmove == 0 {
            break;
        }
    }
    graph.cost();
    Ok(())
}

/// Best admissible move: the lower gain of the two queue heads whose move
/// keeps the imbalance within `deltmax`, or reduces it when already outside.
fn pick_move(graph: &Bgraph<'_>, queues: &GainQueues, deltmax: Gnum) -> Option<Gnum> {
    let dlt = graph.compload0dlt;
    let mut choice: Option<((Gnum, Gnum), Gnum)> = None;
    for (part, heap) in queues.heaps.iter().enumerate() {
        let Some((_, (gain, v))) = heap.min() else {
            continue;
        };
        let load = graph.s.vertex_load(v);
        let newdlt = if part == 0 { dlt - load } else { dlt + load };
        let admissible = newdlt.abs() <= deltmax || newdlt.abs() < dlt.abs();
        if !admissible {
            continue;
        }
        let key = (gain, newdlt.abs());
        if choice.is_none_or(|(k, _)| key < k) {
            choice = Some((key, v));
        }
    }
    choice.map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug_invariants::DebugInvariants;
    use crate::graph::Graph;

    fn two_cliques() -> Graph {
        // Two 4-cliques {0..3} and {4..7} joined by the edge 3-4.
        let mut edges = Vec::new();
        for base in [0, 4] {
            for i in 0..4 {
                for j in i + 1..4 {
                    edges.push((base + i, base + j));
                }
            }
        }
        edges.push((3, 4));
        Graph::from_edges(8, &edges).unwrap()
    }

    #[test]
    fn finds_the_bridge_cut() {
        let g = two_cliques();
        let mut b = Bgraph::new(&g);
        b.set_parts(&[0, 0, 1, 1, 0, 0, 1, 1]).unwrap();
        let before = b.commload();
        let param = BgraphMethodParam::Fm(FmParam {
            deltrat: 0.25,
            ..FmParam::default()
        });
        bipart_fm(&mut b, &param, &mut BipartContext::new(0)).unwrap();
        assert!(b.commload() < before);
        assert_eq!(b.commload(), 1);
        assert_eq!(b.compload0dlt(), 0);
        b.validate_invariants().unwrap();
    }

    #[test]
    fn never_worsens_a_good_partition() {
        let g = two_cliques();
        let mut b = Bgraph::new(&g);
        b.set_parts(&[0, 0, 0, 0, 1, 1, 1, 1]).unwrap();
        bipart_fm(&mut b, &BgraphMethodParam::Fm(FmParam::default()), &mut BipartContext::new(0)).unwrap();
        assert_eq!(b.parts(), &[0, 0, 0, 0, 1, 1, 1, 1]);
        assert_eq!(b.commload(), 1);
    }

    #[test]
    fn rejects_foreign_parameters() {
        let g = two_cliques();
        let mut b = Bgraph::new(&g);
        b.zero();
        assert!(matches!(
            bipart_fm(&mut b, &BgraphMethodParam::Zero, &mut BipartContext::new(0)),
            Err(BipartError::InvalidParameter(_))
        ));
    }
}
