//! Gibbs–Poole–Stockmeyer style bipartitioning.
//!
//! A pseudo-peripheral vertex is found by repeated breadth-first sweeps, each
//! restarted from a minimum-degree vertex of the last level reached. Part 0
//! is then filled in breadth-first order from that vertex until it reaches
//! its target load, moving on to further components when one is exhausted.

use std::collections::VecDeque;

use rand::Rng;

use super::{BgraphMethodParam, GpsParam};
use crate::bgraph::Bgraph;
use crate::bipart_error::BipartError;
use crate::config::BipartContext;
use crate::Gnum;

/// Breadth-first sweep from `root`; returns the last level reached.
fn sweep(graph: &Bgraph<'_>, root: Gnum, levels: &mut [Gnum], queue: &mut VecDeque<Gnum>) -> Vec<Gnum> {
    let base = graph.s.baseval();
    levels.fill(-1);
    queue.clear();
    levels[(root - base) as usize] = 0;
    queue.push_back(root);
    let mut last = Vec::new();
    let mut lastlevl = 0;
    while let Some(v) = queue.pop_front() {
        let levl = levels[(v - base) as usize];
        if levl > lastlevl {
            lastlevl = levl;
            last.clear();
        }
        if levl == lastlevl {
            last.push(v);
        }
        for e in graph.s.edges(v) {
            let w = graph.s.edge_end(e);
            let slot = &mut levels[(w - base) as usize];
            if *slot < 0 {
                *slot = levl + 1;
                queue.push_back(w);
            }
        }
    }
    last
}

pub fn bipart_gp(
    graph: &mut Bgraph<'_>,
    param: &BgraphMethodParam,
    ctx: &mut BipartContext,
) -> Result<(), BipartError> {
    let BgraphMethodParam::Gps(GpsParam { passnbr }) = param else {
        return Err(BgraphMethodParam::mismatch("g"));
    };
    graph.alloc()?;
    let vertnbr = graph.s.vertnbr();
    if vertnbr == 0 {
        graph.zero();
        return Ok(());
    }
    let base = graph.s.baseval();
    let mut levels = vec![-1; vertnbr as usize];
    let mut queue = VecDeque::new();

    let mut root = ctx.rng.gen_range(base..base + vertnbr);
    let mut diameter = 0;
    for _ in 0..*passnbr {
        let last = sweep(graph, root, &mut levels, &mut queue);
        let depth = levels[(last[0] - base) as usize];
        if depth <= diameter && diameter > 0 {
            break;
        }
        diameter = depth;
        root = last
            .iter()
            .copied()
            .min_by_key(|&v| (graph.s.degree(v), v))
            .unwrap_or(root);
    }
    log::trace!("gp root {root}, eccentricity {diameter}");

    graph.parttax.fill(1);
    let mut load0 = 0;
    let target = graph.compload0avg;
    let mut visited = vec![false; vertnbr as usize];
    let mut roots = std::iter::once(root).chain(graph.s.vertices());
    queue.clear();
    'fill: while load0 < target {
        let v = match queue.pop_front() {
            Some(v) => v,
            None => loop {
                match roots.next() {
                    Some(r) if !visited[(r - base) as usize] => {
                        visited[(r - base) as usize] = true;
                        break r;
                    }
                    Some(_) => continue,
                    None => break 'fill,
                }
            },
        };
        let load = graph.s.vertex_load(v);
        if (load0 + load - target).abs() > (load0 - target).abs() {
            continue;
        }
        graph.parttax[v] = 0;
        load0 += load;
        for e in graph.s.edges(v) {
            let w = graph.s.edge_end(e);
            let seen = &mut visited[(w - base) as usize];
            if !*seen {
                *seen = true;
                queue.push_back(w);
            }
        }
    }
    graph.cost();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug_invariants::DebugInvariants;
    use crate::graph::Graph;

    #[test]
    fn path_is_cut_once() {
        let edges: Vec<_> = (0..11).map(|i| (i, i + 1)).collect();
        let g = Graph::from_edges(12, &edges).unwrap();
        let mut b = Bgraph::new(&g);
        bipart_gp(&mut b, &BgraphMethodParam::Gps(GpsParam::default()), &mut BipartContext::new(9)).unwrap();
        assert_eq!(b.compload0(), 6);
        assert_eq!(b.commload(), 1);
        b.validate_invariants().unwrap();
    }

    #[test]
    fn fills_across_components() {
        // Two triangles, target load 3 fits in one of them.
        let g = Graph::from_edges(6, &[(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3)]).unwrap();
        let mut b = Bgraph::new(&g);
        bipart_gp(&mut b, &BgraphMethodParam::Gps(GpsParam::default()), &mut BipartContext::new(1)).unwrap();
        assert_eq!(b.compload0(), 3);
        assert_eq!(b.commload(), 0);
        b.validate_invariants().unwrap();
    }
}
