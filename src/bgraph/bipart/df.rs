//! Diffusion bipartitioning.
//!
//! Each vertex carries a value, `+1` in part 0 and `-1` in part 1, that is
//! repeatedly replaced by a weighted average of itself and its neighbors.
//! Vertices are then ranked by value and part 0 receives the highest ranked
//! ones until it reaches its target load.

use rand::Rng;

use super::{BgraphMethodParam, DiffusionParam};
use crate::bgraph::Bgraph;
use crate::bipart_error::BipartError;
use crate::config::BipartContext;
use crate::Gnum;

pub fn bipart_df(
    graph: &mut Bgraph<'_>,
    param: &BgraphMethodParam,
    ctx: &mut BipartContext,
) -> Result<(), BipartError> {
    let BgraphMethodParam::Diffusion(DiffusionParam {
        passnbr,
        cdifval,
        cremval,
    }) = *param
    else {
        return Err(BgraphMethodParam::mismatch("d"));
    };
    if !graph.is_allocated() {
        graph.alloc()?;
        graph.zero();
    }
    let vertnbr = graph.s.vertnbr();
    if vertnbr == 0 {
        return Ok(());
    }
    let base = graph.s.baseval();
    let idx = |v: Gnum| (v - base) as usize;

    let mut diffval = Vec::new();
    diffval
        .try_reserve_exact(vertnbr as usize)
        .map_err(|_| BipartError::OutOfMemory("diffusion values"))?;
    if graph.compsize0 == 0 || graph.compsize0 == vertnbr {
        // No split to start from: diffuse out of a single random source.
        let source = ctx.rng.gen_range(base..base + vertnbr);
        diffval.extend(graph.s.vertices().map(|v| if v == source { 1.0 } else { 0.0 }));
    } else {
        diffval.extend(
            graph
                .s
                .vertices()
                .map(|v| if graph.parttax[v] == 0 { 1.0 } else { -1.0 }),
        );
    }
    let mut nextval = diffval.clone();

    for _ in 0..passnbr {
        for v in graph.s.vertices() {
            let own = cremval * graph.s.vertex_load(v) as f64;
            let mut sum = own * diffval[idx(v)];
            let mut wgt = own;
            for (w, load) in graph.s.neighbors(v) {
                sum += cdifval * load as f64 * diffval[idx(w)];
                wgt += cdifval * load as f64;
            }
            nextval[idx(v)] = if wgt > 0.0 { sum / wgt } else { diffval[idx(v)] };
        }
        std::mem::swap(&mut diffval, &mut nextval);
    }

    let mut order: Vec<Gnum> = graph.s.vertices().collect();
    order.sort_by(|&a, &b| diffval[idx(b)].total_cmp(&diffval[idx(a)]).then(a.cmp(&b)));
    graph.parttax.fill(1);
    let target = graph.compload0avg;
    let mut load0 = 0;
    for v in order {
        if load0 >= target {
            break;
        }
        let load = graph.s.vertex_load(v);
        if (load0 + load - target).abs() <= (load0 - target).abs() {
            graph.parttax[v] = 0;
            load0 += load;
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

    fn two_cliques() -> Graph {
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
    fn smooths_out_misplaced_vertices() {
        let g = two_cliques();
        let mut b = Bgraph::new(&g);
        b.set_parts(&[0, 0, 0, 1, 1, 1, 1, 0]).unwrap();
        let param = BgraphMethodParam::Diffusion(DiffusionParam::default());
        bipart_df(&mut b, &param, &mut BipartContext::new(0)).unwrap();
        assert_eq!(b.parts(), &[0, 0, 0, 0, 1, 1, 1, 1]);
        assert_eq!(b.commload(), 1);
        b.validate_invariants().unwrap();
    }

    #[test]
    fn unsplit_graph_reaches_target_load() {
        let edges: Vec<_> = (0..9).map(|i| (i, i + 1)).collect();
        let g = Graph::from_edges(10, &edges).unwrap();
        let mut b = Bgraph::new(&g);
        let param = BgraphMethodParam::Diffusion(DiffusionParam::default());
        bipart_df(&mut b, &param, &mut BipartContext::new(4)).unwrap();
        assert_eq!(b.compload0(), 5);
        b.validate_invariants().unwrap();
    }
}
