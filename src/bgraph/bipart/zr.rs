//! Zero method: move every vertex to part 0.

use super::BgraphMethodParam;
use crate::bgraph::Bgraph;
use crate::bipart_error::BipartError;
use crate::config::BipartContext;

pub fn bipart_zr(
    graph: &mut Bgraph<'_>,
    _param: &BgraphMethodParam,
    _ctx: &mut BipartContext,
) -> Result<(), BipartError> {
    if !graph.is_allocated() || graph.compload0 != graph.s.velosum() {
        graph.alloc()?;
        graph.zero();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug_invariants::DebugInvariants;
    use crate::graph::Graph;

    #[test]
    fn resets_partition() {
        let g = Graph::from_edges(3, &[(0, 1), (1, 2)]).unwrap();
        let mut b = Bgraph::new(&g);
        b.set_parts(&[1, 0, 1]).unwrap();
        bipart_zr(&mut b, &BgraphMethodParam::Zero, &mut BipartContext::new(0)).unwrap();
        assert_eq!(b.parts(), &[0, 0, 0]);
        assert_eq!(b.fronnbr(), 0);
        assert_eq!(b.commload(), 0);
        b.validate_invariants().unwrap();
    }
}
