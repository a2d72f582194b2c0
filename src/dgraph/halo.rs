//! Halo exchange: copy the values of local vertices to the ranks that see
//! them as ghosts.

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::size_exchange::exchange_records;
use crate::algs::wire::WireGnum;
use crate::bipart_error::BipartError;
use crate::dgraph::Dgraph;
use crate::Gnum;

/// Fill the ghost entries of `values` from their owners.
///
/// `values` is indexed by local-or-ghost number minus the base value and
/// must hold `vertgstnbr` entries. Local entries are sent, ghost entries
/// are overwritten.
pub fn sync<C: Communicator>(
    graph: &Dgraph,
    comm: &C,
    tag: CommTag,
    values: &mut [Gnum],
) -> Result<(), BipartError> {
    if values.len() as Gnum != graph.vertgstnbr() {
        return Err(BipartError::InvalidParameter(format!(
            "halo array has {} entries, expected {}",
            values.len(),
            graph.vertgstnbr()
        )));
    }
    let baseval = graph.baseval();
    let outgoing: Vec<Vec<WireGnum>> = graph
        .procsndtab()
        .iter()
        .map(|list| list.iter().map(|&v| WireGnum::of(values[(v - baseval) as usize])).collect())
        .collect();
    let expected: Vec<usize> = graph
        .procrcvtab()
        .iter()
        .map(|r| (r.end - r.start) as usize)
        .collect();
    let incoming = exchange_records(comm, tag, graph.procngbtab(), &outgoing, Some(&expected))?;
    for (range, recs) in graph.procrcvtab().iter().zip(incoming) {
        let slots = &mut values[(range.start - baseval) as usize..(range.end - baseval) as usize];
        for (slot, rec) in slots.iter_mut().zip(recs) {
            *slot = rec.get();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dgraph::tests::{cycle_part, on_ranks};
    use serial_test::serial;

    #[test]
    #[serial]
    fn ghosts_receive_owner_values() {
        let tag = CommTag::new(0x300);
        let out = on_ranks(2, |c| {
            let g = cycle_part(c);
            // Each local vertex publishes ten times its global number.
            let mut vals: Vec<Gnum> = (0..g.vertgstnbr())
                .map(|i| if g.is_local(i) { 10 * g.global_of(i) } else { -1 })
                .collect();
            sync(&g, c, tag, &mut vals).unwrap();
            (0..g.vertgstnbr()).map(|i| (g.global_of(i), vals[i as usize])).collect::<Vec<_>>()
        });
        for per_rank in out {
            for (glb, val) in per_rank {
                assert_eq!(val, 10 * glb);
            }
        }
    }

    #[test]
    fn wrong_length_is_rejected() {
        let g = Dgraph::build(&crate::algs::NoComm, 0, 2, vec![0, 1, 2], vec![1, 0], None, None).unwrap();
        let mut vals = vec![0; 3];
        assert!(matches!(
            sync(&g, &crate::algs::NoComm, CommTag::new(1), &mut vals),
            Err(BipartError::InvalidParameter(_))
        ));
    }
}
