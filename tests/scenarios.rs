use mlbipart::algs::communicator::{CoarsenCommTags, ThreadComm};
use mlbipart::dgraph::matching::{match_vertices, Mate};
use mlbipart::prelude::*;
use serial_test::serial;

fn cycle4() -> Graph {
    Graph::from_edges(4, &[(0, 1), (1, 2), (2, 3), (3, 0)]).unwrap()
}

#[test]
fn all_in_part_zero() {
    let g = cycle4();
    let mut bg = Bgraph::new(&g);
    let tab = default_tab();
    let strat = parse_strategy("z", &tab).unwrap();
    let mut ctx = BipartContext::new(1);
    bipartition(&mut bg, &strat, &mut ctx).unwrap();

    assert_eq!(bg.compload0(), 4);
    assert_eq!(bg.compload1(), 0);
    assert!(bg.frontier().is_empty());
    assert_eq!(bg.commload(), 0);
    bg.validate_invariants().unwrap();
}

#[test]
fn split_cycle_has_full_frontier() {
    let g = cycle4();
    let mut bg = Bgraph::new(&g);
    bg.alloc().unwrap();
    bg.set_parts(&[0, 0, 1, 1]).unwrap();

    let mut frontier = bg.frontier().to_vec();
    frontier.sort_unstable();
    assert_eq!(frontier, vec![0, 1, 2, 3]);
    assert_eq!(bg.commload(), 2);
    assert_eq!(bg.compload0(), 2);
    bg.validate_invariants().unwrap();
}

#[test]
#[serial]
fn distributed_cycle_matches_in_one_round() {
    let world = ThreadComm::world(2);
    let param = DgraphCoarsenParam {
        coarnbr: 1,
        passnbr: 1,
        probval: 1.0,
        ..Default::default()
    };
    let results: Vec<_> = std::thread::scope(|s| {
        let hs: Vec<_> = world
            .iter()
            .map(|c| {
                s.spawn(move || {
                    // Rank 0 owns {0, 1}, rank 1 owns {2, 3}.
                    let edgetab = if c.rank() == 0 { vec![1, 3, 0, 2] } else { vec![1, 3, 2, 0] };
                    let g = Dgraph::build(c, 0, 2, vec![0, 2, 4], edgetab, None, None).unwrap();
                    let (mults, mates) = match_vertices(&g, c, &param, CoarsenCommTags::default()).unwrap();
                    let local: Vec<Mate> = g.vertices().map(|v| mates[v as usize]).collect();
                    (mults, local)
                })
            })
            .collect();
        hs.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mut covered = Vec::new();
    for (mults, mates) in &results {
        for m in mates {
            assert!(matches!(m, Mate::Matched(_)), "vertex left in state {m:?}");
        }
        for m in mults {
            assert!(!m.is_singleton());
            covered.extend(m.vertglbnum);
        }
    }
    let nmults: usize = results.iter().map(|(m, _)| m.len()).sum();
    assert_eq!(nmults, 2);
    covered.sort_unstable();
    assert_eq!(covered, vec![0, 1, 2, 3]);
}
