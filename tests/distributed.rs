use mlbipart::prelude::*;
use serial_test::serial;

/// Run `f` on every rank of a thread world.
fn on_ranks<T: Send>(size: usize, f: impl Fn(&ThreadComm) -> T + Sync) -> Vec<T> {
    let world = ThreadComm::world(size);
    std::thread::scope(|s| {
        let f = &f;
        let hs: Vec<_> = world.iter().map(|c| s.spawn(move || f(c))).collect();
        hs.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

/// Local arrays of a graph given by its neighbor lists, for ranks owning
/// `per_rank` consecutive vertices each.
fn local_part(adj: &[Vec<Gnum>], rank: usize, per_rank: usize) -> (Vec<Gnum>, Vec<Gnum>) {
    let mut verttab = vec![0];
    let mut edgetab = Vec::new();
    for v in rank * per_rank..(rank + 1) * per_rank {
        edgetab.extend(&adj[v]);
        verttab.push(edgetab.len() as Gnum);
    }
    (verttab, edgetab)
}

fn params(seed: u64, deterministic: bool) -> DgraphCoarsenParam {
    DgraphCoarsenParam {
        coarnbr: 1,
        coarrat: 1.0,
        passnbr: 8,
        probval: 1.0,
        rng_seed: seed,
        deterministic,
    }
}

#[test]
#[serial]
fn complete_bipartite_across_four_ranks() {
    // K(4,4): side {0..3} on ranks 0 and 1, side {4..7} on ranks 2 and 3.
    let adj: Vec<Vec<Gnum>> = (0..8)
        .map(|v| if v < 4 { (4..8).collect() } else { (0..4).collect() })
        .collect();
    for (seed, deterministic) in [(1, true), (2, false), (3, true), (4, false)] {
        let out = on_ranks(4, |c| {
            let (verttab, edgetab) = local_part(&adj, c.rank(), 2);
            let g = Dgraph::build(c, 0, 2, verttab, edgetab, None, None).unwrap();
            match dgraph_coarsen(&g, c, &params(seed, deterministic)).unwrap() {
                DgraphCoarsenOutcome::Coarsened { graph, mults } => {
                    let edlo: Gnum = graph
                        .vertices()
                        .flat_map(|v| graph.edges(v))
                        .map(|e| graph.edge_load(e))
                        .sum();
                    (mults, graph.veloglbsum(), graph.vertglbnbr(), edlo)
                }
                DgraphCoarsenOutcome::Refused => panic!("K(4,4) should coarsen"),
            }
        });

        let mut seen = vec![0; 8];
        for (mults, _, _, _) in &out {
            for m in mults {
                let [a, b] = m.vertglbnum;
                seen[a as usize] += 1;
                if a != b {
                    seen[b as usize] += 1;
                    // Pairs always cross the two sides.
                    assert!((a < 4) != (b < 4));
                }
            }
        }
        assert_eq!(seen, vec![1; 8]);

        let nmults: Gnum = out.iter().map(|o| o.0.len() as Gnum).sum();
        let pairs = 8 - nmults;
        let edlo: Gnum = out.iter().map(|o| o.3).sum();
        for (_, velo, vertglbnbr, _) in &out {
            assert_eq!(*velo, 8);
            assert_eq!(*vertglbnbr, nmults);
        }
        // 32 arcs; each pair loses its internal edge in both directions.
        assert_eq!(edlo, 32 - 2 * pairs);
    }
}

#[test]
#[serial]
fn ring_coarsens_twice_over_four_ranks() {
    let n: Gnum = 20;
    let adj: Vec<Vec<Gnum>> = (0..n).map(|v| vec![(v + n - 1) % n, (v + 1) % n]).collect();
    let out = on_ranks(4, |c| {
        let (verttab, edgetab) = local_part(&adj, c.rank(), 5);
        let g = Dgraph::build(c, 0, 5, verttab, edgetab, None, None).unwrap();
        let p = params(9, true);
        let DgraphCoarsenOutcome::Coarsened { graph: g1, .. } = dgraph_coarsen(&g, c, &p).unwrap() else {
            panic!("ring should coarsen");
        };
        let DgraphCoarsenOutcome::Coarsened { graph: g2, .. } = dgraph_coarsen(&g1, c, &p).unwrap() else {
            panic!("coarse ring should coarsen");
        };
        g2.validate_invariants().unwrap();
        (g1.vertglbnbr(), g2.vertglbnbr(), g2.veloglbsum())
    });
    for &(n1, n2, velo) in &out {
        assert!(n1 < n && n2 < n1);
        assert_eq!(velo, n);
    }
}

#[test]
#[serial]
fn small_distributed_graph_is_refused_everywhere() {
    let out = on_ranks(2, |c| {
        // Edges 0-1 on rank 0 and 2-3 on rank 1.
        let edgetab = if c.rank() == 0 { vec![1, 0] } else { vec![3, 2] };
        let g = Dgraph::build(c, 0, 2, vec![0, 1, 2], edgetab, None, None).unwrap();
        let p = DgraphCoarsenParam { coarnbr: 4, ..params(0, true) };
        matches!(dgraph_coarsen(&g, c, &p).unwrap(), DgraphCoarsenOutcome::Refused)
    });
    assert!(out.into_iter().all(|refused| refused));
}
