use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use mlbipart::prelude::*;

// 2D grid with a few random long-range edges
fn grid_graph(side: Gnum, extra: usize, seed: u64) -> Graph {
    let mut edges = Vec::new();
    for y in 0..side {
        for x in 0..side {
            let v = y * side + x;
            if x + 1 < side {
                edges.push((v, v + 1));
            }
            if y + 1 < side {
                edges.push((v, v + side));
            }
        }
    }
    let n = side * side;
    let mut rng = SmallRng::seed_from_u64(seed);
    for _ in 0..extra {
        let (u, v) = (rng.gen_range(0..n), rng.gen_range(0..n));
        if u != v {
            edges.push((u.min(v), u.max(v)));
        }
    }
    edges.sort_unstable();
    edges.dedup();
    Graph::from_edges(n as usize, &edges).unwrap()
}

fn bench_bipart(c: &mut Criterion) {
    let mut group = c.benchmark_group("bipartition");
    for &side in &[16, 32, 64] {
        let g = grid_graph(side, side as usize, 7);

        group.bench_with_input(BenchmarkId::new("default_strategy", side), &side, |b, _| {
            let cfg = BipartConfig::default();
            b.iter(|| {
                let mut bg = Bgraph::new(&g);
                bipartition_with_config(&mut bg, &cfg).unwrap();
                black_box(bg.commload());
            });
        });

        group.bench_with_input(BenchmarkId::new("greedy_then_fm", side), &side, |b, _| {
            let cfg = BipartConfig {
                strategy: "h{pass=5}f".into(),
                ..Default::default()
            };
            b.iter(|| {
                let mut bg = Bgraph::new(&g);
                bipartition_with_config(&mut bg, &cfg).unwrap();
                black_box(bg.commload());
            });
        });
    }
    group.finish();
}

fn bench_dgraph_coarsen(c: &mut Criterion) {
    let mut group = c.benchmark_group("dgraph_coarsen");
    for &ranks in &[1usize, 2, 4] {
        let side: Gnum = 32;
        let n = side * side;
        let per_rank = n / ranks as Gnum;
        group.bench_with_input(BenchmarkId::new("grid32", ranks), &ranks, |b, &ranks| {
            b.iter(|| {
                let world = ThreadComm::world(ranks);
                std::thread::scope(|s| {
                    for comm in &world {
                        s.spawn(move || {
                            let first = comm.rank() as Gnum * per_rank;
                            let mut verttab = vec![0];
                            let mut edgetab = Vec::new();
                            for v in first..first + per_rank {
                                let (x, y) = (v % side, v / side);
                                for (dx, dy) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
                                    let (nx, ny) = (x + dx, y + dy);
                                    if (0..side).contains(&nx) && (0..side).contains(&ny) {
                                        edgetab.push(ny * side + nx);
                                    }
                                }
                                verttab.push(edgetab.len() as Gnum);
                            }
                            let g = Dgraph::build(comm, 0, per_rank, verttab, edgetab, None, None).unwrap();
                            let out = dgraph_coarsen(&g, comm, &DgraphCoarsenParam::default()).unwrap();
                            black_box(matches!(out, DgraphCoarsenOutcome::Coarsened { .. }));
                        });
                    }
                });
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_bipart, bench_dgraph_coarsen);
criterion_main!(benches);
