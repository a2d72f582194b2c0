//! Source graph substrate.
//!
//! A [`Graph`] is a compressed adjacency structure with optional vertex loads,
//! edge loads and vertex labels. Every array is a [`BasedVec`], indexed with
//! based vertex and edge numbers. The graph is read-mostly: bipartitioning
//! never modifies it, and coarsening allocates fresh coarse graphs.

pub mod based;
pub mod coarsen;

pub use based::BasedVec;

use crate::bipart_error::BipartError;
use crate::debug_invariants::DebugInvariants;
use crate::Gnum;
use hashbrown::HashMap;
use std::ops::Range;

/// Undirected graph in based compressed-adjacency form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    baseval: Gnum,
    vertnbr: Gnum,
    verttax: BasedVec<Gnum>,
    vendtax: BasedVec<Gnum>,
    velotax: Option<BasedVec<Gnum>>,
    velosum: Gnum,
    vlbltax: Option<BasedVec<Gnum>>,
    edgenbr: Gnum,
    edgetax: BasedVec<Gnum>,
    edlotax: Option<BasedVec<Gnum>>,
    edlosum: Gnum,
    degrmax: Gnum,
}

impl Graph {
    /// Build a graph from caller arrays.
    ///
    /// `verttab` holds `vertnbr + 1` entries when `vendtab` is `None`
    /// (compact form), or `vertnbr` entries otherwise. Edge numbers stored in
    /// `verttab`/`vendtab` and vertex numbers stored in `edgetab` are based on
    /// `baseval`. Structural consistency is checked before returning.
    pub fn build(
        baseval: Gnum,
        verttab: Vec<Gnum>,
        vendtab: Option<Vec<Gnum>>,
        velotab: Option<Vec<Gnum>>,
        vlbltab: Option<Vec<Gnum>>,
        edgetab: Vec<Gnum>,
        edlotab: Option<Vec<Gnum>>,
    ) -> Result<Self, BipartError> {
        let (verttab, vendtab) = match vendtab {
            Some(vendtab) => {
                if vendtab.len() != verttab.len() {
                    return Err(BipartError::InvalidGraph(format!(
                        "vertex array has {} entries but end array has {}",
                        verttab.len(),
                        vendtab.len()
                    )));
                }
                (verttab, vendtab)
            }
            None => {
                if verttab.is_empty() {
                    return Err(BipartError::InvalidGraph(
                        "compact vertex array needs vertnbr + 1 entries".into(),
                    ));
                }
                let vendtab = verttab[1..].to_vec();
                let mut verttab = verttab;
                verttab.pop();
                (verttab, vendtab)
            }
        };
        let vertnbr = verttab.len() as Gnum;
        for (name, tab) in [("load", &velotab), ("label", &vlbltab)] {
            if let Some(tab) = tab {
                if tab.len() as Gnum != vertnbr {
                    return Err(BipartError::InvalidGraph(format!(
                        "vertex {name} array has {} entries, expected {vertnbr}",
                        tab.len()
                    )));
                }
            }
        }
        if let Some(edlotab) = &edlotab {
            if edlotab.len() != edgetab.len() {
                return Err(BipartError::InvalidGraph(format!(
                    "edge load array has {} entries, expected {}",
                    edlotab.len(),
                    edgetab.len()
                )));
            }
        }

        let velosum = velotab.as_ref().map_or(vertnbr, |t| t.iter().sum());
        let edlosum;
        let mut edgenbr = 0;
        let mut degrmax = 0;
        for (&s, &e) in verttab.iter().zip(vendtab.iter()) {
            let degr = e - s;
            edgenbr += degr;
            degrmax = degrmax.max(degr);
        }
        let graph = Graph {
            baseval,
            vertnbr,
            verttax: BasedVec::from_vec(baseval, verttab),
            vendtax: BasedVec::from_vec(baseval, vendtab),
            velotax: velotab.map(|t| BasedVec::from_vec(baseval, t)),
            velosum,
            vlbltax: vlbltab.map(|t| BasedVec::from_vec(baseval, t)),
            edgenbr,
            edgetax: BasedVec::from_vec(baseval, edgetab),
            edlotax: edlotab.map(|t| BasedVec::from_vec(baseval, t)),
            edlosum: 0,
            degrmax,
        };
        graph.validate_invariants()?;
        edlosum = graph.compute_edlosum();
        Ok(Graph { edlosum, ..graph })
    }

    /// Build a 0-based graph with unit loads from undirected edges `(u, v)`.
    pub fn from_edges(vertnbr: usize, edges: &[(Gnum, Gnum)]) -> Result<Self, BipartError> {
        let weighted: Vec<(Gnum, Gnum, Gnum)> = edges.iter().map(|&(u, v)| (u, v, 1)).collect();
        Self::assemble(vertnbr, None, &weighted, false)
    }

    /// Build a 0-based graph from undirected weighted edges `(u, v, load)` and
    /// optional vertex loads.
    pub fn from_weighted_edges(
        vertnbr: usize,
        velotab: Option<Vec<Gnum>>,
        edges: &[(Gnum, Gnum, Gnum)],
    ) -> Result<Self, BipartError> {
        Self::assemble(vertnbr, velotab, edges, true)
    }

    fn assemble(
        vertnbr: usize,
        velotab: Option<Vec<Gnum>>,
        edges: &[(Gnum, Gnum, Gnum)],
        keep_loads: bool,
    ) -> Result<Self, BipartError> {
        let mut degrees = vec![0 as Gnum; vertnbr];
        for &(u, v, _) in edges {
            for x in [u, v] {
                if x < 0 || x as usize >= vertnbr {
                    return Err(BipartError::InvalidGraph(format!(
                        "edge end {x} out of range 0..{vertnbr}"
                    )));
                }
            }
            degrees[u as usize] += 1;
            degrees[v as usize] += 1;
        }
        let mut verttab = Vec::with_capacity(vertnbr + 1);
        verttab.push(0);
        for d in &degrees {
            let last = *verttab.last().unwrap_or(&0);
            verttab.push(last + d);
        }
        let edgesiz = *verttab.last().unwrap_or(&0) as usize;
        let mut fill: Vec<Gnum> = verttab[..vertnbr].to_vec();
        let mut edgetab = vec![0; edgesiz];
        let mut edlotab = vec![0; edgesiz];
        for &(u, v, w) in edges {
            let eu = fill[u as usize] as usize;
            edgetab[eu] = v;
            edlotab[eu] = w;
            fill[u as usize] += 1;
            let ev = fill[v as usize] as usize;
            edgetab[ev] = u;
            edlotab[ev] = w;
            fill[v as usize] += 1;
        }
        Self::build(
            0,
            verttab,
            None,
            velotab,
            None,
            edgetab,
            keep_loads.then_some(edlotab),
        )
    }

    /// Coarse graphs are assembled by the coarsening engine, whose arrays are
    /// consistent by construction.
    pub(crate) fn from_parts(
        baseval: Gnum,
        verttab: Vec<Gnum>,
        vendtab: Vec<Gnum>,
        velotab: Vec<Gnum>,
        edgetab: Vec<Gnum>,
        edlotab: Vec<Gnum>,
    ) -> Self {
        let vertnbr = verttab.len() as Gnum;
        let velosum = velotab.iter().sum();
        let edlosum = edlotab.iter().sum::<Gnum>() / 2;
        let mut degrmax = 0;
        for (&s, &e) in verttab.iter().zip(vendtab.iter()) {
            degrmax = degrmax.max(e - s);
        }
        Graph {
            baseval,
            vertnbr,
            verttax: BasedVec::from_vec(baseval, verttab),
            vendtax: BasedVec::from_vec(baseval, vendtab),
            velotax: Some(BasedVec::from_vec(baseval, velotab)),
            velosum,
            vlbltax: None,
            edgenbr: edgetab.len() as Gnum,
            edgetax: BasedVec::from_vec(baseval, edgetab),
            edlotax: Some(BasedVec::from_vec(baseval, edlotab)),
            edlosum,
            degrmax,
        }
    }

    fn compute_edlosum(&self) -> Gnum {
        match &self.edlotax {
            None => self.edgenbr / 2,
            Some(edlotax) => {
                let mut sum = 0;
                for v in self.vertices() {
                    for e in self.edges(v) {
                        sum += edlotax[e];
                    }
                }
                sum / 2
            }
        }
    }

    #[inline]
    pub fn baseval(&self) -> Gnum {
        self.baseval
    }

    #[inline]
    pub fn vertnbr(&self) -> Gnum {
        self.vertnbr
    }

    /// One past the last based vertex number.
    #[inline]
    pub fn vertnnd(&self) -> Gnum {
        self.baseval + self.vertnbr
    }

    /// Number of arcs (twice the number of undirected edges).
    #[inline]
    pub fn edgenbr(&self) -> Gnum {
        self.edgenbr
    }

    /// Sum of vertex loads.
    #[inline]
    pub fn velosum(&self) -> Gnum {
        self.velosum
    }

    /// Sum of undirected edge loads.
    #[inline]
    pub fn edlosum(&self) -> Gnum {
        self.edlosum
    }

    #[inline]
    pub fn degrmax(&self) -> Gnum {
        self.degrmax
    }

    /// Based vertex range.
    #[inline]
    pub fn vertices(&self) -> Range<Gnum> {
        self.baseval..self.vertnnd()
    }

    /// Based edge index range of vertex `v`.
    #[inline]
    pub fn edges(&self, v: Gnum) -> Range<Gnum> {
        self.verttax[v]..self.vendtax[v]
    }

    #[inline]
    pub fn degree(&self, v: Gnum) -> Gnum {
        self.vendtax[v] - self.verttax[v]
    }

    /// End vertex of edge `e`.
    #[inline]
    pub fn edge_end(&self, e: Gnum) -> Gnum {
        self.edgetax[e]
    }

    #[inline]
    pub fn edge_load(&self, e: Gnum) -> Gnum {
        self.edlotax.as_ref().map_or(1, |t| t[e])
    }

    #[inline]
    pub fn vertex_load(&self, v: Gnum) -> Gnum {
        self.velotax.as_ref().map_or(1, |t| t[v])
    }

    #[inline]
    pub fn vertex_label(&self, v: Gnum) -> Gnum {
        self.vlbltax.as_ref().map_or(v, |t| t[v])
    }

    pub fn has_vertex_loads(&self) -> bool {
        self.velotax.is_some()
    }

    pub fn has_edge_loads(&self) -> bool {
        self.edlotax.is_some()
    }

    /// Neighbors of `v` with the load of the connecting edge.
    pub fn neighbors(&self, v: Gnum) -> impl Iterator<Item = (Gnum, Gnum)> + '_ {
        self.edges(v).map(move |e| (self.edgetax[e], self.edge_load(e)))
    }
}

impl DebugInvariants for Graph {
    const KIND: &'static str = "Graph";

    fn validate_invariants(&self) -> Result<(), BipartError> {
        let edgerange = self.edgetax.range();
        let mut arcs: HashMap<(Gnum, Gnum), (Gnum, Gnum)> = HashMap::with_capacity(self.edgenbr as usize);
        for v in self.vertices() {
            let (s, e) = (self.verttax[v], self.vendtax[v]);
            if s > e || s < edgerange.start || e > edgerange.end {
                return Err(BipartError::InvalidGraph(format!(
                    "vertex {v} has invalid edge range {s}..{e}"
                )));
            }
            if let Some(velotax) = &self.velotax {
                if velotax[v] < 0 {
                    return Err(BipartError::InvalidGraph(format!("vertex {v} has negative load")));
                }
            }
            for edge in s..e {
                let w = self.edgetax[edge];
                if !self.vertices().contains(&w) {
                    return Err(BipartError::InvalidGraph(format!(
                        "edge {edge} of vertex {v} points to {w}, outside of graph"
                    )));
                }
                if w == v {
                    return Err(BipartError::InvalidGraph(format!("vertex {v} has a self loop")));
                }
                let slot = arcs.entry((v, w)).or_insert((0, 0));
                slot.0 += 1;
                slot.1 += self.edge_load(edge);
            }
        }
        for (&(v, w), &(cnt, load)) in &arcs {
            match arcs.get(&(w, v)) {
                Some(&(cnt2, load2)) if cnt2 == cnt && load2 == load => {}
                _ => {
                    return Err(BipartError::InvalidGraph(format!(
                        "arc ({v}, {w}) has no matching reverse arc"
                    )));
                }
            }
        }
        Ok(())
    }
}
