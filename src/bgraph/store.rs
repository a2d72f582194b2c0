//! Snapshot of a bipartition state.
//!
//! A store keeps its own copy of the partition and frontier so that
//! alternative strategies can be tried on the same active graph and the best
//! result put back afterwards.

use super::Bgraph;
use crate::bipart_error::BipartError;
use crate::debug_invariants::DebugInvariants;
use crate::{Gnum, GraphPart};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BgraphStore {
    parttab: Vec<GraphPart>,
    frontab: Vec<Gnum>,
    compload0dlt: Gnum,
    compsize0: Gnum,
    commload: Gnum,
    commgainextn: Gnum,
}

impl BgraphStore {
    /// Store able to hold the state of a graph of `vertnbr` vertices.
    pub fn new(vertnbr: Gnum) -> Result<Self, BipartError> {
        let mut parttab = Vec::new();
        let mut frontab = Vec::new();
        parttab
            .try_reserve_exact(vertnbr as usize)
            .map_err(|_| BipartError::OutOfMemory("store partition array"))?;
        frontab
            .try_reserve_exact(vertnbr as usize)
            .map_err(|_| BipartError::OutOfMemory("store frontier array"))?;
        Ok(BgraphStore {
            parttab,
            frontab,
            ..Default::default()
        })
    }

    /// Copy the state of `graph` into the store.
    pub fn save(&mut self, graph: &Bgraph<'_>) {
        self.parttab.clear();
        self.parttab.extend_from_slice(graph.parts());
        self.frontab.clear();
        self.frontab.extend_from_slice(graph.frontier());
        self.compload0dlt = graph.compload0dlt;
        self.compsize0 = graph.compsize0;
        self.commload = graph.commload;
        self.commgainextn = graph.commgainextn;
    }

    /// Restore the stored state into `graph`.
    pub fn update(&self, graph: &mut Bgraph<'_>) -> Result<(), BipartError> {
        graph.alloc()?;
        graph.parttax.as_mut_slice().copy_from_slice(&self.parttab);
        let frontab = graph.frontab.owned_mut();
        frontab.clear();
        frontab.extend_from_slice(&self.frontab);
        graph.compload0dlt = self.compload0dlt;
        graph.compload0 = graph.compload0avg + self.compload0dlt;
        graph.compsize0 = self.compsize0;
        graph.commload = self.commload;
        graph.commgainextn = self.commgainextn;
        graph.debug_assert_invariants();
        Ok(())
    }

    pub fn commload(&self) -> Gnum {
        self.commload
    }

    pub fn compload0dlt(&self) -> Gnum {
        self.compload0dlt
    }
}
