//! Layered proximity-graph structure.
//!
//! The graph holds only topology: per-slot neighbor lists, layer
//! assignments, tombstone flags, and the entry point. Vector data stays in
//! the collection's [`VectorStore`](crate::store::VectorStore), which the
//! insert and search paths borrow for distance computation. Slot `i` in the
//! graph always describes slot `i` in the store.

use serde::{Deserialize, Serialize};

use crate::config::IndexParams;
use crate::error::{CortexError, Result};
use crate::store::VectorStore;
use crate::types::DistanceMetric;

#[derive(Debug, Serialize, Deserialize)]
pub struct HnswIndex {
    pub(crate) params: IndexParams,
    pub(crate) metric: DistanceMetric,
    pub(crate) dimension: usize,
    /// Neighbor lists: `[slot][layer][neighbor slot]`.
    pub(crate) neighbors: Vec<Vec<Vec<u32>>>,
    /// Top layer of each slot.
    pub(crate) layers: Vec<u8>,
    /// Tombstoned slots stay in neighbor lists for connectivity but are
    /// excluded from search results.
    pub(crate) tombstones: Vec<bool>,
    pub(crate) entry_point: Option<u32>,
    pub(crate) max_layer: usize,
}

impl HnswIndex {
    pub fn new(dimension: usize, metric: DistanceMetric, params: IndexParams) -> Self {
        Self {
            params,
            metric,
            dimension,
            neighbors: Vec::new(),
            layers: Vec::new(),
            tombstones: Vec::new(),
            entry_point: None,
            max_layer: 0,
        }
    }

    /// Total nodes in the graph, tombstoned included.
    pub fn node_count(&self) -> usize {
        self.neighbors.len()
    }

    /// Nodes excluded from search results.
    pub fn tombstone_count(&self) -> usize {
        self.tombstones.iter().filter(|&&t| t).count()
    }

    pub fn params(&self) -> &IndexParams {
        &self.params
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    #[inline]
    pub fn is_tombstoned(&self, slot: u32) -> bool {
        self.tombstones[slot as usize]
    }

    /// Draw an entry layer from the exponential level distribution.
    pub(crate) fn random_level(&self) -> usize {
        let ml = 1.0 / (self.params.m as f64).ln();
        let r: f64 = rand::random::<f64>().max(f64::MIN_POSITIVE);
        let level = (-r.ln() * ml).floor() as usize;
        level.min(self.params.max_layers - 1)
    }

    /// Structural consistency checks, run after deserializing a snapshot.
    ///
    /// Verifies that the graph arrays describe exactly the store's slots and
    /// that the entry point and all neighbor references are in bounds.
    pub fn validate(&self, store: &VectorStore) -> Result<()> {
        let nc = self.node_count();
        if self.dimension != store.dimension() {
            return Err(CortexError::IndexIntegrity(format!(
                "index dimension {} != store dimension {}",
                self.dimension,
                store.dimension()
            )));
        }
        if nc != store.slot_count() {
            return Err(CortexError::IndexIntegrity(format!(
                "graph has {} nodes but store has {} slots",
                nc,
                store.slot_count()
            )));
        }
        if self.layers.len() != nc || self.tombstones.len() != nc {
            return Err(CortexError::IndexIntegrity(format!(
                "graph arrays disagree: neighbors={} layers={} tombstones={}",
                nc,
                self.layers.len(),
                self.tombstones.len()
            )));
        }
        if let Some(ep) = self.entry_point {
            if ep as usize >= nc {
                return Err(CortexError::IndexIntegrity(format!(
                    "entry point {ep} out of bounds ({nc} nodes)"
                )));
            }
        } else if nc > 0 {
            return Err(CortexError::IndexIntegrity(
                "non-empty graph without an entry point".into(),
            ));
        }
        for (slot, node) in self.neighbors.iter().enumerate() {
            for (layer, list) in node.iter().enumerate() {
                for &n in list {
                    if n as usize >= nc {
                        return Err(CortexError::IndexIntegrity(format!(
                            "neighbor {n} out of bounds at slot {slot} layer {layer}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Verify that every live node is reachable from the entry point over
    /// layer 0. Used to vet a rebuilt graph before it is swapped in.
    pub fn validate_reachability(&self) -> Result<()> {
        let nc = self.node_count();
        let live: usize = self.tombstones.iter().filter(|&&t| !t).count();
        if live == 0 {
            return Ok(());
        }
        let ep = self.entry_point.ok_or_else(|| {
            CortexError::IndexIntegrity("live nodes present without an entry point".into())
        })?;

        let mut seen = vec![false; nc];
        let mut stack = vec![ep];
        seen[ep as usize] = true;
        let mut reached_live = 0usize;
        while let Some(slot) = stack.pop() {
            if !self.tombstones[slot as usize] {
                reached_live += 1;
            }
            if let Some(list) = self.neighbors[slot as usize].first() {
                for &n in list {
                    if !seen[n as usize] {
                        seen[n as usize] = true;
                        stack.push(n);
                    }
                }
            }
        }
        if reached_live != live {
            return Err(CortexError::IndexIntegrity(format!(
                "{} of {} live nodes unreachable from entry point",
                live - reached_live,
                live
            )));
        }
        Ok(())
    }
}
