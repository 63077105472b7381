//! Graph insertion.
//!
//! New nodes descend greedily from the entry point to their drawn layer,
//! collect an `ef_construction` beam per layer, and connect bidirectionally
//! to a diversity-pruned neighbor set.

use crate::error::{CortexError, Result};
use crate::index::distance::compute_distance;
use crate::index::graph::HnswIndex;
use crate::index::search::search_layer;
use crate::index::visited::VisitedSet;
use crate::store::VectorStore;

impl HnswIndex {
    /// Link store slot `slot` into the graph.
    ///
    /// The slot must be the next unlinked store slot; the caller appends to
    /// the store first and then inserts here, keeping the two aligned.
    pub(crate) fn insert_slot(&mut self, store: &VectorStore, slot: u32) -> Result<()> {
        if self.dimension != store.dimension() {
            return Err(CortexError::DimensionMismatch {
                expected: self.dimension,
                actual: store.dimension(),
            });
        }
        if slot as usize != self.node_count() {
            return Err(CortexError::IndexIntegrity(format!(
                "insert of slot {slot} but graph has {} nodes",
                self.node_count()
            )));
        }

        let level = self.random_level();
        let vector = store.vector(slot).to_vec();

        // First node becomes the entry point.
        let Some(entry_point) = self.entry_point else {
            self.neighbors.push(vec![Vec::new(); level + 1]);
            self.layers.push(level as u8);
            self.tombstones.push(false);
            self.entry_point = Some(slot);
            self.max_layer = level;
            return Ok(());
        };

        let mut visited = VisitedSet::new(self.node_count() + 1);

        // Phase 1: greedy descent from the top layer to level + 1.
        let mut current_ep = entry_point;
        for layer in (level + 1..=self.max_layer).rev() {
            let nearest = search_layer(
                self,
                store,
                &vector,
                std::slice::from_ref(&current_ep),
                1,
                layer,
                &mut visited,
            );
            if let Some(&(_, nearest_slot)) = nearest.first() {
                current_ep = nearest_slot;
            }
        }

        // Phase 2: beam search each layer from the node's level down,
        // selecting its neighbor lists.
        let top = level.min(self.max_layer);
        let mut node_neighbors: Vec<Vec<u32>> = vec![Vec::new(); level + 1];
        let mut layer_eps: Vec<u32> = vec![current_ep];
        for layer in (0..=top).rev() {
            let candidates = search_layer(
                self,
                store,
                &vector,
                &layer_eps,
                self.params.ef_construction,
                layer,
                &mut visited,
            );

            let m_max = self.layer_capacity(layer);
            let selected = select_neighbors_heuristic(self, store, &candidates, m_max);
            node_neighbors[layer] = selected.iter().map(|&(_, s)| s).collect();

            layer_eps.clear();
            layer_eps.extend(candidates.iter().map(|&(_, s)| s));
            if layer_eps.is_empty() {
                layer_eps.push(entry_point);
            }
        }

        self.neighbors.push(node_neighbors);
        self.layers.push(level as u8);
        self.tombstones.push(false);

        // Phase 3: backlinks, pruning any neighbor list that overflows.
        for layer in 0..=top {
            let m_max = self.layer_capacity(layer);
            let my_neighbors = self.neighbors[slot as usize][layer].clone();
            for &neighbor in &my_neighbors {
                let nid = neighbor as usize;
                while self.neighbors[nid].len() <= layer {
                    self.neighbors[nid].push(Vec::new());
                }
                self.neighbors[nid][layer].push(slot);

                if self.neighbors[nid][layer].len() > m_max {
                    let base = store.vector(neighbor);
                    let candidates: Vec<(f32, u32)> = self.neighbors[nid][layer]
                        .iter()
                        .map(|&c| (compute_distance(base, store.vector(c), self.metric), c))
                        .collect();
                    let pruned = select_neighbors_heuristic(self, store, &candidates, m_max);
                    self.neighbors[nid][layer] = pruned.iter().map(|&(_, s)| s).collect();
                }
            }
        }

        if level > self.max_layer {
            self.max_layer = level;
            self.entry_point = Some(slot);
        }
        Ok(())
    }

    /// Tombstone a node. The node stays in neighbor lists to preserve graph
    /// connectivity; search excludes it from results.
    pub(crate) fn tombstone_slot(&mut self, slot: u32) -> Result<()> {
        let idx = slot as usize;
        if idx >= self.tombstones.len() {
            return Err(CortexError::IndexIntegrity(format!(
                "tombstone of slot {slot} but graph has {} nodes",
                self.node_count()
            )));
        }
        self.tombstones[idx] = true;
        Ok(())
    }

    #[inline]
    fn layer_capacity(&self, layer: usize) -> usize {
        if layer == 0 {
            self.params.m_max0
        } else {
            self.params.m
        }
    }
}

/// Diversity-pruning neighbor selection.
///
/// A candidate is kept only if it is closer to the base than to every
/// already-kept neighbor, which spreads links across directions instead of
/// clustering them. Remaining slots are filled with the closest leftovers.
fn select_neighbors_heuristic(
    index: &HnswIndex,
    store: &VectorStore,
    candidates: &[(f32, u32)],
    m: usize,
) -> Vec<(f32, u32)> {
    let mut sorted = candidates.to_vec();
    sorted.sort_unstable_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut selected: Vec<(f32, u32)> = Vec::with_capacity(m);
    for &(dist_to_base, cand) in &sorted {
        if selected.len() >= m {
            break;
        }
        let cand_vec = store.vector(cand);
        let diverse = selected.iter().all(|&(_, kept)| {
            dist_to_base <= compute_distance(cand_vec, store.vector(kept), index.metric)
        });
        if diverse {
            selected.push((dist_to_base, cand));
        }
    }

    if selected.len() < m {
        for &(dist, cand) in &sorted {
            if selected.len() >= m {
                break;
            }
            if !selected.iter().any(|&(_, kept)| kept == cand) {
                selected.push((dist, cand));
            }
        }
    }

    selected
}
