//! Core trait definition for vector index implementations.
//!
//! The ANN algorithm is a replaceable strategy: anything that can link a
//! store slot into a searchable structure, tombstone it, and answer beam
//! searches can stand in for the layered graph.

use crate::error::Result;
use crate::index::graph::HnswIndex;
use crate::index::search::knn_search;
use crate::store::VectorStore;

/// Trait that all cortexdb index implementations must satisfy.
///
/// Slots are store-assigned: the caller appends a record to the
/// [`VectorStore`] and hands the resulting slot to [`insert`](Self::insert).
/// The index never owns vector data.
pub trait VectorIndex: Send + Sync {
    /// Link the store's `slot` into the index.
    ///
    /// # Errors
    /// Returns `CortexError::DimensionMismatch` if the store's dimension does
    /// not match the index, or `CortexError::IndexIntegrity` if `slot` is not
    /// the next unlinked slot.
    fn insert(&mut self, store: &VectorStore, slot: u32) -> Result<()>;

    /// Tombstone `slot`: keep it for graph navigation, hide it from results.
    ///
    /// # Errors
    /// Returns `CortexError::IndexIntegrity` if the slot was never inserted.
    fn delete(&mut self, slot: u32) -> Result<()>;

    /// Return up to `k` live slots nearest to `query`, ascending by distance,
    /// expanding a base-layer beam of `ef` candidates.
    fn search(&self, store: &VectorStore, query: &[f32], k: usize, ef: usize) -> Vec<(f32, u32)>;

    /// Total indexed slots, tombstoned included.
    fn node_count(&self) -> usize;

    /// Tombstoned slot count.
    fn tombstone_count(&self) -> usize;

    /// Check that every live slot is reachable from the entry point.
    fn validate_reachability(&self) -> Result<()>;
}

impl VectorIndex for HnswIndex {
    fn insert(&mut self, store: &VectorStore, slot: u32) -> Result<()> {
        self.insert_slot(store, slot)
    }

    fn delete(&mut self, slot: u32) -> Result<()> {
        self.tombstone_slot(slot)
    }

    fn search(&self, store: &VectorStore, query: &[f32], k: usize, ef: usize) -> Vec<(f32, u32)> {
        knn_search(self, store, query, k, ef)
    }

    fn node_count(&self) -> usize {
        HnswIndex::node_count(self)
    }

    fn tombstone_count(&self) -> usize {
        HnswIndex::tombstone_count(self)
    }

    fn validate_reachability(&self) -> Result<()> {
        HnswIndex::validate_reachability(self)
    }
}
