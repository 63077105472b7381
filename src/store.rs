//! Append-mostly vector storage.
//!
//! Records live in a struct-of-arrays layout: one contiguous f32 arena plus
//! parallel id/metadata/liveness arrays, indexed by `u32` slot. Slots are
//! append-only and shared with the graph index; public identifiers are
//! monotonic `u64`s that are never reused, even across compaction.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CortexError, Result};
use crate::types::{VectorId, VectorRecord};

#[derive(Debug, Serialize, Deserialize)]
pub struct VectorStore {
    dimension: usize,
    /// Vector arena: slot `i` occupies `[i * dimension, (i + 1) * dimension)`.
    vectors: Vec<f32>,
    /// Slot -> public id.
    ids: Vec<VectorId>,
    metadata: Vec<Option<Vec<u8>>>,
    deleted: Vec<bool>,
    id_to_slot: HashMap<VectorId, u32>,
    next_id: VectorId,
    live_count: usize,
}

impl VectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
            ids: Vec::new(),
            metadata: Vec::new(),
            deleted: Vec::new(),
            id_to_slot: HashMap::new(),
            next_id: 0,
            live_count: 0,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Total slots, deleted included.
    pub fn slot_count(&self) -> usize {
        self.ids.len()
    }

    pub fn live_count(&self) -> usize {
        self.live_count
    }

    pub fn deleted_count(&self) -> usize {
        self.ids.len() - self.live_count
    }

    /// The id the next append will receive.
    pub fn peek_next_id(&self) -> VectorId {
        self.next_id
    }

    /// Append a record, assigning the next unused id.
    pub fn append(&mut self, vector: &[f32], metadata: Option<Vec<u8>>) -> Result<(VectorId, u32)> {
        if vector.len() != self.dimension {
            return Err(CortexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        let id = self.next_id;
        self.next_id += 1;
        let slot = self.push_record(id, vector, metadata);
        Ok((id, slot))
    }

    /// Re-insert a journaled record under its original id (WAL replay and
    /// compaction). Advances `next_id` past the restored id.
    pub fn restore(
        &mut self,
        id: VectorId,
        vector: &[f32],
        metadata: Option<Vec<u8>>,
    ) -> Result<u32> {
        if vector.len() != self.dimension {
            return Err(CortexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if self.id_to_slot.contains_key(&id) {
            return Err(CortexError::CorruptLog(format!(
                "duplicate id {id} in journal"
            )));
        }
        self.next_id = self.next_id.max(id + 1);
        Ok(self.push_record(id, vector, metadata))
    }

    fn push_record(&mut self, id: VectorId, vector: &[f32], metadata: Option<Vec<u8>>) -> u32 {
        let slot = self.ids.len() as u32;
        self.vectors.extend_from_slice(vector);
        self.ids.push(id);
        self.metadata.push(metadata);
        self.deleted.push(false);
        self.id_to_slot.insert(id, slot);
        self.live_count += 1;
        slot
    }

    /// Flip a record's liveness flag to deleted. Returns the record's slot so
    /// the caller can tombstone the index entry.
    pub fn mark_deleted(&mut self, id: VectorId) -> Result<u32> {
        let slot = *self
            .id_to_slot
            .get(&id)
            .ok_or(CortexError::VectorNotFound { id })?;
        let idx = slot as usize;
        if self.deleted[idx] {
            return Err(CortexError::VectorNotFound { id });
        }
        self.deleted[idx] = true;
        self.live_count -= 1;
        Ok(slot)
    }

    /// Fetch a live record by id.
    pub fn get(&self, id: VectorId) -> Result<VectorRecord> {
        let slot = *self
            .id_to_slot
            .get(&id)
            .ok_or(CortexError::VectorNotFound { id })?;
        let idx = slot as usize;
        if self.deleted[idx] {
            return Err(CortexError::VectorNotFound { id });
        }
        Ok(VectorRecord {
            id,
            vector: self.vector(slot).to_vec(),
            metadata: self.metadata[idx].clone(),
        })
    }

    pub fn contains_live(&self, id: VectorId) -> bool {
        self.id_to_slot
            .get(&id)
            .is_some_and(|&slot| !self.deleted[slot as usize])
    }

    /// Whether the id was ever assigned, deleted or not.
    pub fn contains_id(&self, id: VectorId) -> bool {
        self.id_to_slot.contains_key(&id)
    }

    /// Raise `next_id` to at least `next`. Used when a rebuilt store must not
    /// re-issue ids that only tombstoned records were holding.
    pub fn ensure_next_id(&mut self, next: VectorId) {
        self.next_id = self.next_id.max(next);
    }

    #[inline]
    pub fn vector(&self, slot: u32) -> &[f32] {
        let start = slot as usize * self.dimension;
        &self.vectors[start..start + self.dimension]
    }

    #[inline]
    pub fn id_at(&self, slot: u32) -> VectorId {
        self.ids[slot as usize]
    }

    #[inline]
    pub fn metadata_at(&self, slot: u32) -> Option<&[u8]> {
        self.metadata[slot as usize].as_deref()
    }

    #[inline]
    pub fn is_deleted_slot(&self, slot: u32) -> bool {
        self.deleted[slot as usize]
    }

    /// Iterate live records in slot order.
    ///
    /// Callers run scans under the collection read lock, so the sequence is
    /// consistent as of the scan's start.
    pub fn scan(&self) -> impl Iterator<Item = VectorRecord> + '_ {
        (0..self.ids.len() as u32).filter_map(move |slot| {
            let idx = slot as usize;
            if self.deleted[idx] {
                return None;
            }
            Some(VectorRecord {
                id: self.ids[idx],
                vector: self.vector(slot).to_vec(),
                metadata: self.metadata[idx].clone(),
            })
        })
    }
}
