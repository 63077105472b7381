//! Generation-based visited set for graph traversal.
//!
//! Replaces `HashSet<u32>` with O(1) array indexing. `clear()` bumps a
//! generation counter instead of zeroing the array, so the scratch buffer is
//! cheap to reuse across every `search_layer` call of a query.

#[derive(Debug)]
pub struct VisitedSet {
    marks: Vec<u32>,
    generation: u32,
}

impl VisitedSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            marks: vec![0u32; capacity],
            generation: 1,
        }
    }

    /// Reset the set. Full memset only on generation wrap.
    pub fn clear(&mut self) {
        if self.generation == u32::MAX {
            self.marks.fill(0);
            self.generation = 1;
        } else {
            self.generation += 1;
        }
    }

    /// Grow the backing array to cover at least `cap` node slots.
    pub fn ensure_capacity(&mut self, cap: usize) {
        if cap > self.marks.len() {
            self.marks.resize(cap, 0);
        }
    }

    /// Mark `slot` as visited. Returns `true` if it was newly inserted.
    #[inline]
    pub fn insert(&mut self, slot: u32) -> bool {
        let idx = slot as usize;
        if self.marks[idx] == self.generation {
            false
        } else {
            self.marks[idx] = self.generation;
            true
        }
    }
}

impl Default for VisitedSet {
    fn default() -> Self {
        Self::new(0)
    }
}
