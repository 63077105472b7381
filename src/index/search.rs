//! Graph search: single-layer beam search and multi-layer k-NN.
//!
//! Tombstoned nodes are traversed for navigation but excluded from results.
//! When tombstones leave fewer than `k` live results, the base-layer beam is
//! widened (up to 4x) and the search retried, so deletes stay invisible
//! without rebuilding the graph.

use std::cell::RefCell;
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;

use crate::index::distance::compute_distance;
use crate::index::graph::HnswIndex;
use crate::index::visited::VisitedSet;
use crate::store::VectorStore;

thread_local! {
    /// Per-thread scratch set so concurrent searches never contend and
    /// repeated searches skip the allocation.
    static SEARCH_VISITED: RefCell<VisitedSet> = RefCell::new(VisitedSet::new(0));
}

/// A frontier candidate: max-heap on negated distance gives min-heap order.
#[derive(Debug, PartialEq, Eq)]
struct Candidate {
    neg_distance: OrderedFloat<f32>,
    slot: u32,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.neg_distance.cmp(&other.neg_distance)
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// A result entry: max-heap by distance, so the worst result pops first.
/// Ties fall to the higher slot, which keeps lower slots (and therefore
/// lower ids, since slots are issued in id order) when the beam overflows.
#[derive(Debug, PartialEq, Eq)]
struct ResultEntry {
    distance: OrderedFloat<f32>,
    slot: u32,
}

impl Ord for ResultEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance
            .cmp(&other.distance)
            .then(self.slot.cmp(&other.slot))
    }
}

impl PartialOrd for ResultEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Beam search within one layer.
///
/// Returns up to `ef` live nodes closest to `query`, sorted ascending by
/// distance. `visited` is cleared at the start of each call.
pub(crate) fn search_layer(
    index: &HnswIndex,
    store: &VectorStore,
    query: &[f32],
    entry_points: &[u32],
    ef: usize,
    layer: usize,
    visited: &mut VisitedSet,
) -> Vec<(f32, u32)> {
    visited.clear();
    let mut candidates: BinaryHeap<Candidate> = BinaryHeap::with_capacity(ef * 2);
    let mut results: BinaryHeap<ResultEntry> = BinaryHeap::with_capacity(ef + 1);
    let mut worst_dist = f32::MAX;

    for &ep in entry_points {
        if visited.insert(ep) {
            let dist = compute_distance(query, store.vector(ep), index.metric);
            candidates.push(Candidate {
                neg_distance: OrderedFloat(-dist),
                slot: ep,
            });
            if !index.is_tombstoned(ep) {
                results.push(ResultEntry {
                    distance: OrderedFloat(dist),
                    slot: ep,
                });
                if results.len() >= ef {
                    worst_dist = results.peek().map_or(f32::MAX, |r| r.distance.0);
                }
            }
        }
    }

    while let Some(candidate) = candidates.pop() {
        let c_dist = -candidate.neg_distance.0;
        if results.len() >= ef && c_dist > worst_dist {
            break;
        }

        let node = candidate.slot as usize;
        if layer >= index.neighbors[node].len() {
            continue;
        }

        for &neighbor in &index.neighbors[node][layer] {
            if !visited.insert(neighbor) {
                continue;
            }
            let dist = compute_distance(query, store.vector(neighbor), index.metric);
            if results.len() < ef || dist < worst_dist {
                candidates.push(Candidate {
                    neg_distance: OrderedFloat(-dist),
                    slot: neighbor,
                });
                if !index.is_tombstoned(neighbor) {
                    results.push(ResultEntry {
                        distance: OrderedFloat(dist),
                        slot: neighbor,
                    });
                    if results.len() > ef {
                        results.pop();
                    }
                    worst_dist = results.peek().map_or(f32::MAX, |r| r.distance.0);
                }
            }
        }
    }

    results
        .into_sorted_vec()
        .into_iter()
        .map(|r| (r.distance.0, r.slot))
        .collect()
}

/// Multi-layer k-NN search.
///
/// Descends with a beam of 1 from the top layer to layer 1, then runs the
/// base layer with `ef`, doubling the beam while tombstones keep the live
/// result count under `k`.
pub(crate) fn knn_search(
    index: &HnswIndex,
    store: &VectorStore,
    query: &[f32],
    k: usize,
    ef: usize,
) -> Vec<(f32, u32)> {
    let Some(entry_point) = index.entry_point else {
        return Vec::new();
    };

    SEARCH_VISITED.with(|cell| {
        let mut visited = cell.borrow_mut();
        visited.ensure_capacity(index.node_count());

        let mut current_ep = entry_point;
        for layer in (1..=index.max_layer).rev() {
            let nearest = search_layer(
                index,
                store,
                query,
                std::slice::from_ref(&current_ep),
                1,
                layer,
                &mut visited,
            );
            if let Some(&(_, slot)) = nearest.first() {
                current_ep = slot;
            }
        }

        let base_ef = ef.max(k);
        let max_ef = (base_ef * 4).max(base_ef).min(index.node_count().max(1));
        let mut ef = base_ef;
        loop {
            let mut results = search_layer(
                index,
                store,
                query,
                std::slice::from_ref(&current_ep),
                ef,
                0,
                &mut visited,
            );
            if results.len() >= k || ef >= max_ef {
                results.truncate(k);
                return results;
            }
            ef = (ef * 2).min(max_ef);
        }
    })
}
