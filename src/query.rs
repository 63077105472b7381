//! Query execution.
//!
//! Validates the request, runs the index search against the collection's
//! current state, resolves surviving slots back to ids and metadata, and
//! returns results in rank order. Equal scores resolve to the lower id so a
//! fixed query always ranks deterministically.

use tracing::{debug, instrument};

use crate::error::{CortexError, Result};
use crate::index::VectorIndex;
use crate::registry::Collection;
use crate::types::SearchResult;

/// Execute a k-NN search against a collection.
///
/// `k` is clamped to the collection's live count; `ef_search` defaults to the
/// collection's configured value and is floored at `k`.
#[instrument(skip(collection, query), fields(k = k))]
pub fn execute_search(
    collection: &Collection,
    query: &[f32],
    k: usize,
    ef_search: Option<usize>,
) -> Result<Vec<SearchResult>> {
    if k == 0 {
        return Err(CortexError::InvalidArgument("k must be > 0".into()));
    }

    let data = collection.data.read();

    if query.len() != data.dimension {
        return Err(CortexError::DimensionMismatch {
            expected: data.dimension,
            actual: query.len(),
        });
    }

    let start = std::time::Instant::now();
    crate::metrics::SEARCHES_TOTAL
        .with_label_values(&[&data.name])
        .inc();

    let k = k.min(data.store.live_count());
    if k == 0 {
        return Ok(Vec::new());
    }

    let ef = ef_search.unwrap_or(data.index.params().ef_search).max(k);
    let candidates = data.index.search(&data.store, query, k, ef);

    let mut results: Vec<SearchResult> = candidates
        .into_iter()
        .map(|(score, slot)| SearchResult {
            id: data.store.id_at(slot),
            score,
            metadata: data.store.metadata_at(slot).map(|m| m.to_vec()),
        })
        .collect();

    results.sort_by(|a, b| {
        a.score
            .partial_cmp(&b.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });
    results.truncate(k);

    crate::metrics::SEARCH_DURATION
        .with_label_values(&[&data.name])
        .observe(start.elapsed().as_secs_f64());

    debug!(
        collection = %data.name,
        returned = results.len(),
        ef,
        "search complete"
    );

    Ok(results)
}
