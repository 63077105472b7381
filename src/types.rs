use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::IndexParams;

/// A unique identifier for a vector within a collection.
///
/// Ids are assigned from a per-collection monotonic counter and are never
/// reused, even after the record they named is deleted and compacted away.
pub type VectorId = u64;

/// Distance metric for vector comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    Cosine,
    Euclidean,
    DotProduct,
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::Euclidean => write!(f, "euclidean"),
            DistanceMetric::DotProduct => write!(f, "dot_product"),
        }
    }
}

/// A stored vector with its id and optional metadata blob.
///
/// Metadata is opaque to the engine: it is journaled, persisted, and returned
/// verbatim, never inspected by the index or distance code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: VectorId,
    pub vector: Vec<f32>,
    pub metadata: Option<Vec<u8>>,
}

/// A search result: vector id, score, and the record's metadata.
///
/// Scores are lower-is-better for every metric (cosine distance, squared
/// euclidean distance, negated dot product), so results ascend by score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: VectorId,
    pub score: f32,
    pub metadata: Option<Vec<u8>>,
}

/// A point-in-time summary of a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub live_count: usize,
    pub deleted_count: usize,
    pub params: IndexParams,
    pub created_at: DateTime<Utc>,
}
