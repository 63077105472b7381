//! Collection registry.
//!
//! Maps collection names to their store + index pair. A [`Collection`] is a
//! cloneable handle to shared state: removing a collection from the registry
//! detaches the map entry, while in-flight readers holding the handle finish
//! against the pre-deletion state and later lookups fail with `NotFound`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::IndexParams;
use crate::error::{CortexError, Result};
use crate::index::HnswIndex;
use crate::store::VectorStore;
use crate::types::{CollectionInfo, DistanceMetric};

/// A collection's complete state, protected by one `RwLock`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CollectionData {
    pub name: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub created_at: DateTime<Utc>,
    pub store: VectorStore,
    pub index: HnswIndex,
}

impl CollectionData {
    pub fn new(
        name: String,
        dimension: usize,
        metric: DistanceMetric,
        params: IndexParams,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name,
            dimension,
            metric,
            created_at,
            store: VectorStore::new(dimension),
            index: HnswIndex::new(dimension, metric, params),
        }
    }

    /// Structural invariants, checked after loading a snapshot.
    pub fn validate(&self) -> Result<()> {
        if self.store.dimension() != self.dimension {
            return Err(CortexError::IndexIntegrity(format!(
                "store dimension {} != collection dimension {}",
                self.store.dimension(),
                self.dimension
            )));
        }
        self.index.validate(&self.store)
    }

    pub fn info(&self) -> CollectionInfo {
        CollectionInfo {
            name: self.name.clone(),
            dimension: self.dimension,
            metric: self.metric,
            live_count: self.store.live_count(),
            deleted_count: self.store.deleted_count(),
            params: self.index.params().clone(),
            created_at: self.created_at,
        }
    }
}

/// A shared handle to one collection.
#[derive(Debug, Clone)]
pub struct Collection {
    pub(crate) data: Arc<RwLock<CollectionData>>,
}

impl Collection {
    pub fn new(data: CollectionData) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    pub fn info(&self) -> CollectionInfo {
        self.data.read().info()
    }

    pub fn live_count(&self) -> usize {
        self.data.read().store.live_count()
    }

    pub fn deleted_count(&self) -> usize {
        self.data.read().store.deleted_count()
    }
}

/// Thread-safe name -> collection map enforcing one store+index pair per name.
#[derive(Debug, Default)]
pub struct CollectionRegistry {
    collections: DashMap<String, Collection>,
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new, empty collection.
    pub fn create(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
        params: IndexParams,
        created_at: DateTime<Utc>,
    ) -> Result<Collection> {
        match self.collections.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(CortexError::CollectionAlreadyExists {
                    name: name.to_string(),
                })
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let collection = Collection::new(CollectionData::new(
                    name.to_string(),
                    dimension,
                    metric,
                    params,
                    created_at,
                ));
                entry.insert(collection.clone());
                Ok(collection)
            }
        }
    }

    /// Attach an already-populated collection (snapshot load).
    pub fn attach(&self, name: &str, collection: Collection) -> Result<()> {
        match self.collections.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(CortexError::CollectionAlreadyExists {
                    name: name.to_string(),
                })
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(collection);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Result<Collection> {
        self.collections
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CortexError::CollectionNotFound {
                name: name.to_string(),
            })
    }

    /// Detach a collection. Handles already cloned out stay usable.
    pub fn remove(&self, name: &str) -> Result<Collection> {
        self.collections
            .remove(name)
            .map(|(_, collection)| collection)
            .ok_or_else(|| CortexError::CollectionNotFound {
                name: name.to_string(),
            })
    }

    pub fn list(&self) -> Vec<String> {
        self.collections
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Snapshot of all handles, for maintenance sweeps.
    pub fn handles(&self) -> Vec<(String, Collection)> {
        self.collections
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}
