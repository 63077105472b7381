//! The engine façade.
//!
//! [`CortexDb`] owns the registry, the write-ahead log, and the per-collection
//! writer locks, and exposes the public API: collection lifecycle, batch
//! insert/delete, search, compaction, and the snapshot cycle.
//!
//! Write path: acquire the collection's writer lock, validate against the
//! current state under a read lock, journal + fsync the operation, then apply
//! it in memory under a brief write lock. Searches only ever take the read
//! lock, so they proceed in parallel with the fsync.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{info, instrument, warn};

use crate::config::{CortexConfig, IndexParams};
use crate::error::{CortexError, Result};
use crate::index::{HnswIndex, VectorIndex};
use crate::query;
use crate::registry::{Collection, CollectionData, CollectionRegistry};
use crate::store::VectorStore;
use crate::types::{CollectionInfo, DistanceMetric, SearchResult, VectorId, VectorRecord};
use crate::wal::{WalOp, WalRecord, WriteAheadLog};

pub struct CortexDb {
    config: CortexConfig,
    registry: CollectionRegistry,
    wal: WriteAheadLog,
    /// Per-collection locks serializing mutations within a collection.
    writer_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CortexDb {
    /// Open the engine: load snapshots, then replay the write-ahead log.
    ///
    /// A corrupt or truncated log tail is discarded with a warning, never an
    /// error; everything up to the recovery boundary is served.
    pub fn open(config: CortexConfig) -> Result<Self> {
        config.index.validate()?;
        std::fs::create_dir_all(&config.data_dir)?;

        let wal = WriteAheadLog::open(&config.data_dir)?;
        let registry = CollectionRegistry::new();

        let snapshots = crate::wal::snapshot::load_all(&config.data_dir)?;
        for data in snapshots {
            let name = data.name.clone();
            if let Err(e) = registry.attach(&name, Collection::new(data)) {
                warn!(collection = %name, error = %e, "skipping duplicate snapshot");
            }
        }

        let (records, stats) = wal.recover()?;
        let replayed = records.len();
        let db = Self {
            config,
            registry,
            wal,
            writer_locks: DashMap::new(),
        };
        for record in records {
            db.apply_replayed(record);
        }

        info!(
            collections = db.registry.list().len(),
            replayed,
            corrupt_tail = stats.corruption.is_some(),
            "engine opened"
        );
        Ok(db)
    }

    pub fn config(&self) -> &CortexConfig {
        &self.config
    }

    fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    fn writer_lock(&self, name: &str) -> Arc<Mutex<()>> {
        self.writer_locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    // ── Collection lifecycle ──────────────────────────────────────────

    /// Create a collection with the configured default index parameters.
    pub fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        self.create_collection_with_params(name, dimension, metric, self.config.index.clone())
    }

    #[instrument(skip(self, params), fields(collection = name))]
    pub fn create_collection_with_params(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
        params: IndexParams,
    ) -> Result<()> {
        self.validate_collection_name(name)?;
        if dimension == 0 {
            return Err(CortexError::InvalidArgument(
                "dimension must be > 0".into(),
            ));
        }
        if dimension > self.config.limits.max_dimension {
            return Err(CortexError::InvalidArgument(format!(
                "dimension {dimension} exceeds maximum of {}",
                self.config.limits.max_dimension
            )));
        }
        params.validate()?;

        let lock = self.writer_lock(name);
        let _guard = lock.lock();

        if self.registry.get(name).is_ok() {
            return Err(CortexError::CollectionAlreadyExists {
                name: name.to_string(),
            });
        }

        let created_at = Utc::now();
        self.wal.append(&WalRecord {
            collection: name.to_string(),
            op: WalOp::CreateCollection {
                dimension,
                metric,
                params: params.clone(),
                created_at,
            },
        })?;
        self.registry
            .create(name, dimension, metric, params, created_at)?;

        info!(collection = name, dimension, %metric, "created collection");
        Ok(())
    }

    #[instrument(skip(self), fields(collection = name))]
    pub fn delete_collection(&self, name: &str) -> Result<()> {
        let lock = self.writer_lock(name);
        let _guard = lock.lock();

        // Confirm existence before journaling a drop.
        self.registry.get(name)?;
        self.wal.append(&WalRecord {
            collection: name.to_string(),
            op: WalOp::DeleteCollection,
        })?;
        self.registry.remove(name)?;

        // The snapshot file is stale the moment the drop is journaled.
        if let Err(e) = crate::wal::snapshot::remove_snapshot(self.data_dir(), name) {
            warn!(collection = name, error = %e, "failed to remove stale snapshot");
        }

        info!(collection = name, "deleted collection");
        Ok(())
    }

    pub fn list_collections(&self) -> Vec<String> {
        self.registry.list()
    }

    pub fn collection_info(&self, name: &str) -> Result<CollectionInfo> {
        Ok(self.registry.get(name)?.info())
    }

    // ── Mutations ─────────────────────────────────────────────────────

    /// Insert a batch of vectors, returning their assigned ids.
    ///
    /// The batch is all-or-nothing: every vector is validated against the
    /// collection dimension before anything is journaled or applied.
    /// `metadata` must be empty (no metadata at all) or one entry per vector.
    #[instrument(skip(self, vectors, metadata), fields(collection = name, batch = vectors.len()))]
    pub fn insert(
        &self,
        name: &str,
        vectors: Vec<Vec<f32>>,
        metadata: Vec<Option<Vec<u8>>>,
    ) -> Result<Vec<VectorId>> {
        if vectors.is_empty() {
            return Ok(Vec::new());
        }
        if vectors.len() > self.config.limits.max_batch_size {
            return Err(CortexError::InvalidArgument(format!(
                "batch size {} exceeds maximum of {}",
                vectors.len(),
                self.config.limits.max_batch_size
            )));
        }
        if !metadata.is_empty() && metadata.len() != vectors.len() {
            return Err(CortexError::InvalidArgument(format!(
                "metadata length {} does not match vector count {}",
                metadata.len(),
                vectors.len()
            )));
        }

        let lock = self.writer_lock(name);
        let _guard = lock.lock();
        let collection = self.registry.get(name)?;

        // Validate and reserve ids under the read lock; the writer lock keeps
        // the reservation stable until the apply below.
        let records = {
            let data = collection.data.read();
            for vector in &vectors {
                if vector.len() != data.dimension {
                    return Err(CortexError::DimensionMismatch {
                        expected: data.dimension,
                        actual: vector.len(),
                    });
                }
            }
            let start_id = data.store.peek_next_id();
            let mut metadata = metadata;
            metadata.resize(vectors.len(), None);
            vectors
                .into_iter()
                .zip(metadata)
                .enumerate()
                .map(|(i, (vector, metadata))| VectorRecord {
                    id: start_id + i as u64,
                    vector,
                    metadata,
                })
                .collect::<Vec<_>>()
        };

        self.wal.append(&WalRecord {
            collection: name.to_string(),
            op: WalOp::Insert {
                records: records.clone(),
            },
        })?;

        let ids: Vec<VectorId> = records.iter().map(|r| r.id).collect();
        {
            let mut data = collection.data.write();
            apply_insert(&mut data, &records)?;
        }

        crate::metrics::INSERTS_TOTAL
            .with_label_values(&[name])
            .inc_by(ids.len() as u64);
        Ok(ids)
    }

    /// Tombstone a batch of vectors.
    ///
    /// Every id must name a live record; otherwise the call fails with
    /// `VectorNotFound` and no state changes.
    #[instrument(skip(self, ids), fields(collection = name, batch = ids.len()))]
    pub fn delete(&self, name: &str, ids: &[VectorId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let lock = self.writer_lock(name);
        let _guard = lock.lock();
        let collection = self.registry.get(name)?;

        {
            let data = collection.data.read();
            let mut seen = std::collections::HashSet::with_capacity(ids.len());
            for &id in ids {
                if !seen.insert(id) {
                    return Err(CortexError::InvalidArgument(format!(
                        "duplicate id {id} in delete batch"
                    )));
                }
                if !data.store.contains_live(id) {
                    return Err(CortexError::VectorNotFound { id });
                }
            }
        }

        self.wal.append(&WalRecord {
            collection: name.to_string(),
            op: WalOp::Delete { ids: ids.to_vec() },
        })?;

        {
            let mut data = collection.data.write();
            apply_delete(&mut data, ids)?;
        }

        crate::metrics::DELETES_TOTAL
            .with_label_values(&[name])
            .inc_by(ids.len() as u64);
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────────────

    /// k-nearest-neighbor search. `ef_search` overrides the collection's
    /// configured beam width for this query.
    pub fn search(
        &self,
        name: &str,
        query: &[f32],
        k: usize,
        ef_search: Option<usize>,
    ) -> Result<Vec<SearchResult>> {
        let collection = self.registry.get(name)?;
        query::execute_search(&collection, query, k, ef_search)
    }

    /// Fetch a live record by id.
    pub fn get(&self, name: &str, id: VectorId) -> Result<VectorRecord> {
        let collection = self.registry.get(name)?;
        let record = collection.data.read().store.get(id)?;
        Ok(record)
    }

    // ── Maintenance ───────────────────────────────────────────────────

    /// Rebuild a collection's store and graph without its tombstones.
    ///
    /// Searches keep running against the old graph for the whole rebuild;
    /// only the final swap takes the write lock. Returns the number of
    /// tombstones physically removed.
    #[instrument(skip(self), fields(collection = name))]
    pub fn compact(&self, name: &str) -> Result<usize> {
        let collection = self.registry.get(name)?;

        // Phase A: snapshot live records under the read lock.
        let (live, next_id, dimension, metric, params, purgeable) = {
            let data = collection.data.read();
            let live: Vec<VectorRecord> = data.store.scan().collect();
            (
                live,
                data.store.peek_next_id(),
                data.dimension,
                data.metric,
                data.index.params().clone(),
                data.store.deleted_count(),
            )
        };

        // Phase B: rebuild with no lock held.
        let mut new_store = VectorStore::new(dimension);
        let mut new_index = HnswIndex::new(dimension, metric, params);
        let rebuilt: std::collections::HashSet<VectorId> =
            live.iter().map(|r| r.id).collect();
        for record in &live {
            let slot = new_store.restore(record.id, &record.vector, record.metadata.clone())?;
            new_index.insert(&new_store, slot)?;
        }
        new_store.ensure_next_id(next_id);

        if let Err(e) = new_index.validate_reachability() {
            crate::metrics::COMPACTIONS_TOTAL
                .with_label_values(&[name, "error"])
                .inc();
            return Err(e);
        }

        // Phase C: swap under the write lock, catching up with mutations
        // that landed during the rebuild.
        {
            let mut data = collection.data.write();

            // Inserts that arrived during Phase B.
            let late: Vec<VectorRecord> = data
                .store
                .scan()
                .filter(|r| !rebuilt.contains(&r.id))
                .collect();
            for record in late {
                let slot =
                    new_store.restore(record.id, &record.vector, record.metadata.clone())?;
                new_index.insert(&new_store, slot)?;
            }

            // Deletes that arrived during Phase B.
            for id in &rebuilt {
                if !data.store.contains_live(*id) {
                    let slot = new_store.mark_deleted(*id)?;
                    new_index.delete(slot)?;
                }
            }

            new_store.ensure_next_id(data.store.peek_next_id());
            data.store = new_store;
            data.index = new_index;
        }

        crate::metrics::COMPACTIONS_TOTAL
            .with_label_values(&[name, "ok"])
            .inc();
        info!(collection = name, purged = purgeable, "compaction complete");
        Ok(purgeable)
    }

    /// Snapshot every collection and truncate the write-ahead log.
    ///
    /// Appenders are frozen for the duration, so the snapshot set and the
    /// truncation are mutually consistent.
    #[instrument(skip(self))]
    pub fn snapshot(&self) -> Result<()> {
        let gate = self.wal.freeze();

        let result = (|| -> Result<()> {
            let handles = self.registry.handles();
            for (_, collection) in &handles {
                let data = collection.data.read();
                crate::wal::snapshot::save_collection(&data, self.data_dir())?;
            }

            // Prune snapshots of collections that no longer exist.
            let names: std::collections::HashSet<String> =
                handles.into_iter().map(|(name, _)| name).collect();
            for entry in std::fs::read_dir(self.data_dir())? {
                let path = entry?.path();
                if path.extension().and_then(|s| s.to_str()) != Some("snap") {
                    continue;
                }
                let stem = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default();
                if !names.contains(stem) {
                    if let Err(e) = std::fs::remove_file(&path) {
                        warn!(path = %path.display(), error = %e, "failed to prune snapshot");
                    }
                }
            }

            self.wal.truncate()
        })();
        drop(gate);

        let status = if result.is_ok() { "ok" } else { "error" };
        crate::metrics::SNAPSHOTS_TOTAL
            .with_label_values(&[status])
            .inc();
        result
    }

    // ── Recovery ──────────────────────────────────────────────────────

    /// Apply one journaled operation during startup.
    ///
    /// Replay is idempotent against snapshot state: operations whose effect
    /// is already present are skipped, so a log that overlaps the snapshots
    /// converges instead of erroring.
    fn apply_replayed(&self, record: WalRecord) {
        let name = record.collection;
        match record.op {
            WalOp::CreateCollection {
                dimension,
                metric,
                params,
                created_at,
            } => {
                if self.registry.get(&name).is_ok() {
                    return;
                }
                if let Err(e) = self
                    .registry
                    .create(&name, dimension, metric, params, created_at)
                {
                    warn!(collection = %name, error = %e, "replay: create failed");
                }
            }
            WalOp::DeleteCollection => {
                if self.registry.remove(&name).is_err() {
                    return;
                }
                if let Err(e) = crate::wal::snapshot::remove_snapshot(self.data_dir(), &name) {
                    warn!(collection = %name, error = %e, "replay: snapshot removal failed");
                }
            }
            WalOp::Insert { records } => {
                let Ok(collection) = self.registry.get(&name) else {
                    warn!(collection = %name, "replay: insert into missing collection");
                    return;
                };
                let mut data = collection.data.write();
                for record in records {
                    if data.store.contains_id(record.id) {
                        continue;
                    }
                    if let Err(e) = apply_insert(&mut data, std::slice::from_ref(&record)) {
                        warn!(collection = %name, id = record.id, error = %e, "replay: insert failed");
                    }
                }
            }
            WalOp::Delete { ids } => {
                let Ok(collection) = self.registry.get(&name) else {
                    warn!(collection = %name, "replay: delete in missing collection");
                    return;
                };
                let mut data = collection.data.write();
                for id in ids {
                    if !data.store.contains_live(id) {
                        continue;
                    }
                    if let Err(e) = apply_delete(&mut data, &[id]) {
                        warn!(collection = %name, id, error = %e, "replay: delete failed");
                    }
                }
            }
        }
    }

    fn validate_collection_name(&self, name: &str) -> Result<()> {
        if name.is_empty() || name.len() > self.config.limits.max_collection_name_len {
            return Err(CortexError::InvalidArgument(format!(
                "collection name must be 1-{} characters",
                self.config.limits.max_collection_name_len
            )));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(CortexError::InvalidArgument(
                "collection name may only contain [A-Za-z0-9._-]".into(),
            ));
        }
        Ok(())
    }
}

/// Append journaled records to a collection's store and graph.
fn apply_insert(data: &mut CollectionData, records: &[VectorRecord]) -> Result<()> {
    for record in records {
        let slot = data
            .store
            .restore(record.id, &record.vector, record.metadata.clone())?;
        data.index.insert(&data.store, slot)?;
    }
    Ok(())
}

/// Tombstone journaled ids in a collection's store and graph.
fn apply_delete(data: &mut CollectionData, ids: &[VectorId]) -> Result<()> {
    for &id in ids {
        let slot = data.store.mark_deleted(id)?;
        data.index.delete(slot)?;
    }
    Ok(())
}
