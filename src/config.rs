//! Engine configuration.
//!
//! All sections have serde defaults so a config file only needs to name the
//! values it overrides. `IndexParams` doubles as the per-collection index
//! parameter set: the `[index]` section supplies defaults for new
//! collections, and the chosen values are frozen into the collection at
//! creation time.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CortexError, Result};

/// HNSW graph parameters, fixed per collection at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexParams {
    /// Max neighbors per node per layer (layers above 0).
    pub m: usize,
    /// Max neighbors per node at layer 0.
    pub m_max0: usize,
    /// Candidate list size while inserting.
    pub ef_construction: usize,
    /// Default candidate list size while querying; overridable per query.
    pub ef_search: usize,
    /// Cap on graph layers.
    pub max_layers: usize,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            m: 16,
            m_max0: 32,
            ef_construction: 200,
            ef_search: 50,
            max_layers: 16,
        }
    }
}

impl IndexParams {
    /// Reject parameter sets the graph cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.m == 0 || self.m_max0 < self.m {
            return Err(CortexError::InvalidArgument(format!(
                "index params require 0 < m <= m_max0, got m={} m_max0={}",
                self.m, self.m_max0
            )));
        }
        if self.ef_construction == 0 || self.ef_search == 0 {
            return Err(CortexError::InvalidArgument(
                "ef_construction and ef_search must be > 0".into(),
            ));
        }
        if self.max_layers == 0 {
            return Err(CortexError::InvalidArgument(
                "max_layers must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Snapshot scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Seconds between automatic snapshot cycles. 0 disables the timer.
    pub interval_secs: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self { interval_secs: 300 }
    }
}

/// Compaction scheduling and thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    /// Seconds between tombstone-ratio checks. 0 disables the timer.
    pub interval_secs: u64,
    /// Tombstoned fraction of a collection that triggers a rebuild.
    pub tombstone_ratio: f64,
    /// Minimum tombstone count before the ratio is considered.
    pub min_tombstones: usize,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            tombstone_ratio: 0.3,
            min_tombstones: 128,
        }
    }
}

/// Input validation limits applied at the public API surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_dimension: usize,
    pub max_batch_size: usize,
    pub max_collection_name_len: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_dimension: 4096,
            max_batch_size: 10_000,
            max_collection_name_len: 128,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CortexConfig {
    /// Directory holding the WAL and snapshot files.
    pub data_dir: PathBuf,
    #[serde(default)]
    pub index: IndexParams,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub compaction: CompactionConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl CortexConfig {
    /// Config with defaults for everything except the data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            index: IndexParams::default(),
            snapshot: SnapshotConfig::default(),
            compaction: CompactionConfig::default(),
            limits: LimitsConfig::default(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&raw).map_err(|e| CortexError::Config(e.to_string()))?;
        config.index.validate()?;
        Ok(config)
    }
}
