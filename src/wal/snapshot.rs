//! Collection snapshots.
//!
//! Each collection persists to `<name>.snap`: the bincode-encoded
//! [`CollectionData`] (header fields, record block, graph block) followed by
//! a magic + xxh32 footer. Writes go to a temp file and rename into place,
//! so a crash mid-write leaves the previous snapshot intact.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use xxhash_rust::xxh32::xxh32;

use crate::error::{CortexError, Result};
use crate::registry::CollectionData;

/// Footer magic, bumped when the snapshot layout changes.
const SNAPSHOT_MAGIC: &[u8; 4] = b"CXS1";
const SNAPSHOT_EXT: &str = "snap";

pub fn snapshot_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.{SNAPSHOT_EXT}"))
}

/// Persist one collection atomically.
pub fn save_collection(data: &CollectionData, dir: &Path) -> Result<()> {
    let payload = bincode::serialize(data)?;
    let checksum = xxh32(&payload, 0);

    std::fs::create_dir_all(dir)?;
    let path = snapshot_path(dir, &data.name);
    let tmp_path = dir.join(format!("{}.{SNAPSHOT_EXT}.tmp", data.name));

    let mut output = Vec::with_capacity(payload.len() + 8);
    output.extend_from_slice(&payload);
    output.extend_from_slice(SNAPSHOT_MAGIC);
    output.extend_from_slice(&checksum.to_be_bytes());

    std::fs::write(&tmp_path, &output)?;
    std::fs::rename(&tmp_path, &path)?;

    debug!(
        collection = %data.name,
        bytes = payload.len(),
        "wrote snapshot"
    );
    Ok(())
}

/// Load and verify one snapshot file.
pub fn load_collection(path: &Path) -> Result<CollectionData> {
    let raw = std::fs::read(path)?;
    if raw.len() < 8 || &raw[raw.len() - 8..raw.len() - 4] != SNAPSHOT_MAGIC {
        return Err(CortexError::CorruptLog(format!(
            "snapshot {} has no valid footer",
            path.display()
        )));
    }

    let payload = &raw[..raw.len() - 8];
    let stored = u32::from_be_bytes(raw[raw.len() - 4..].try_into().unwrap());
    let computed = xxh32(payload, 0);
    if stored != computed {
        return Err(CortexError::CorruptLog(format!(
            "snapshot {} checksum mismatch: stored {stored:#010x}, computed {computed:#010x}",
            path.display()
        )));
    }

    let data: CollectionData = bincode::deserialize(payload)?;
    data.validate()?;

    info!(
        collection = %data.name,
        live = data.store.live_count(),
        "loaded snapshot"
    );
    Ok(data)
}

/// Load every readable snapshot in `dir`. Unreadable files are skipped with
/// a warning; the WAL replay that follows decides what state is current.
pub fn load_all(dir: &Path) -> Result<Vec<CollectionData>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut collections = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) != Some(SNAPSHOT_EXT) {
            continue;
        }
        match load_collection(&path) {
            Ok(data) => collections.push(data),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable snapshot");
            }
        }
    }
    Ok(collections)
}

/// Delete a collection's snapshot file if present.
pub fn remove_snapshot(dir: &Path, name: &str) -> Result<()> {
    let path = snapshot_path(dir, name);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
