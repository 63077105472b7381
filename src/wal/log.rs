//! Append-only write-ahead log.
//!
//! One log file serves all collections; each record names its collection.
//! On-disk frame:
//!
//! ```text
//! op_type:u8 | name_len:u16 BE | name | payload_len:u32 BE | payload | checksum:u32 BE
//! ```
//!
//! The payload is the bincode-encoded [`WalOp`]; the checksum is xxh32 over
//! everything before it. A record is durable once `append` returns: the
//! frame is written, flushed, and fsynced under the file mutex.
//!
//! Recovery reads frames until the end of the file. The first frame that is
//! truncated or fails its checksum is the recovery boundary: frames before
//! it are replayed, it and everything after are discarded with a warning and
//! physically truncated away.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use bytes::{BufMut, BytesMut};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use tracing::warn;
use xxhash_rust::xxh32::xxh32;

use crate::config::IndexParams;
use crate::error::{CortexError, Result};
use crate::types::{DistanceMetric, VectorId, VectorRecord};

const WAL_FILE: &str = "wal.log";

/// Upper bounds applied while parsing frames, so a corrupt length field
/// cannot trigger an enormous allocation.
const MAX_NAME_LEN: usize = 1 << 10;
const MAX_PAYLOAD_LEN: usize = 1 << 30;

/// A journaled mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WalOp {
    CreateCollection {
        dimension: usize,
        metric: DistanceMetric,
        params: IndexParams,
        created_at: DateTime<Utc>,
    },
    DeleteCollection,
    Insert {
        records: Vec<VectorRecord>,
    },
    Delete {
        ids: Vec<VectorId>,
    },
}

impl WalOp {
    /// Frame-level operation tag, cross-checked against the decoded payload
    /// on replay.
    pub fn op_type(&self) -> u8 {
        match self {
            WalOp::CreateCollection { .. } => 1,
            WalOp::DeleteCollection => 2,
            WalOp::Insert { .. } => 3,
            WalOp::Delete { .. } => 4,
        }
    }
}

/// A [`WalOp`] addressed to a collection.
#[derive(Debug, Clone)]
pub struct WalRecord {
    pub collection: String,
    pub op: WalOp,
}

/// Diagnostics from a replay pass.
#[derive(Debug, Default)]
pub struct ReplayStats {
    /// Frames successfully decoded.
    pub entries: usize,
    /// Why replay stopped early, if it did.
    pub corruption: Option<String>,
    /// Length of the valid frame prefix.
    pub valid_bytes: u64,
}

/// Synchronous append-only write-ahead log.
///
/// `append` takes the write gate shared, so concurrent appenders interleave
/// freely; the snapshot cycle takes it exclusive to quiesce writers while it
/// persists collections and truncates the log.
pub struct WriteAheadLog {
    writer: Mutex<BufWriter<File>>,
    write_gate: RwLock<()>,
    path: PathBuf,
}

impl WriteAheadLog {
    /// Open or create the log file in append mode.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(WAL_FILE);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            write_gate: RwLock::new(()),
            path,
        })
    }

    /// Append a record and fsync it. The mutation may be applied in memory
    /// only after this returns.
    pub fn append(&self, record: &WalRecord) -> Result<()> {
        let framed = encode_frame(record)?;

        let _gate = self.write_gate.read();
        let mut writer = self.writer.lock();
        writer.write_all(&framed)?;
        writer.flush()?;
        writer.get_mut().sync_all()?;

        crate::metrics::WAL_APPENDS_TOTAL
            .with_label_values(&[&record.collection])
            .inc();
        Ok(())
    }

    /// Read every valid frame from the start of the log.
    pub fn replay(&self) -> Result<(Vec<WalRecord>, ReplayStats)> {
        let mut file = File::open(&self.path)?;
        let mut raw = Vec::new();
        file.read_to_end(&mut raw)?;

        let mut records = Vec::new();
        let mut stats = ReplayStats::default();
        let mut offset = 0usize;

        while offset < raw.len() {
            match decode_frame(&raw[offset..]) {
                Ok((record, consumed)) => {
                    records.push(record);
                    stats.entries += 1;
                    offset += consumed;
                }
                Err(reason) => {
                    warn!(
                        offset,
                        reason, "discarding corrupt write-ahead log tail"
                    );
                    stats.corruption = Some(reason);
                    break;
                }
            }
        }

        stats.valid_bytes = offset as u64;
        Ok((records, stats))
    }

    /// Replay the log and physically truncate any corrupt tail, so later
    /// appends land on a valid frame boundary.
    pub fn recover(&self) -> Result<(Vec<WalRecord>, ReplayStats)> {
        let (records, stats) = self.replay()?;
        let file_len = std::fs::metadata(&self.path)?.len();
        if stats.valid_bytes < file_len {
            warn!(
                valid_bytes = stats.valid_bytes,
                file_len, "truncating write-ahead log to last valid frame"
            );
            let file = OpenOptions::new().write(true).open(&self.path)?;
            file.set_len(stats.valid_bytes)?;
            file.sync_all()?;
            self.reopen()?;
        }
        Ok((records, stats))
    }

    /// Block appends until the returned guard drops. Held across the
    /// snapshot + truncate cycle.
    pub fn freeze(&self) -> RwLockWriteGuard<'_, ()> {
        self.write_gate.write()
    }

    /// Discard all frames. Callers hold the freeze guard so no append can
    /// race the truncation.
    pub fn truncate(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        let file = OpenOptions::new().write(true).open(&self.path)?;
        file.set_len(0)?;
        file.sync_all()?;
        *writer = BufWriter::new(OpenOptions::new().append(true).open(&self.path)?);
        Ok(())
    }

    fn reopen(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        *writer = BufWriter::new(OpenOptions::new().append(true).open(&self.path)?);
        Ok(())
    }
}

fn encode_frame(record: &WalRecord) -> Result<BytesMut> {
    let name = record.collection.as_bytes();
    if name.len() > MAX_NAME_LEN {
        return Err(CortexError::InvalidArgument(format!(
            "collection name too long for journal: {} bytes",
            name.len()
        )));
    }
    let payload = bincode::serialize(&record.op)?;

    let mut buf = BytesMut::with_capacity(1 + 2 + name.len() + 4 + payload.len() + 4);
    buf.put_u8(record.op.op_type());
    buf.put_u16(name.len() as u16);
    buf.put_slice(name);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(&payload);
    let checksum = xxh32(&buf, 0);
    buf.put_u32(checksum);
    Ok(buf)
}

/// Take the next `n` bytes of a frame, or report truncation.
fn take<'a>(
    raw: &'a [u8],
    pos: &mut usize,
    n: usize,
) -> std::result::Result<&'a [u8], String> {
    if *pos + n > raw.len() {
        return Err("truncated frame".into());
    }
    let slice = &raw[*pos..*pos + n];
    *pos += n;
    Ok(slice)
}

/// Decode one frame from the head of `raw`.
///
/// Returns the record and the frame's byte length, or a human-readable
/// reason when the frame is truncated or corrupt.
fn decode_frame(raw: &[u8]) -> std::result::Result<(WalRecord, usize), String> {
    let mut pos = 0usize;

    let op_type = take(raw, &mut pos, 1)?[0];
    let name_len = u16::from_be_bytes(take(raw, &mut pos, 2)?.try_into().unwrap()) as usize;
    if name_len > MAX_NAME_LEN {
        return Err(format!("implausible name length {name_len}"));
    }
    let name_bytes = take(raw, &mut pos, name_len)?;
    let collection = std::str::from_utf8(name_bytes)
        .map_err(|_| "collection name is not valid UTF-8".to_string())?
        .to_string();
    let payload_len = u32::from_be_bytes(take(raw, &mut pos, 4)?.try_into().unwrap()) as usize;
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(format!("implausible payload length {payload_len}"));
    }
    let payload = take(raw, &mut pos, payload_len)?.to_vec();
    let stored_checksum = u32::from_be_bytes(take(raw, &mut pos, 4)?.try_into().unwrap());

    let computed = xxh32(&raw[..pos - 4], 0);
    if computed != stored_checksum {
        return Err(format!(
            "checksum mismatch: stored {stored_checksum:#010x}, computed {computed:#010x}"
        ));
    }

    let op: WalOp =
        bincode::deserialize(&payload).map_err(|e| format!("payload decode failed: {e}"))?;
    if op.op_type() != op_type {
        return Err(format!(
            "frame tag {op_type} does not match payload tag {}",
            op.op_type()
        ));
    }

    Ok((WalRecord { collection, op }, pos))
}
