//! Durability layer: write-ahead log and collection snapshots.
//!
//! Every mutation is journaled and fsynced before it is applied in memory or
//! acknowledged. Periodic snapshots persist whole collections and truncate
//! the log, bounding replay time on restart.

pub mod log;
pub mod snapshot;

pub use log::{ReplayStats, WalOp, WalRecord, WriteAheadLog};
