//! Background maintenance: periodic snapshots and tombstone-driven
//! compaction.
//!
//! The loop is spawned by the embedding application and stopped through a
//! `watch` channel; a `0` interval disables the corresponding timer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::db::CortexDb;

/// Run the maintenance loop until `shutdown` flips to `true`.
pub async fn maintenance_loop(db: Arc<CortexDb>, mut shutdown: watch::Receiver<bool>) {
    let snapshot_secs = db.config().snapshot.interval_secs;
    let compaction_secs = db.config().compaction.interval_secs;

    let mut snapshot_timer = tokio::time::interval(Duration::from_secs(snapshot_secs.max(1)));
    let mut compaction_timer = tokio::time::interval(Duration::from_secs(compaction_secs.max(1)));
    snapshot_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    compaction_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // Consume the immediate first tick of each timer.
    snapshot_timer.tick().await;
    compaction_timer.tick().await;

    loop {
        tokio::select! {
            _ = compaction_timer.tick(), if compaction_secs > 0 => {
                compaction_sweep(&db).await;
            }
            _ = snapshot_timer.tick(), if snapshot_secs > 0 => {
                let db = db.clone();
                let result = tokio::task::spawn_blocking(move || db.snapshot()).await;
                match result {
                    Ok(Ok(())) => debug!("snapshot cycle complete"),
                    Ok(Err(e)) => warn!(error = %e, "snapshot cycle failed"),
                    Err(e) => warn!(error = %e, "snapshot task panicked"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    debug!("maintenance loop stopped");
}

/// Compact every collection whose tombstone share crosses the configured
/// threshold.
async fn compaction_sweep(db: &Arc<CortexDb>) {
    let threshold = db.config().compaction.tombstone_ratio;
    let min_tombstones = db.config().compaction.min_tombstones;

    for name in db.list_collections() {
        let Ok(info) = db.collection_info(&name) else {
            continue;
        };
        let total = info.live_count + info.deleted_count;
        if total == 0 || info.deleted_count < min_tombstones {
            continue;
        }
        if (info.deleted_count as f64) / (total as f64) < threshold {
            continue;
        }

        let db = db.clone();
        let collection = name.clone();
        let result = tokio::task::spawn_blocking(move || db.compact(&collection)).await;
        match result {
            Ok(Ok(purged)) => debug!(collection = %name, purged, "compacted"),
            Ok(Err(e)) => warn!(collection = %name, error = %e, "compaction failed"),
            Err(e) => warn!(collection = %name, error = %e, "compaction task panicked"),
        }
    }
}
