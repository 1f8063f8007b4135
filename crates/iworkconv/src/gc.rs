//! Time-to-live garbage collection over a storage backend.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::storage::StorageAdapter;

/// Deletes every blob older than `ttl` as of `now`. Returns how many blobs
/// were deleted.
///
/// Backends that cannot enumerate their contents are skipped. Individual
/// delete failures are logged and do not abort the sweep.
pub async fn sweep(
    storage: &Arc<dyn StorageAdapter>,
    ttl: Duration,
    now: DateTime<Utc>,
) -> usize {
    let metas = match storage.list().await {
        Ok(Some(metas)) => metas,
        Ok(None) => {
            log::debug!("Storage backend does not support listing, skipping sweep");
            return 0;
        }
        Err(e) => {
            log::error!("Could not list stored blobs for sweep: {}", e);
            return 0;
        }
    };

    let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
    let mut deleted = 0;
    for meta in metas {
        if now.signed_duration_since(meta.created_at) <= ttl {
            continue;
        }
        match storage.delete(&meta.id).await {
            Ok(()) => {
                log::info!("Expired blob {} ({}) deleted", meta.id, meta.name);
                deleted += 1;
            }
            Err(e) => log::warn!("Could not delete expired blob {}: {}", meta.id, e),
        }
    }
    deleted
}

/// Spawns a background loop sweeping `storage` every `interval`.
pub fn spawn(storage: Arc<dyn StorageAdapter>, ttl: Duration, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately; skip it so a fresh process does not
        // sweep before it has done anything.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let deleted = sweep(&storage, ttl, Utc::now()).await;
            if deleted > 0 {
                log::info!("Sweep removed {} expired blobs", deleted);
            }
        }
    });
}
