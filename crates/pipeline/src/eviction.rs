//! Periodic eviction of stale sightings.
//!
//! Each tick evicts idle sightings from the tracker and purges tracking rows
//! older than the retention window from the store. A sweep runs on its own
//! task behind a try-lock; a tick that finds the previous sweep still running
//! is skipped.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use groundwatch_db::DetectionStore;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::actor::TrackerHandle;

pub struct EvictionScheduler {
    tracker: TrackerHandle,
    store: Arc<dyn DetectionStore>,
    interval: Duration,
    retention: chrono::Duration,
    sweep_lock: Arc<Mutex<()>>,
}

impl EvictionScheduler {
    pub fn new(
        tracker: TrackerHandle,
        store: Arc<dyn DetectionStore>,
        interval: Duration,
        retention: chrono::Duration,
    ) -> Self {
        Self {
            tracker,
            store,
            interval,
            retention,
            sweep_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Run the eviction loop until `cancel` is triggered.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            retention_secs = self.retention.num_seconds(),
            "Eviction scheduler started"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Eviction scheduler stopping");
                    break;
                }
                _ = interval.tick() => {
                    match Arc::clone(&self.sweep_lock).try_lock_owned() {
                        Ok(guard) => {
                            tokio::spawn(sweep(
                                guard,
                                self.tracker.clone(),
                                Arc::clone(&self.store),
                                self.retention,
                            ));
                        }
                        Err(_) => {
                            tracing::debug!("Previous eviction sweep still running, skipping tick");
                        }
                    }
                }
            }
        }
    }
}

async fn sweep(
    _guard: OwnedMutexGuard<()>,
    tracker: TrackerHandle,
    store: Arc<dyn DetectionStore>,
    retention: chrono::Duration,
) {
    let now = Utc::now();

    match tracker.evict(now).await {
        Ok(evicted) if !evicted.is_empty() => {
            tracing::debug!(evicted = evicted.len(), "Eviction sweep removed sightings");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Eviction sweep could not reach tracker");
            return;
        }
    }

    match store.purge_tracking_older_than(now - retention).await {
        Ok(0) => {}
        Ok(purged) => tracing::debug!(purged, "Purged old tracking rows"),
        Err(e) => tracing::warn!(error = %e, "Tracking purge failed, skipping this cycle"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
