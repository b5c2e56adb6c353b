//! Background task that persists confirmed sightings.
//!
//! Each [`Confirmation`] is inserted with a bounded retry policy. On success
//! the tracking row is refreshed, a [`DetectionNotification`] is published
//! and the tracker is told the sighting is saved. On failure the tracker is
//! told to retry on the sighting's next qualifying update.

use std::sync::Arc;
use std::time::Duration;

use groundwatch_db::models::detection::Detection;
use groundwatch_db::{DetectionStore, StoreError};
use groundwatch_events::{DetectionNotification, EventBus};
use tokio::sync::mpsc;

use crate::actor::WeakTrackerHandle;
use crate::tracker::{Confirmation, PersistOutcome};

/// Backoff between insert attempts; one final attempt follows the last delay.
pub const RETRY_DELAYS: [Duration; 2] = [Duration::from_millis(100), Duration::from_millis(400)];

pub struct DetectionWriter {
    store: Arc<dyn DetectionStore>,
    event_bus: Arc<EventBus>,
    tracker: WeakTrackerHandle,
}

impl DetectionWriter {
    pub(crate) fn new(
        store: Arc<dyn DetectionStore>,
        event_bus: Arc<EventBus>,
        tracker: WeakTrackerHandle,
    ) -> Self {
        Self {
            store,
            event_bus,
            tracker,
        }
    }

    /// Drain confirmations until the sending side (the tracker) closes.
    pub async fn run(self, mut rx: mpsc::Receiver<Confirmation>) {
        tracing::info!("Detection writer started");
        while let Some(confirmation) = rx.recv().await {
            self.handle(confirmation).await;
        }
        tracing::info!("Detection writer stopped");
    }

    async fn handle(&self, confirmation: Confirmation) {
        let key = confirmation.key;
        let outcome = match self.persist(&confirmation).await {
            Ok(record) => {
                let id = record.id;
                tracing::info!(location_key = %key, detection_id = id, "Detection stored");

                if let Err(e) = self.store.record_tracking(&confirmation.tracking).await {
                    tracing::warn!(location_key = %key, error = %e, "Failed to update tracking row");
                }

                self.event_bus
                    .publish(DetectionNotification::new(record, key.to_string()));

                PersistOutcome::Persisted {
                    key,
                    generation: confirmation.generation,
                    id,
                }
            }
            Err(e) => {
                tracing::error!(
                    location_key = %key,
                    error = %e,
                    "Failed to store detection after all retries"
                );
                PersistOutcome::retry(&confirmation)
            }
        };

        if !self.tracker.report(outcome).await {
            tracing::debug!(location_key = %key, "Tracker stopped before write was reported");
        }
    }

    /// Insert with retry: one attempt per entry in [`RETRY_DELAYS`], then a
    /// final attempt after the last delay.
    async fn persist(&self, confirmation: &Confirmation) -> Result<Detection, StoreError> {
        let mut last_err = None;

        for (attempt, delay) in RETRY_DELAYS.iter().enumerate() {
            match self.store.insert_detection(&confirmation.record).await {
                Ok(record) => return Ok(record),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        location_key = %confirmation.key,
                        error = %e,
                        "Detection insert failed, retrying"
                    );
                    last_err = Some(e);
                    tokio::time::sleep(*delay).await;
                }
            }
        }

        match self.store.insert_detection(&confirmation.record).await {
            Ok(record) => Ok(record),
            Err(e) => Err(last_err.unwrap_or(e)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
