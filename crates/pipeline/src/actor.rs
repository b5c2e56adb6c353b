//! Single-writer task owning the [`SightingTracker`].
//!
//! Every mutation (ingest, eviction, persistence reports) and every snapshot
//! goes through one bounded command channel, so the tracker map needs no
//! lock. Confirmed sightings are handed to the writer with `try_send`; the
//! actor never waits on durable I/O.

use std::sync::Arc;

use groundwatch_core::detection::RawDetection;
use groundwatch_core::geo::{GeoPosition, LocationKey};
use groundwatch_core::types::Timestamp;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use crate::error::PipelineError;
use crate::tracker::{
    Confirmation, IngestOutcome, PersistOutcome, SightingSnapshot, SightingTracker,
};
use crate::zones::ZoneRegistry;

/// Capacity of the actor's command channel.
pub const COMMAND_CHANNEL_CAPACITY: usize = 1024;

pub(crate) enum Command {
    Ingest {
        position: GeoPosition,
        raw: RawDetection,
        reply: oneshot::Sender<IngestOutcome>,
    },
    Evict {
        now: Timestamp,
        reply: oneshot::Sender<Vec<LocationKey>>,
    },
    PersistResult(PersistOutcome),
    Snapshot {
        reply: oneshot::Sender<Vec<SightingSnapshot>>,
    },
}

// ---------------------------------------------------------------------------
// TrackerHandle
// ---------------------------------------------------------------------------

/// Cloneable sender side of the tracker actor.
#[derive(Clone)]
pub struct TrackerHandle {
    tx: mpsc::Sender<Command>,
}

impl TrackerHandle {
    /// Fold a validated, projected detection into tracker state.
    ///
    /// The detection's arrival time is used as "now".
    pub async fn ingest(
        &self,
        position: GeoPosition,
        raw: RawDetection,
    ) -> Result<IngestOutcome, PipelineError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Ingest {
            position,
            raw,
            reply,
        })
        .await?;
        rx.await.map_err(|_| PipelineError::TrackerStopped)
    }

    /// Evict sightings idle for longer than the stale threshold at `now`.
    pub async fn evict(&self, now: Timestamp) -> Result<Vec<LocationKey>, PipelineError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Evict { now, reply }).await?;
        rx.await.map_err(|_| PipelineError::TrackerStopped)
    }

    /// All live sightings, most recently seen first.
    pub async fn snapshot(&self) -> Result<Vec<SightingSnapshot>, PipelineError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply }).await?;
        rx.await.map_err(|_| PipelineError::TrackerStopped)
    }

    pub(crate) fn downgrade(&self) -> WeakTrackerHandle {
        WeakTrackerHandle {
            tx: self.tx.downgrade(),
        }
    }

    async fn send(&self, command: Command) -> Result<(), PipelineError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| PipelineError::TrackerStopped)
    }
}

/// Reporting handle that does not keep the actor alive.
#[derive(Clone)]
pub(crate) struct WeakTrackerHandle {
    tx: mpsc::WeakSender<Command>,
}

impl WeakTrackerHandle {
    /// Deliver a writer report. Returns `false` if the actor has stopped.
    pub(crate) async fn report(&self, outcome: PersistOutcome) -> bool {
        let Some(tx) = self.tx.upgrade() else {
            return false;
        };
        tx.send(Command::PersistResult(outcome)).await.is_ok()
    }
}

// ---------------------------------------------------------------------------
// TrackerActor
// ---------------------------------------------------------------------------

pub struct TrackerActor {
    tracker: SightingTracker,
    zones: Arc<ZoneRegistry>,
    writer_tx: mpsc::Sender<Confirmation>,
    rx: mpsc::Receiver<Command>,
}

impl TrackerActor {
    /// Create the actor and its handle. Call [`run`](Self::run) on a task.
    pub fn new(
        tracker: SightingTracker,
        zones: Arc<ZoneRegistry>,
        writer_tx: mpsc::Sender<Confirmation>,
    ) -> (Self, TrackerHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let actor = Self {
            tracker,
            zones,
            writer_tx,
            rx,
        };
        (actor, TrackerHandle { tx })
    }

    /// Process commands until every handle has been dropped.
    pub async fn run(mut self) {
        tracing::info!("Sighting tracker started");
        while let Some(command) = self.rx.recv().await {
            match command {
                Command::Ingest {
                    position,
                    raw,
                    reply,
                } => {
                    let outcome = self.ingest(position, raw).await;
                    let _ = reply.send(outcome);
                }
                Command::Evict { now, reply } => {
                    let evicted = self.tracker.evict(now);
                    if !evicted.is_empty() {
                        tracing::debug!(
                            evicted = evicted.len(),
                            remaining = self.tracker.len(),
                            "Evicted stale sightings"
                        );
                    }
                    let _ = reply.send(evicted);
                }
                Command::PersistResult(outcome) => {
                    if !self.tracker.record_outcome(&outcome) {
                        tracing::debug!(?outcome, "Ignoring report for a sighting no longer tracked");
                    }
                }
                Command::Snapshot { reply } => {
                    let _ = reply.send(self.tracker.snapshot());
                }
            }
        }
        tracing::info!("Sighting tracker stopped");
    }

    async fn ingest(&mut self, position: GeoPosition, raw: RawDetection) -> IngestOutcome {
        let zones = self.zones.current().await;
        let now = raw.arrival_time;
        let outcome = self.tracker.ingest(position, raw, now, &zones);

        match &outcome {
            IngestOutcome::Started { key } => {
                tracing::debug!(location_key = %key, "New sighting");
            }
            IngestOutcome::Updated { .. } => {}
            IngestOutcome::Confirmed(confirmation) => {
                tracing::info!(
                    location_key = %confirmation.key,
                    alert_level = %confirmation.record.alert_level,
                    duration_seconds = confirmation.record.duration_seconds,
                    "Sighting confirmed"
                );
                self.hand_off(confirmation.clone());
            }
        }
        outcome
    }

    fn hand_off(&mut self, confirmation: Confirmation) {
        let retry = PersistOutcome::retry(&confirmation);
        match self.writer_tx.try_send(confirmation) {
            Ok(()) => {}
            Err(TrySendError::Full(c)) => {
                tracing::warn!(location_key = %c.key, "Writer queue full, will retry on next update");
                self.tracker.record_outcome(&retry);
            }
            Err(TrySendError::Closed(c)) => {
                tracing::error!(location_key = %c.key, "Writer stopped, will retry on next update");
                self.tracker.record_outcome(&retry);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
