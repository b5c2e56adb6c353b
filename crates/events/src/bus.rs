//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] fans [`DetectionNotification`]s out to every subscriber
//! (the WebSocket relay in production). Delivery is best-effort: there is no
//! replay for subscribers that join late or lag behind.

use chrono::Utc;
use groundwatch_core::types::Timestamp;
use groundwatch_db::models::detection::Detection;
use serde::Serialize;
use tokio::sync::broadcast;

/// Event name used on the real-time channel.
pub const NEW_DETECTION_EVENT: &str = "new_detection";

// ---------------------------------------------------------------------------
// DetectionNotification
// ---------------------------------------------------------------------------

/// A confirmed sighting that has just been persisted.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionNotification {
    /// The stored record, including its id.
    pub record: Detection,

    /// How long the sighting had been continuously observed at confirmation.
    pub duration_seconds: f64,

    /// Location key of the sighting that produced the record.
    pub location_key: String,

    /// When the notification was created (UTC).
    pub published_at: Timestamp,
}

impl DetectionNotification {
    pub fn new(record: Detection, location_key: impl Into<String>) -> Self {
        Self {
            duration_seconds: record.duration_seconds,
            record,
            location_key: location_key.into(),
            published_at: Utc::now(),
        }
    }

    /// Client-facing message: `{"type": "new_detection", "data": {...}}`.
    pub fn to_message(&self) -> serde_json::Value {
        serde_json::json!({
            "type": NEW_DETECTION_EVENT,
            "data": self.record,
        })
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`DetectionNotification`].
pub struct EventBus {
    sender: broadcast::Sender<DetectionNotification>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a notification to all current subscribers.
    ///
    /// If there are no active subscribers the notification is dropped.
    pub fn publish(&self, notification: DetectionNotification) {
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(notification);
    }

    /// Subscribe to all notifications published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<DetectionNotification> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
