use std::sync::Arc;

use groundwatch_events::DetectionNotification;
use tokio::sync::broadcast;

use crate::ws::WsManager;

/// Forwards every [`DetectionNotification`] on the event bus to all
/// connected WebSocket clients as a `new_detection` message.
pub struct NotificationRelay {
    ws_manager: Arc<WsManager>,
}

impl NotificationRelay {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run the relay loop.
    ///
    /// Exits when the channel is closed (i.e. every
    /// [`EventBus`](groundwatch_events::EventBus) handle has been dropped).
    pub async fn run(self, mut receiver: broadcast::Receiver<DetectionNotification>) {
        loop {
            match receiver.recv().await {
                Ok(notification) => self.relay(&notification).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification relay lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notification relay shutting down");
                    break;
                }
            }
        }
    }

    async fn relay(&self, notification: &DetectionNotification) {
        let delivered = self
            .ws_manager
            .broadcast_json(&notification.to_message())
            .await;
        tracing::debug!(
            detection_id = notification.record.id,
            location_key = %notification.location_key,
            delivered,
            "Relayed detection notification"
        );
    }
}
