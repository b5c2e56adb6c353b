//! Registry of connected alert clients.
//!
//! Each client owns an unbounded outbound queue that its socket task drains.
//! Events are encoded to a text frame once and the frame is shared by every
//! recipient.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Outbound frames queued for one client.
pub type ClientQueue = mpsc::UnboundedReceiver<Message>;

#[derive(Default)]
pub struct WsManager {
    clients: RwLock<HashMap<Uuid, mpsc::UnboundedSender<Message>>>,
}

impl WsManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client. Returns its id and the queue its socket task drains.
    pub async fn register(&self) -> (Uuid, ClientQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.clients.write().await.insert(id, tx);
        (id, rx)
    }

    pub async fn remove(&self, id: &Uuid) -> bool {
        self.clients.write().await.remove(id).is_some()
    }

    /// Queue `event` for every client and return how many were reached.
    /// Clients whose queue has closed are dropped from the registry.
    pub async fn broadcast_json<T: Serialize + ?Sized>(&self, event: &T) -> usize {
        let Some(frame) = encode(event) else {
            return 0;
        };
        let mut clients = self.clients.write().await;
        clients.retain(|_, tx| tx.send(frame.clone()).is_ok());
        clients.len()
    }

    /// Queue `event` for one client. `false` if it is unknown or gone.
    pub async fn send_json<T: Serialize + ?Sized>(&self, id: &Uuid, event: &T) -> bool {
        let Some(frame) = encode(event) else {
            return false;
        };
        match self.clients.read().await.get(id) {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Queue a Ping for every client; returns how many were reached.
    pub async fn ping_all(&self) -> usize {
        let clients = self.clients.read().await;
        clients
            .values()
            .filter(|tx| tx.send(Message::Ping(Bytes::new())).is_ok())
            .count()
    }

    /// Queue a Close for every client and forget them all.
    pub async fn shutdown_all(&self) -> usize {
        let mut clients = self.clients.write().await;
        for tx in clients.values() {
            let _ = tx.send(Message::Close(None));
        }
        let count = clients.len();
        clients.clear();
        tracing::info!(count, "Closed all alert client connections");
        count
    }
}

fn encode<T: Serialize + ?Sized>(event: &T) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode WebSocket event");
            None
        }
    }
}
