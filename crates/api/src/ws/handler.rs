use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde_json::json;

use crate::state::AppState;
use crate::ws::protocol::{self, CONNECTED_EVENT};

/// HTTP handler that upgrades the connection to WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Serve one alert client until it disconnects.
///
/// Outbound frames are drained from the client's queue by a spawned task;
/// inbound text frames are answered through the same queue.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let manager = &state.ws_manager;
    let (id, mut queue) = manager.register().await;
    tracing::info!(client_id = %id, "Alert client connected");

    manager
        .send_json(&id, &protocol::event(CONNECTED_EVENT, json!({ "connection_id": id })))
        .await;

    let (mut sink, mut stream) = socket.split();
    let send_task = tokio::spawn(async move {
        while let Some(frame) = queue.recv().await {
            if sink.send(frame).await.is_err() {
                tracing::debug!(client_id = %id, "Alert client sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if let Some(reply) = protocol::reply_to(text.as_str(), &state.stats).await {
                    manager.send_json(&id, &reply).await;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(client_id = %id, error = %e, "Alert client receive error");
                break;
            }
        }
    }

    manager.remove(&id).await;
    send_task.abort();
    tracing::info!(client_id = %id, "Alert client disconnected");
}
