//! JSON frames exchanged with alert clients.
//!
//! Every frame is `{"type": ..., "data": ...}`. The server pushes
//! `connected` on accept and `new_detection` on every confirmation; a client
//! may send `{"type": "request_update"}` and gets `detections_update` (or
//! `error`) back.

use chrono::Utc;
use groundwatch_pipeline::StatisticsAggregator;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const CONNECTED_EVENT: &str = "connected";
pub const DETECTIONS_UPDATE_EVENT: &str = "detections_update";
pub const ERROR_EVENT: &str = "error";

/// Frames a client may send.
#[derive(Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    /// Ask for the detections of the last hour.
    RequestUpdate,
}

pub fn event(kind: &str, data: impl Serialize) -> Value {
    json!({ "type": kind, "data": data })
}

/// The reply to one inbound text frame, if it calls for one. Unknown or
/// malformed frames are ignored.
pub async fn reply_to(text: &str, stats: &StatisticsAggregator) -> Option<Value> {
    let request = match serde_json::from_str::<ClientRequest>(text) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unrecognised client frame");
            return None;
        }
    };

    match request {
        ClientRequest::RequestUpdate => Some(match stats.live().await {
            Ok(detections) => event(
                DETECTIONS_UPDATE_EVENT,
                json!({ "detections": detections, "timestamp": Utc::now() }),
            ),
            Err(e) => {
                tracing::error!(error = %e, "Failed to load live detections for client");
                event(
                    ERROR_EVENT,
                    json!({ "message": "Live detections are unavailable" }),
                )
            }
        }),
    }
}
