//! Route definitions for confirmed detections and raw ingestion.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::detections;
use crate::state::AppState;

/// Routes mounted at `/detections`.
///
/// ```text
/// GET    /          -> list_detections
/// GET    /live      -> live_detections
/// POST   /ingest    -> ingest_detection
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(detections::list_detections))
        .route("/live", get(detections::live_detections))
        .route("/ingest", post(detections::ingest_detection))
}
