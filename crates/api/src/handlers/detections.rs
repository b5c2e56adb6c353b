//! Handlers for confirmed detections and raw detection ingestion.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use groundwatch_core::detection::DetectionPayload;
use groundwatch_core::types::{clamp_limit, clamp_offset};
use groundwatch_pipeline::IngestOutcome;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// Default page size for `GET /detections`.
pub const DEFAULT_LIST_LIMIT: i64 = 100;
/// Largest page size a client may request.
pub const MAX_LIST_LIMIT: i64 = 1000;

/// GET /api/v1/detections
///
/// All confirmed detections, newest first.
pub async fn list_detections(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    let limit = clamp_limit(params.limit, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT);
    let offset = clamp_offset(params.offset);
    let detections = state.store.list_detections(limit, offset).await?;

    Ok(Json(DataResponse { data: detections }))
}

/// GET /api/v1/detections/live
pub async fn live_detections(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let detections = state.stats.live().await?;

    Ok(Json(DataResponse { data: detections }))
}

/// Acknowledgement for an accepted raw detection.
#[derive(Debug, Serialize)]
pub struct IngestAck {
    pub outcome: &'static str,
    pub location_key: String,
}

impl From<&IngestOutcome> for IngestAck {
    fn from(outcome: &IngestOutcome) -> Self {
        Self {
            outcome: outcome.label(),
            location_key: outcome.key().to_string(),
        }
    }
}

/// POST /api/v1/detections/ingest
///
/// Validate a raw detection and hand it to the tracker. Persistence of a
/// confirmed sighting happens in the background, hence `202 Accepted`.
pub async fn ingest_detection(
    State(state): State<AppState>,
    payload: Result<Json<DetectionPayload>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(payload) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let outcome = state.ingestor.ingest(payload).await?;

    if outcome.is_confirmed() {
        tracing::info!(location_key = %outcome.key(), "Sighting confirmed via API");
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: IngestAck::from(&outcome),
        }),
    ))
}
