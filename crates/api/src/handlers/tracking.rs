use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/tracking/active
///
/// Sightings currently held by the tracker, most recently seen first.
pub async fn active_sightings(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let sightings = state.tracker.snapshot().await?;

    Ok(Json(DataResponse { data: sightings }))
}
