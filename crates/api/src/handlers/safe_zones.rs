use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use groundwatch_db::models::safe_zone::CreateSafeZone;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/safe-zones
pub async fn list_safe_zones(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let zones = state.store.list_safe_zones().await?;

    Ok(Json(DataResponse { data: zones }))
}

/// POST /api/v1/safe-zones
///
/// Store the zone and make it visible to the classifier immediately.
pub async fn create_safe_zone(
    State(state): State<AppState>,
    input: Result<Json<CreateSafeZone>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = input.map_err(|e| AppError::BadRequest(e.body_text()))?;
    input.validate()?;

    let zone = state.store.create_safe_zone(&input).await?;
    state.zones.add(zone.geofence()).await;
    tracing::info!(zone_id = zone.id, name = %zone.name, "Safe zone created");

    Ok((StatusCode::CREATED, Json(DataResponse { data: zone })))
}
