use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::error::AppResult;
use crate::query::PeriodParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/statistics?period=today|week|month|all
pub async fn get_statistics(
    State(state): State<AppState>,
    Query(params): Query<PeriodParams>,
) -> AppResult<impl IntoResponse> {
    let period = params.period()?;
    let stats = state.stats.compute_window(period).await?;

    Ok(Json(DataResponse { data: stats }))
}

/// GET /api/v1/statistics/hourly
///
/// Detection counts per local hour of day, keys `"00"` to `"23"`.
pub async fn get_hourly(
    State(state): State<AppState>,
    Query(params): Query<PeriodParams>,
) -> AppResult<impl IntoResponse> {
    let period = params.period()?;
    let hourly = state.stats.hourly_distribution(period).await?;

    Ok(Json(DataResponse { data: hourly }))
}

/// GET /api/v1/heatmap
pub async fn get_heatmap(
    State(state): State<AppState>,
    Query(params): Query<PeriodParams>,
) -> AppResult<impl IntoResponse> {
    let period = params.period()?;
    let points = state.stats.heatmap(period).await?;

    Ok(Json(DataResponse { data: points }))
}
