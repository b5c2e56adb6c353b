pub mod detections;
pub mod health;
pub mod safe_zones;
pub mod statistics;
pub mod tracking;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                 WebSocket (new_detection alerts)
///
/// /detections                         list (paginated, newest first)
/// /detections/live                    last hour
/// /detections/ingest                  submit a raw detection (POST)
///
/// /statistics                         window statistics (?period=)
/// /statistics/hourly                  hour-of-day distribution (?period=)
/// /heatmap                            [lat, lon, count] cells (?period=)
///
/// /safe-zones                         list, create
///
/// /tracking/active                    in-memory sightings
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/detections", detections::router())
        .nest("/statistics", statistics::router())
        .route(
            "/heatmap",
            get(crate::handlers::statistics::get_heatmap),
        )
        .nest("/safe-zones", safe_zones::router())
        .nest("/tracking", tracking::router())
}
