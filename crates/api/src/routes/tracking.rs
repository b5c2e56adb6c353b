use axum::routing::get;
use axum::Router;

use crate::handlers::tracking;
use crate::state::AppState;

/// Routes mounted at `/tracking`.
///
/// ```text
/// GET    /active    -> active_sightings
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/active", get(tracking::active_sightings))
}
