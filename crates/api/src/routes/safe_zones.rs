use axum::routing::get;
use axum::Router;

use crate::handlers::safe_zones;
use crate::state::AppState;

/// Routes mounted at `/safe-zones`.
///
/// ```text
/// GET    /          -> list_safe_zones
/// POST   /          -> create_safe_zone
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/",
        get(safe_zones::list_safe_zones).post(safe_zones::create_safe_zone),
    )
}
