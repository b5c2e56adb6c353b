use std::sync::Arc;

use groundwatch_db::DetectionStore;
use groundwatch_pipeline::{Ingestor, StatisticsAggregator, TrackerHandle, ZoneRegistry};

use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Durable store for detections and safe zones.
    pub store: Arc<dyn DetectionStore>,
    /// WebSocket connection manager (browser clients).
    pub ws_manager: Arc<WsManager>,
    /// Validates and forwards detection payloads to the tracker.
    pub ingestor: Ingestor,
    /// Read access to live tracker state.
    pub tracker: TrackerHandle,
    /// Safe zones used by the classifier.
    pub zones: Arc<ZoneRegistry>,
    pub stats: StatisticsAggregator,
}
