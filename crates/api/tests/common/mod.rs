#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderValue, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use groundwatch_api::config::ServerConfig;
use groundwatch_api::router::build_app_router;
use groundwatch_api::state::AppState;
use groundwatch_api::ws::WsManager;
use groundwatch_db::memory::MemoryStore;
use groundwatch_events::EventBus;
use groundwatch_pipeline::{Pipeline, PipelineConfig};

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        bind_addr: ([127, 0, 0, 1], 0).into(),
        cors_origins: vec![HeaderValue::from_static("http://localhost:5173")],
        request_timeout: Duration::from_secs(30),
    }
}

/// Pipeline settings for tests: reference camera, immediate confirmation on
/// the second sighting, no feed file.
pub fn test_pipeline_config() -> PipelineConfig {
    PipelineConfig::from_lookup(|name| match name {
        "PERSISTENCE_THRESHOLD_SECS" => Some("0".to_string()),
        "STALE_THRESHOLD_SECS" => Some("60".to_string()),
        _ => None,
    })
    .expect("test pipeline config is valid")
}

/// A running application backed by an in-memory store.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub event_bus: Arc<EventBus>,
    pub ws_manager: Arc<WsManager>,
    pub pipeline: Pipeline,
}

impl TestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// Poll the store until `count` detections are present.
    pub async fn wait_for_detections(&self, count: usize) {
        for _ in 0..100 {
            if self.store.detections().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {count} detections, found {}",
            self.store.detections().len()
        );
    }
}

/// Build the full application router on top of `store`.
///
/// Uses [`build_app_router`] so integration tests exercise the same
/// middleware stack (CORS, request ID, timeout, tracing, panic recovery)
/// that production uses.
pub async fn build_test_app_with(store: Arc<MemoryStore>) -> TestApp {
    let config = test_config();
    let ws_manager = Arc::new(WsManager::new());
    let event_bus = Arc::new(EventBus::default());

    let pipeline = Pipeline::start(test_pipeline_config(), store.clone(), Arc::clone(&event_bus))
        .await
        .expect("pipeline starts against the memory store");

    let state = AppState {
        store: store.clone(),
        ws_manager: Arc::clone(&ws_manager),
        ingestor: pipeline.ingestor.clone(),
        tracker: pipeline.tracker.clone(),
        zones: Arc::clone(&pipeline.zones),
        stats: pipeline.stats.clone(),
    };

    TestApp {
        router: build_app_router(state, &config),
        store,
        event_bus,
        ws_manager,
        pipeline,
    }
}

pub async fn build_test_app() -> TestApp {
    build_test_app_with(Arc::new(MemoryStore::new())).await
}

/// Send a GET request.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Send a POST request with a JSON body.
pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
