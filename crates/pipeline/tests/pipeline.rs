//! End-to-end tests: payload in, stored record and notification out.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::Utc;
use groundwatch_core::alert::AlertLevel;
use groundwatch_core::detection::DetectionPayload;
use groundwatch_core::error::CoreError;
use groundwatch_core::types::Timestamp;
use groundwatch_db::memory::MemoryStore;
use groundwatch_db::models::safe_zone::CreateSafeZone;
use groundwatch_db::DetectionStore;
use groundwatch_events::EventBus;
use groundwatch_pipeline::{IngestOutcome, Pipeline, PipelineConfig, PipelineError};

fn config() -> PipelineConfig {
    PipelineConfig::from_lookup(|_| None).unwrap()
}

fn payload(confidence: f64) -> DetectionPayload {
    serde_json::from_value(serde_json::json!({
        "pixel_x": 320.0,
        "pixel_y": 180.0,
        "confidence": confidence,
        "source_id": "ULTRON-01",
    }))
    .unwrap()
}

/// Arrival times are anchored at the real clock so the eviction sweep,
/// which runs against `Utc::now()`, does not treat them as stale.
fn at(base: Timestamp, secs: i64) -> Timestamp {
    base + chrono::Duration::seconds(secs)
}

#[tokio::test]
async fn persistent_sighting_is_stored_once_and_broadcast() {
    let base = Utc::now();
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(EventBus::default());
    let mut rx = bus.subscribe();
    let pipeline = Pipeline::start(config(), store.clone(), bus.clone())
        .await
        .unwrap();

    let mut confirmations = 0;
    for secs in 0..=8 {
        let outcome = pipeline
            .ingestor
            .ingest_at(payload(0.92), at(base, secs))
            .await
            .unwrap();
        if outcome.is_confirmed() {
            confirmations += 1;
        }
    }
    assert_eq!(confirmations, 1);

    let notification = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(notification.record.alert_level, AlertLevel::High);
    assert_eq!(notification.record.latitude, 28.613906);
    assert_eq!(notification.record.longitude, 77.209);
    assert_eq!(notification.record.source_id, "ULTRON-01");
    assert!(!notification.record.in_safe_zone);

    assert_eq!(store.detections().len(), 1);
    assert_eq!(store.tracking_rows().len(), 1);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn zone_created_at_startup_is_applied() {
    let base = Utc::now();
    let store = Arc::new(MemoryStore::new());
    store
        .create_safe_zone(&CreateSafeZone {
            name: "Camera post".into(),
            center_latitude: 28.6139,
            center_longitude: 77.2090,
            radius_meters: 5.0,
        })
        .await
        .unwrap();

    let bus = Arc::new(EventBus::default());
    let mut rx = bus.subscribe();
    let pipeline = Pipeline::start(config(), store.clone(), bus.clone())
        .await
        .unwrap();

    pipeline.ingestor.ingest_at(payload(0.5), at(base, 0)).await.unwrap();
    let outcome = pipeline.ingestor.ingest_at(payload(0.5), at(base, 5)).await.unwrap();
    assert!(outcome.is_confirmed());

    let notification = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(notification.record.in_safe_zone);
    assert_eq!(notification.record.alert_level, AlertLevel::Low);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn invalid_payload_never_reaches_tracker() {
    let base = Utc::now();
    let store = Arc::new(MemoryStore::new());
    let pipeline = Pipeline::start(config(), store, Arc::new(EventBus::default()))
        .await
        .unwrap();

    let mut bad = payload(0.9);
    bad.pixel_x = 10_000.0;
    let result = pipeline.ingestor.ingest_at(bad, at(base, 0)).await;
    assert_matches!(result, Err(PipelineError::Rejected(CoreError::Validation(_))));
    assert!(pipeline.tracker.snapshot().await.unwrap().is_empty());

    pipeline.shutdown().await;
}

#[tokio::test]
async fn long_gap_starts_a_new_lifecycle() {
    let base = Utc::now();
    let store = Arc::new(MemoryStore::new());
    let mut config = config();
    config.tracker.stale_threshold = chrono::Duration::seconds(30);
    let pipeline = Pipeline::start(config, store, Arc::new(EventBus::default()))
        .await
        .unwrap();

    pipeline.ingestor.ingest_at(payload(0.9), at(base, 0)).await.unwrap();
    let outcome = pipeline.ingestor.ingest_at(payload(0.9), at(base, 35)).await.unwrap();
    assert_matches!(outcome, IngestOutcome::Started { .. });

    let snapshot = pipeline.tracker.snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].first_seen, at(base, 35));

    pipeline.shutdown().await;
}

#[tokio::test]
async fn stored_record_is_stamped_with_capture_time() {
    let base = Utc::now();
    let captured = base - chrono::Duration::hours(2);
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(EventBus::default());
    let mut rx = bus.subscribe();
    let pipeline = Pipeline::start(config(), store.clone(), bus.clone())
        .await
        .unwrap();

    let delayed = || {
        let mut p = payload(0.9);
        p.captured_at = Some(captured);
        p.image_base64 = Some("/9j/4AAQSkZJRg==".into());
        p
    };
    pipeline.ingestor.ingest_at(delayed(), at(base, 0)).await.unwrap();
    let outcome = pipeline.ingestor.ingest_at(delayed(), at(base, 6)).await.unwrap();
    assert!(outcome.is_confirmed());

    let notification = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(notification.record.timestamp, captured);
    assert_eq!(
        notification.record.image_base64.as_deref(),
        Some("/9j/4AAQSkZJRg==")
    );
    assert_eq!(store.detections()[0].timestamp, captured);
    assert_eq!(store.tracking_rows()[0].last_seen, at(base, 6));

    pipeline.shutdown().await;
}
