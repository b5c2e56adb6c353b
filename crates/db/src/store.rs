//! Storage contract used by the pipeline and the HTTP layer.
//!
//! [`DetectionStore`] abstracts the durable store so the tracker, writer and
//! handlers can run against PostgreSQL ([`PgStore`]) in production and an
//! in-process store in tests.

use async_trait::async_trait;
use groundwatch_core::statistics::{HeatPoint, WindowAggregate};
use groundwatch_core::types::Timestamp;

use crate::models::detection::{CreateDetection, Detection};
use crate::models::safe_zone::{CreateSafeZone, SafeZone};
use crate::models::tracking::UpsertTracking;
use crate::repositories::{DetectionRepo, SafeZoneRepo, TrackingRepo};
use crate::DbPool;

/// Errors surfaced by a [`DetectionStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait DetectionStore: Send + Sync + 'static {
    /// Persist a confirmed detection and return the stored record.
    async fn insert_detection(&self, input: &CreateDetection) -> Result<Detection, StoreError>;

    /// Upsert the tracking row for a sighting.
    async fn record_tracking(&self, input: &UpsertTracking) -> Result<(), StoreError>;

    /// Delete tracking rows last seen before `cutoff`.
    async fn purge_tracking_older_than(&self, cutoff: Timestamp) -> Result<u64, StoreError>;

    /// Detections at or after `cutoff` (all when `None`), newest first.
    async fn detections_since(
        &self,
        cutoff: Option<Timestamp>,
    ) -> Result<Vec<Detection>, StoreError>;

    /// Totals for detections at or after `cutoff`, with hours of the day
    /// taken at `utc_offset_secs` east of UTC.
    async fn window_aggregate(
        &self,
        cutoff: Option<Timestamp>,
        utc_offset_secs: i32,
    ) -> Result<WindowAggregate, StoreError>;

    /// Heatmap cells for detections at or after `cutoff`, each at the
    /// position of its most recent detection.
    async fn heatmap_cells(&self, cutoff: Option<Timestamp>) -> Result<Vec<HeatPoint>, StoreError>;

    /// One page of detections, newest first.
    async fn list_detections(&self, limit: i64, offset: i64)
        -> Result<Vec<Detection>, StoreError>;

    async fn create_safe_zone(&self, input: &CreateSafeZone) -> Result<SafeZone, StoreError>;

    async fn list_safe_zones(&self) -> Result<Vec<SafeZone>, StoreError>;

    /// Whether the backing store is reachable.
    async fn health_check(&self) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// PgStore
// ---------------------------------------------------------------------------

/// PostgreSQL-backed store delegating to the repositories.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl DetectionStore for PgStore {
    async fn insert_detection(&self, input: &CreateDetection) -> Result<Detection, StoreError> {
        Ok(DetectionRepo::create(&self.pool, input).await?)
    }

    async fn record_tracking(&self, input: &UpsertTracking) -> Result<(), StoreError> {
        TrackingRepo::upsert(&self.pool, input).await?;
        Ok(())
    }

    async fn purge_tracking_older_than(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        Ok(TrackingRepo::delete_older_than(&self.pool, cutoff).await?)
    }

    async fn detections_since(
        &self,
        cutoff: Option<Timestamp>,
    ) -> Result<Vec<Detection>, StoreError> {
        Ok(DetectionRepo::list_since(&self.pool, cutoff).await?)
    }

    async fn window_aggregate(
        &self,
        cutoff: Option<Timestamp>,
        utc_offset_secs: i32,
    ) -> Result<WindowAggregate, StoreError> {
        Ok(DetectionRepo::aggregate(&self.pool, cutoff, utc_offset_secs).await?)
    }

    async fn heatmap_cells(&self, cutoff: Option<Timestamp>) -> Result<Vec<HeatPoint>, StoreError> {
        Ok(DetectionRepo::heat_cells(&self.pool, cutoff).await?)
    }

    async fn list_detections(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Detection>, StoreError> {
        Ok(DetectionRepo::list(&self.pool, limit, offset).await?)
    }

    async fn create_safe_zone(&self, input: &CreateSafeZone) -> Result<SafeZone, StoreError> {
        Ok(SafeZoneRepo::create(&self.pool, input).await?)
    }

    async fn list_safe_zones(&self) -> Result<Vec<SafeZone>, StoreError> {
        Ok(SafeZoneRepo::list(&self.pool).await?)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(crate::health_check(&self.pool).await?)
    }
}
