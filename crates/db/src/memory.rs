//! In-process [`DetectionStore`] for tests.
//!
//! Behaves like [`PgStore`](crate::PgStore) for the operations the pipeline
//! uses, and lets a test inject write failures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{FixedOffset, Offset, Utc};
use groundwatch_core::statistics::{self, DetectionSample, HeatPoint, WindowAggregate};
use groundwatch_core::types::{DbId, Timestamp};

use crate::models::detection::{CreateDetection, Detection};
use crate::models::safe_zone::{CreateSafeZone, SafeZone};
use crate::models::tracking::{TrackingRow, UpsertTracking};
use crate::store::{DetectionStore, StoreError};

#[derive(Default)]
struct Tables {
    detections: Vec<Detection>,
    safe_zones: Vec<SafeZone>,
    tracking: HashMap<String, TrackingRow>,
    next_id: DbId,
}

impl Tables {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    failing_inserts: AtomicUsize,
    insert_attempts: AtomicUsize,
    row_reads: AtomicUsize,
    failing_purges: AtomicBool,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` calls to `insert_detection` fail.
    pub fn fail_next_inserts(&self, n: usize) {
        self.failing_inserts.store(n, Ordering::SeqCst);
    }

    /// Make every purge fail until reset.
    pub fn fail_purges(&self, failing: bool) {
        self.failing_purges.store(failing, Ordering::SeqCst);
    }

    /// Make the health check report the store as down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `insert_detection` calls so far, failed ones included.
    pub fn insert_attempts(&self) -> usize {
        self.insert_attempts.load(Ordering::SeqCst)
    }

    /// Number of calls that returned detection rows to the caller.
    pub fn row_reads(&self) -> usize {
        self.row_reads.load(Ordering::SeqCst)
    }

    pub fn detections(&self) -> Vec<Detection> {
        self.lock().detections.clone()
    }

    pub fn tracking_rows(&self) -> Vec<TrackingRow> {
        let mut rows: Vec<_> = self.lock().tracking.values().cloned().collect();
        rows.sort_by(|a, b| a.location_key.cmp(&b.location_key));
        rows
    }

    /// Insert a record directly, bypassing failure injection.
    pub fn seed_detection(&self, input: CreateDetection) -> Detection {
        let mut tables = self.lock();
        let id = tables.next_id();
        let record = input.into_detection(id, Utc::now());
        tables.detections.push(record.clone());
        record
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Samples in the window, newest first.
    fn samples_since(&self, cutoff: Option<Timestamp>) -> Vec<DetectionSample> {
        let rows = newest_first(self.lock().detections.clone());
        let samples: Vec<_> = rows.iter().map(Detection::sample).collect();
        statistics::since(&samples, cutoff).cloned().collect()
    }

    fn take_failure(flag: &AtomicUsize) -> bool {
        flag.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn newest_first(mut rows: Vec<Detection>) -> Vec<Detection> {
    rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
    rows
}

#[async_trait]
impl DetectionStore for MemoryStore {
    async fn insert_detection(&self, input: &CreateDetection) -> Result<Detection, StoreError> {
        self.insert_attempts.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_inserts) {
            return Err(StoreError::Unavailable("injected insert failure".into()));
        }
        Ok(self.seed_detection(input.clone()))
    }

    async fn record_tracking(&self, input: &UpsertTracking) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let id = match tables.tracking.get(&input.location_key) {
            Some(existing) => existing.id,
            None => tables.next_id(),
        };
        tables.tracking.insert(
            input.location_key.clone(),
            TrackingRow {
                id,
                location_key: input.location_key.clone(),
                first_seen: input.first_seen,
                last_seen: input.last_seen,
                update_count: input.update_count,
                latitude: input.latitude,
                longitude: input.longitude,
            },
        );
        Ok(())
    }

    async fn purge_tracking_older_than(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        if self.failing_purges.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected purge failure".into()));
        }
        let mut tables = self.lock();
        let before = tables.tracking.len();
        tables.tracking.retain(|_, row| row.last_seen >= cutoff);
        Ok((before - tables.tracking.len()) as u64)
    }

    async fn detections_since(
        &self,
        cutoff: Option<Timestamp>,
    ) -> Result<Vec<Detection>, StoreError> {
        self.row_reads.fetch_add(1, Ordering::SeqCst);
        let rows = self
            .lock()
            .detections
            .iter()
            .filter(|d| cutoff.map_or(true, |c| d.timestamp >= c))
            .cloned()
            .collect();
        Ok(newest_first(rows))
    }

    async fn window_aggregate(
        &self,
        cutoff: Option<Timestamp>,
        utc_offset_secs: i32,
    ) -> Result<WindowAggregate, StoreError> {
        let tz = FixedOffset::east_opt(utc_offset_secs).unwrap_or_else(|| Utc.fix());
        Ok(WindowAggregate::fold(&self.samples_since(cutoff), &tz))
    }

    async fn heatmap_cells(&self, cutoff: Option<Timestamp>) -> Result<Vec<HeatPoint>, StoreError> {
        Ok(statistics::heat_cells(&self.samples_since(cutoff)))
    }

    async fn list_detections(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Detection>, StoreError> {
        self.row_reads.fetch_add(1, Ordering::SeqCst);
        let rows = newest_first(self.lock().detections.clone());
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn create_safe_zone(&self, input: &CreateSafeZone) -> Result<SafeZone, StoreError> {
        let mut tables = self.lock();
        let zone = SafeZone {
            id: tables.next_id(),
            name: input.name.clone(),
            center_latitude: input.center_latitude,
            center_longitude: input.center_longitude,
            radius_meters: input.radius_meters,
            created_at: Utc::now(),
        };
        tables.safe_zones.push(zone.clone());
        Ok(zone)
    }

    async fn list_safe_zones(&self) -> Result<Vec<SafeZone>, StoreError> {
        Ok(self.lock().safe_zones.clone())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store marked unavailable".into()));
        }
        Ok(())
    }
}
