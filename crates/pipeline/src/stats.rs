//! Store-backed statistics queries.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Local, Offset, TimeZone};
use groundwatch_core::statistics::{HeatPoint, Period, Statistics, WindowAggregate};
use groundwatch_db::models::detection::Detection;
use groundwatch_db::{DetectionStore, StoreError};

/// Window served by the live feed.
pub const LIVE_WINDOW_MINUTES: i64 = 60;

/// Read-only aggregations over confirmed detections. The store does the
/// reduction; hours of the day are bucketed at the server's current UTC
/// offset.
#[derive(Clone)]
pub struct StatisticsAggregator {
    store: Arc<dyn DetectionStore>,
}

impl StatisticsAggregator {
    pub fn new(store: Arc<dyn DetectionStore>) -> Self {
        Self { store }
    }

    pub async fn compute_window(&self, period: Period) -> Result<Statistics, StoreError> {
        self.compute_window_at(period, &Local::now()).await
    }

    pub async fn compute_window_at<Tz: TimeZone>(
        &self,
        period: Period,
        now: &DateTime<Tz>,
    ) -> Result<Statistics, StoreError> {
        Ok(self.aggregate(period, now).await?.summarize(period))
    }

    pub async fn hourly_distribution(
        &self,
        period: Period,
    ) -> Result<BTreeMap<String, i64>, StoreError> {
        Ok(self.aggregate(period, &Local::now()).await?.hourly())
    }

    pub async fn heatmap(&self, period: Period) -> Result<Vec<HeatPoint>, StoreError> {
        self.store.heatmap_cells(period.cutoff(&Local::now())).await
    }

    /// Detections from the last hour, newest first.
    pub async fn live(&self) -> Result<Vec<Detection>, StoreError> {
        let cutoff = chrono::Utc::now() - Duration::minutes(LIVE_WINDOW_MINUTES);
        self.store.detections_since(Some(cutoff)).await
    }

    async fn aggregate<Tz: TimeZone>(
        &self,
        period: Period,
        now: &DateTime<Tz>,
    ) -> Result<WindowAggregate, StoreError> {
        let offset = now.offset().fix().local_minus_utc();
        self.store.window_aggregate(period.cutoff(now), offset).await
    }
}
