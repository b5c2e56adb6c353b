//! Repository for the `detections` table.

use groundwatch_core::alert::AlertLevel;
use groundwatch_core::statistics::{HeatPoint, WindowAggregate, HEATMAP_DECIMALS};
use groundwatch_core::types::Timestamp;
use sqlx::PgPool;

use crate::models::detection::{CreateDetection, Detection};

/// Column list for `detections` queries.
const COLUMNS: &str = "id, timestamp, latitude, longitude, confidence, message, source_id, \
     alert_level, duration_seconds, in_safe_zone, image_base64, created_at";

/// Window filter shared by the aggregate queries; `$1` is the cutoff.
const IN_WINDOW: &str = "($1::timestamptz IS NULL OR timestamp >= $1)";

/// Provides read/write operations for confirmed detections.
pub struct DetectionRepo;

impl DetectionRepo {
    /// Insert a confirmed detection, returning the stored row.
    pub async fn create(pool: &PgPool, input: &CreateDetection) -> Result<Detection, sqlx::Error> {
        let query = format!(
            "INSERT INTO detections \
                (timestamp, latitude, longitude, confidence, message, source_id, \
                 alert_level, duration_seconds, in_safe_zone, image_base64) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Detection>(&query)
            .bind(input.timestamp)
            .bind(input.latitude)
            .bind(input.longitude)
            .bind(input.confidence)
            .bind(&input.message)
            .bind(&input.source_id)
            .bind(input.alert_level.as_str())
            .bind(input.duration_seconds)
            .bind(input.in_safe_zone)
            .bind(&input.image_base64)
            .fetch_one(pool)
            .await
    }

    /// Detections at or after `cutoff` (all when `None`), newest first.
    pub async fn list_since(
        pool: &PgPool,
        cutoff: Option<Timestamp>,
    ) -> Result<Vec<Detection>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM detections \
             WHERE {IN_WINDOW} \
             ORDER BY timestamp DESC, id DESC"
        );
        sqlx::query_as::<_, Detection>(&query)
            .bind(cutoff)
            .fetch_all(pool)
            .await
    }

    /// Page through all detections, newest first.
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Detection>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM detections \
             ORDER BY timestamp DESC, id DESC LIMIT $1 OFFSET $2"
        );
        sqlx::query_as::<_, Detection>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Count, confidence sum, level breakdown and hour-of-day histogram for
    /// the window, computed in the database.
    pub async fn aggregate(
        pool: &PgPool,
        cutoff: Option<Timestamp>,
        utc_offset_secs: i32,
    ) -> Result<WindowAggregate, sqlx::Error> {
        let by_level = format!(
            "SELECT alert_level, COUNT(*), COALESCE(SUM(confidence), 0)::float8 \
             FROM detections WHERE {IN_WINDOW} \
             GROUP BY alert_level"
        );
        let levels = sqlx::query_as::<_, (String, i64, f64)>(&by_level)
            .bind(cutoff)
            .fetch_all(pool)
            .await?;

        let by_hour = format!(
            "SELECT EXTRACT(HOUR FROM (timestamp AT TIME ZONE 'UTC') \
                    + $2::int * INTERVAL '1 second')::int AS hour, \
                    COUNT(*) \
             FROM detections WHERE {IN_WINDOW} \
             GROUP BY 1"
        );
        let hours = sqlx::query_as::<_, (i32, i64)>(&by_hour)
            .bind(cutoff)
            .bind(utc_offset_secs)
            .fetch_all(pool)
            .await?;

        let mut agg = WindowAggregate::default();
        for (level, count, confidence_sum) in levels {
            let level: AlertLevel = level
                .parse()
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
            agg.total += count;
            agg.confidence_sum += confidence_sum;
            agg.breakdown.insert(level, count);
        }
        for (hour, count) in hours {
            if let Some(slot) = usize::try_from(hour).ok().and_then(|h| agg.per_hour.get_mut(h)) {
                *slot = count;
            }
        }
        Ok(agg)
    }

    /// Detections grouped into heatmap cells, ordered by cell.
    pub async fn heat_cells(
        pool: &PgPool,
        cutoff: Option<Timestamp>,
    ) -> Result<Vec<HeatPoint>, sqlx::Error> {
        let cell = format!(
            "ROUND(latitude::numeric, {HEATMAP_DECIMALS}), ROUND(longitude::numeric, {HEATMAP_DECIMALS})"
        );
        let query = format!(
            "SELECT (ARRAY_AGG(latitude ORDER BY timestamp DESC, id DESC))[1], \
                    (ARRAY_AGG(longitude ORDER BY timestamp DESC, id DESC))[1], \
                    COUNT(*) \
             FROM detections WHERE {IN_WINDOW} \
             GROUP BY {cell} \
             ORDER BY {cell}"
        );
        let rows = sqlx::query_as::<_, (f64, f64, i64)>(&query)
            .bind(cutoff)
            .fetch_all(pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(lat, lon, count)| HeatPoint(lat, lon, count))
            .collect())
    }
}
