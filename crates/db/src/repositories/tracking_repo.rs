//! Repository for the `tracking` table.

use groundwatch_core::types::Timestamp;
use sqlx::PgPool;

use crate::models::tracking::{TrackingRow, UpsertTracking};

const COLUMNS: &str = "id, location_key, first_seen, last_seen, update_count, latitude, longitude";

pub struct TrackingRepo;

impl TrackingRepo {
    /// Insert a row for the location key, or refresh the existing one.
    pub async fn upsert(pool: &PgPool, input: &UpsertTracking) -> Result<TrackingRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO tracking \
                (location_key, first_seen, last_seen, update_count, latitude, longitude) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (location_key) DO UPDATE SET \
                first_seen = EXCLUDED.first_seen, \
                last_seen = EXCLUDED.last_seen, \
                update_count = EXCLUDED.update_count, \
                latitude = EXCLUDED.latitude, \
                longitude = EXCLUDED.longitude, \
                updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TrackingRow>(&query)
            .bind(&input.location_key)
            .bind(input.first_seen)
            .bind(input.last_seen)
            .bind(input.update_count)
            .bind(input.latitude)
            .bind(input.longitude)
            .fetch_one(pool)
            .await
    }

    /// Delete rows last seen before `cutoff`. Returns the number removed.
    pub async fn delete_older_than(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tracking WHERE last_seen < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
