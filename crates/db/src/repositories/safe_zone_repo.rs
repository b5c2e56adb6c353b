//! Repository for the `safe_zones` table.

use sqlx::PgPool;

use crate::models::safe_zone::{CreateSafeZone, SafeZone};

const COLUMNS: &str = "id, name, center_latitude, center_longitude, radius_meters, created_at";

pub struct SafeZoneRepo;

impl SafeZoneRepo {
    pub async fn create(pool: &PgPool, input: &CreateSafeZone) -> Result<SafeZone, sqlx::Error> {
        let query = format!(
            "INSERT INTO safe_zones (name, center_latitude, center_longitude, radius_meters) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SafeZone>(&query)
            .bind(&input.name)
            .bind(input.center_latitude)
            .bind(input.center_longitude)
            .bind(input.radius_meters)
            .fetch_one(pool)
            .await
    }

    /// All safe zones in creation order.
    pub async fn list(pool: &PgPool) -> Result<Vec<SafeZone>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM safe_zones ORDER BY id");
        sqlx::query_as::<_, SafeZone>(&query).fetch_all(pool).await
    }
}
