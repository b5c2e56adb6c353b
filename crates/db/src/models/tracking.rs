//! Durable mirror of live sightings (`tracking` table).

use groundwatch_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `tracking` table, keyed by location key.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct TrackingRow {
    pub id: DbId,
    pub location_key: String,
    pub first_seen: Timestamp,
    pub last_seen: Timestamp,
    pub update_count: i32,
    pub latitude: f64,
    pub longitude: f64,
}

/// Insert-or-update payload for a tracking row.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertTracking {
    pub location_key: String,
    pub first_seen: Timestamp,
    pub last_seen: Timestamp,
    pub update_count: i32,
    pub latitude: f64,
    pub longitude: f64,
}
