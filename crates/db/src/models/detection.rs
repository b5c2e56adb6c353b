//! Confirmed detection records (`detections` table).

use groundwatch_core::alert::AlertLevel;
use groundwatch_core::statistics::DetectionSample;
use groundwatch_core::types::{wall_clock, DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `detections` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Detection {
    pub id: DbId,
    #[serde(serialize_with = "wall_clock::serialize")]
    pub timestamp: Timestamp,
    pub latitude: f64,
    pub longitude: f64,
    pub confidence: f64,
    pub message: String,
    pub source_id: String,
    #[sqlx(try_from = "String")]
    pub alert_level: AlertLevel,
    pub duration_seconds: f64,
    pub in_safe_zone: bool,
    pub image_base64: Option<String>,
    pub created_at: Timestamp,
}

impl Detection {
    /// Project the fields the statistics reductions read.
    pub fn sample(&self) -> DetectionSample {
        DetectionSample {
            timestamp: self.timestamp,
            latitude: self.latitude,
            longitude: self.longitude,
            confidence: self.confidence,
            alert_level: self.alert_level,
        }
    }
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Insert payload built by the tracker when a sighting is confirmed.
///
/// Values are already rounded for storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateDetection {
    pub timestamp: Timestamp,
    pub latitude: f64,
    pub longitude: f64,
    pub confidence: f64,
    pub message: String,
    pub source_id: String,
    pub alert_level: AlertLevel,
    pub duration_seconds: f64,
    pub in_safe_zone: bool,
    pub image_base64: Option<String>,
}

impl CreateDetection {
    /// Materialize the row a store would return for this insert.
    pub fn into_detection(self, id: DbId, created_at: Timestamp) -> Detection {
        Detection {
            id,
            timestamp: self.timestamp,
            latitude: self.latitude,
            longitude: self.longitude,
            confidence: self.confidence,
            message: self.message,
            source_id: self.source_id,
            alert_level: self.alert_level,
            duration_seconds: self.duration_seconds,
            in_safe_zone: self.in_safe_zone,
            image_base64: self.image_base64,
            created_at,
        }
    }
}
