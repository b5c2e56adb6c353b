//! Safe zone entity and DTOs.

use groundwatch_core::alert::Geofence;
use groundwatch_core::geo::GeoPosition;
use groundwatch_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A row from the `safe_zones` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct SafeZone {
    pub id: DbId,
    pub name: String,
    pub center_latitude: f64,
    pub center_longitude: f64,
    pub radius_meters: f64,
    pub created_at: Timestamp,
}

impl SafeZone {
    pub fn geofence(&self) -> Geofence {
        Geofence {
            name: self.name.clone(),
            center: GeoPosition::new(self.center_latitude, self.center_longitude),
            radius_meters: self.radius_meters,
        }
    }
}

/// Request body for creating a safe zone.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSafeZone {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub center_latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub center_longitude: f64,
    #[validate(range(exclusive_min = 0.0, max = 100_000.0))]
    pub radius_meters: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(radius: f64) -> CreateSafeZone {
        CreateSafeZone {
            name: "Main gate".into(),
            center_latitude: 28.6139,
            center_longitude: 77.2090,
            radius_meters: radius,
        }
    }

    #[test]
    fn accepts_reasonable_zone() {
        assert!(input(50.0).validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_radius() {
        assert!(input(0.0).validate().is_err());
        assert!(input(-1.0).validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_center() {
        let mut zone = input(50.0);
        zone.center_latitude = 91.0;
        assert!(zone.validate().is_err());
    }
}
