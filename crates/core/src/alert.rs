//! Alert tiers and safe-zone membership for confirmed sightings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::geo::GeoPosition;

/// Minimum confidence (inclusive) for a [`AlertLevel::High`] alert.
pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.85;

/// Minimum confidence (inclusive) for a [`AlertLevel::Medium`] alert.
pub const MEDIUM_CONFIDENCE_THRESHOLD: f64 = 0.70;

/// Approximate meters per degree of latitude.
pub const METERS_PER_DEGREE: f64 = 111_000.0;

// ---------------------------------------------------------------------------
// AlertLevel
// ---------------------------------------------------------------------------

/// Confidence-derived severity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    High,
    Medium,
    Low,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::High => "HIGH",
            AlertLevel::Medium => "MEDIUM",
            AlertLevel::Low => "LOW",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HIGH" => Ok(AlertLevel::High),
            "MEDIUM" => Ok(AlertLevel::Medium),
            "LOW" => Ok(AlertLevel::Low),
            other => Err(CoreError::Validation(format!(
                "Invalid alert level '{other}'. Must be one of: HIGH, MEDIUM, LOW"
            ))),
        }
    }
}

impl TryFrom<String> for AlertLevel {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Map a detection confidence onto an alert tier.
pub fn classify(confidence: f64) -> AlertLevel {
    if confidence >= HIGH_CONFIDENCE_THRESHOLD {
        AlertLevel::High
    } else if confidence >= MEDIUM_CONFIDENCE_THRESHOLD {
        AlertLevel::Medium
    } else {
        AlertLevel::Low
    }
}

// ---------------------------------------------------------------------------
// Geofence
// ---------------------------------------------------------------------------

/// Circular area in which sightings are flagged as being inside a safe zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub name: String,
    pub center: GeoPosition,
    pub radius_meters: f64,
}

impl Geofence {
    /// Whether `position` lies within the fence. The boundary counts as inside.
    pub fn contains(&self, position: &GeoPosition) -> bool {
        approx_distance_meters(&self.center, position) <= self.radius_meters
    }
}

/// Planar distance between two nearby points.
///
/// Longitude degrees are scaled by the cosine of `reference`'s latitude.
pub fn approx_distance_meters(reference: &GeoPosition, other: &GeoPosition) -> f64 {
    let lat_m = (other.latitude - reference.latitude).abs() * METERS_PER_DEGREE;
    let lon_m = (other.longitude - reference.longitude).abs()
        * METERS_PER_DEGREE
        * reference.latitude.to_radians().cos();
    (lat_m * lat_m + lon_m * lon_m).sqrt()
}

/// True iff `position` is inside any of `zones`.
pub fn in_safe_zone(position: &GeoPosition, zones: &[Geofence]) -> bool {
    zones.iter().any(|zone| zone.contains(position))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
