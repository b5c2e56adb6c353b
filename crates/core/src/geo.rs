//! Pixel-to-GPS projection for a fixed, calibrated camera.
//!
//! The projector intersects the ray through a pixel with a flat ground plane
//! and converts the resulting distance/bearing into a GPS offset using an
//! equirectangular approximation. Accuracy is only meaningful within a few
//! hundred meters of the camera and away from the poles.

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Ground distance multiplier used when the pixel ray never meets the ground.
pub const FALLBACK_DISTANCE_FACTOR: f64 = 10.0;

/// Decimal places used to quantize positions into a [`LocationKey`].
pub const LOCATION_KEY_DECIMALS: i32 = 5;

// ---------------------------------------------------------------------------
// CameraCalibration
// ---------------------------------------------------------------------------

/// Physical placement and optics of the camera. Immutable after startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CameraCalibration {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    /// Height of the lens above the ground plane.
    #[validate(range(exclusive_min = 0.0))]
    pub height_meters: f64,
    /// Downward tilt; 0 is horizontal, 90 is straight down.
    #[validate(range(min = -90.0, max = 90.0))]
    pub tilt_degrees: f64,
    /// Compass direction of the optical axis; 0 is north, 90 is east.
    pub bearing_degrees: f64,
    #[validate(range(exclusive_min = 0.0, exclusive_max = 180.0))]
    pub horizontal_fov_degrees: f64,
    #[validate(range(exclusive_min = 0.0, exclusive_max = 180.0))]
    pub vertical_fov_degrees: f64,
    #[validate(range(min = 1))]
    pub frame_width: u32,
    #[validate(range(min = 1))]
    pub frame_height: u32,
}

impl CameraCalibration {
    /// Check ranges and reject non-finite values.
    pub fn ensure_valid(&self) -> Result<(), CoreError> {
        let fields = [
            ("latitude", self.latitude),
            ("longitude", self.longitude),
            ("height_meters", self.height_meters),
            ("tilt_degrees", self.tilt_degrees),
            ("bearing_degrees", self.bearing_degrees),
            ("horizontal_fov_degrees", self.horizontal_fov_degrees),
            ("vertical_fov_degrees", self.vertical_fov_degrees),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(CoreError::Validation(format!(
                "Camera calibration field '{name}' must be a finite number"
            )));
        }
        self.validate()?;
        Ok(())
    }

    /// Whether `(x, y)` lies inside the frame, edges included.
    pub fn contains_pixel(&self, x: f64, y: f64) -> bool {
        (0.0..=f64::from(self.frame_width)).contains(&x)
            && (0.0..=f64::from(self.frame_height)).contains(&y)
    }
}

// ---------------------------------------------------------------------------
// GeoPosition / LocationKey
// ---------------------------------------------------------------------------

/// A WGS84 latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPosition {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Quantized identity used to merge repeated sightings of one spot.
    pub fn location_key(&self) -> LocationKey {
        let scale = 10f64.powi(LOCATION_KEY_DECIMALS);
        LocationKey {
            lat_units: (self.latitude * scale).round() as i64,
            lon_units: (self.longitude * scale).round() as i64,
        }
    }
}

/// A position rounded to [`LOCATION_KEY_DECIMALS`] (about 1.1 m).
///
/// Two detections belong to the same sighting iff their keys are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationKey {
    lat_units: i64,
    lon_units: i64,
}

impl LocationKey {
    pub fn latitude(&self) -> f64 {
        self.lat_units as f64 / 10f64.powi(LOCATION_KEY_DECIMALS)
    }

    pub fn longitude(&self) -> f64 {
        self.lon_units as f64 / 10f64.powi(LOCATION_KEY_DECIMALS)
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}_{:.5}", self.latitude(), self.longitude())
    }
}

impl Serialize for LocationKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Project a pixel onto the ground plane and return its GPS position.
///
/// Pixels whose ray points at or above the horizon (or straight down) use a
/// fixed ground distance of `height * FALLBACK_DISTANCE_FACTOR` instead of
/// failing.
pub fn project(pixel_x: f64, pixel_y: f64, calib: &CameraCalibration) -> GeoPosition {
    let half_w = f64::from(calib.frame_width) / 2.0;
    let half_h = f64::from(calib.frame_height) / 2.0;
    let norm_x = (pixel_x - half_w) / half_w;
    let norm_y = (pixel_y - half_h) / half_h;

    let horizontal_angle = norm_x * (calib.horizontal_fov_degrees / 2.0);
    let vertical_angle = calib.tilt_degrees + norm_y * (calib.vertical_fov_degrees / 2.0);
    let angle_from_horizontal = 90.0 - vertical_angle;

    let ground_distance = if angle_from_horizontal <= 0.0 || angle_from_horizontal >= 90.0 {
        calib.height_meters * FALLBACK_DISTANCE_FACTOR
    } else {
        calib.height_meters / angle_from_horizontal.to_radians().tan()
    };

    // Off-axis pixels sit further away along their own bearing.
    let distance = ground_distance / horizontal_angle.to_radians().cos();
    let bearing = (calib.bearing_degrees + horizontal_angle).rem_euclid(360.0);

    offset_position(calib.latitude, calib.longitude, distance, bearing)
}

/// Move `distance` meters from an origin along `bearing_degrees`.
fn offset_position(
    origin_lat: f64,
    origin_lon: f64,
    distance: f64,
    bearing_degrees: f64,
) -> GeoPosition {
    let bearing = bearing_degrees.to_radians();
    let lat_offset = (distance * bearing.cos() / EARTH_RADIUS_M).to_degrees();
    let lon_offset = (distance * bearing.sin()
        / (EARTH_RADIUS_M * origin_lat.to_radians().cos()))
    .to_degrees();

    GeoPosition::new(
        (origin_lat + lat_offset).clamp(-90.0, 90.0),
        wrap_longitude(origin_lon + lon_offset),
    )
}

fn wrap_longitude(lon: f64) -> f64 {
    if (-180.0..=180.0).contains(&lon) {
        lon
    } else if lon.is_finite() {
        (lon + 180.0).rem_euclid(360.0) - 180.0
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
