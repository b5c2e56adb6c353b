//! Domain logic for the ground-surveillance detection pipeline.
//!
//! Pure functions and value types only: projection, sighting keys, alert
//! classification, geofencing and statistics. No I/O lives in this crate.

pub mod alert;
pub mod detection;
pub mod error;
pub mod geo;
pub mod statistics;
pub mod types;
