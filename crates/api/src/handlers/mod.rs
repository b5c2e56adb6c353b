pub mod detections;
pub mod safe_zones;
pub mod statistics;
pub mod tracking;
