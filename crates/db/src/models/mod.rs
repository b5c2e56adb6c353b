pub mod detection;
pub mod safe_zone;
pub mod tracking;
