/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Wall-clock format used for detection timestamps on the wire.
pub const WALL_CLOCK_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Round `value` to `decimals` decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Clamp a user-provided page size into `1..=max`.
pub fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, max)
}

/// Clamp a user-provided offset to non-negative.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

/// Serde adapter rendering a UTC [`Timestamp`] as local `YYYY-MM-DD HH:MM:SS`.
///
/// Use with `#[serde(serialize_with = "wall_clock::serialize")]`.
pub mod wall_clock {
    use chrono::Local;
    use serde::Serializer;

    use super::{Timestamp, WALL_CLOCK_FORMAT};

    pub fn serialize<S: Serializer>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
        let rendered = ts.with_timezone(&Local).format(WALL_CLOCK_FORMAT).to_string();
        serializer.serialize_str(&rendered)
    }
}
