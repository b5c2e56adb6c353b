use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use groundwatch_core::error::CoreError;
use groundwatch_core::geo::CameraCalibration;

use crate::tracker::{
    duration_from_secs, TrackerConfig, DEFAULT_PERSISTENCE_THRESHOLD_SECS,
    DEFAULT_STALE_THRESHOLD_SECS,
};

/// Longest tracking retention accepted (one year).
pub const MAX_TRACKING_RETENTION_SECS: i64 = 365 * 24 * 3600;

/// Longest persistence or stale threshold accepted (one day).
pub const MAX_THRESHOLD_SECS: f64 = 86_400.0;

/// Pipeline configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub calibration: CameraCalibration,
    pub tracker: TrackerConfig,
    /// Tracking rows last seen longer ago than this are purged.
    pub tracking_retention: chrono::Duration,
    pub eviction_interval: Duration,
    pub writer_queue_capacity: usize,
    /// When set, detections are also read from this file.
    pub feed_file_path: Option<PathBuf>,
    pub feed_poll_interval: Duration,
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default   |
    /// |------------------------------|-----------|
    /// | `CAMERA_LAT`                 | `28.6139` |
    /// | `CAMERA_LON`                 | `77.2090` |
    /// | `CAMERA_HEIGHT_M`            | `2.5`     |
    /// | `CAMERA_TILT_DEG`            | `15`      |
    /// | `CAMERA_BEARING_DEG`         | `0`       |
    /// | `CAMERA_HFOV_DEG`            | `60`      |
    /// | `CAMERA_VFOV_DEG`            | `45`      |
    /// | `FRAME_WIDTH`                | `640`     |
    /// | `FRAME_HEIGHT`               | `360`     |
    /// | `PERSISTENCE_THRESHOLD_SECS` | `5.0`     |
    /// | `STALE_THRESHOLD_SECS`       | `10.0`    |
    /// | `TRACKING_RETENTION_SECS`    | `30`      |
    /// | `EVICTION_INTERVAL_MS`       | `500`     |
    /// | `WRITER_QUEUE_CAPACITY`      | `256`     |
    /// | `FEED_FILE_PATH`             | unset     |
    /// | `FEED_POLL_INTERVAL_MS`      | `500`     |
    ///
    /// `lookup` returns the raw value of a variable, normally
    /// `std::env::var`. Fails on unparsable or out-of-range values and on an
    /// invalid calibration.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let env = Env(lookup);

        let calibration = CameraCalibration {
            latitude: env.parse("CAMERA_LAT", 28.6139)?,
            longitude: env.parse("CAMERA_LON", 77.2090)?,
            height_meters: env.parse("CAMERA_HEIGHT_M", 2.5)?,
            tilt_degrees: env.parse("CAMERA_TILT_DEG", 15.0)?,
            bearing_degrees: env.parse("CAMERA_BEARING_DEG", 0.0)?,
            horizontal_fov_degrees: env.parse("CAMERA_HFOV_DEG", 60.0)?,
            vertical_fov_degrees: env.parse("CAMERA_VFOV_DEG", 45.0)?,
            frame_width: env.parse("FRAME_WIDTH", 640)?,
            frame_height: env.parse("FRAME_HEIGHT", 360)?,
        };
        calibration.ensure_valid()?;

        let persistence_secs: f64 =
            env.parse("PERSISTENCE_THRESHOLD_SECS", DEFAULT_PERSISTENCE_THRESHOLD_SECS)?;
        let stale_secs: f64 = env.parse("STALE_THRESHOLD_SECS", DEFAULT_STALE_THRESHOLD_SECS)?;
        if !(0.0..=MAX_THRESHOLD_SECS).contains(&persistence_secs)
            || !(stale_secs > 0.0 && stale_secs <= MAX_THRESHOLD_SECS)
        {
            return Err(CoreError::Validation(format!(
                "PERSISTENCE_THRESHOLD_SECS must be in [0, {MAX_THRESHOLD_SECS}] \
                 and STALE_THRESHOLD_SECS in (0, {MAX_THRESHOLD_SECS}]"
            )));
        }

        let retention_secs: i64 = env.parse("TRACKING_RETENTION_SECS", 30)?;
        if !(1..=MAX_TRACKING_RETENTION_SECS).contains(&retention_secs) {
            return Err(CoreError::Validation(format!(
                "TRACKING_RETENTION_SECS must be between 1 and {MAX_TRACKING_RETENTION_SECS}"
            )));
        }

        let writer_queue_capacity: usize = env.parse("WRITER_QUEUE_CAPACITY", 256)?;
        if writer_queue_capacity == 0 {
            return Err(CoreError::Validation(
                "WRITER_QUEUE_CAPACITY must be at least 1".into(),
            ));
        }

        let eviction_interval_ms: u64 = env.parse("EVICTION_INTERVAL_MS", 500)?;
        let feed_poll_interval_ms: u64 = env.parse("FEED_POLL_INTERVAL_MS", 500)?;

        Ok(Self {
            calibration,
            tracker: TrackerConfig {
                persistence_threshold: duration_from_secs(persistence_secs),
                stale_threshold: duration_from_secs(stale_secs),
            },
            tracking_retention: chrono::Duration::seconds(retention_secs),
            eviction_interval: Duration::from_millis(eviction_interval_ms.max(1)),
            writer_queue_capacity,
            feed_file_path: env
                .get("FEED_FILE_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            feed_poll_interval: Duration::from_millis(feed_poll_interval_ms.max(1)),
        })
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name)
    }

    fn parse<T: FromStr>(&self, name: &str, default: T) -> Result<T, CoreError> {
        match self.get(name) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| {
                CoreError::Validation(format!("{name} has an invalid value: '{raw}'"))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<PipelineConfig, CoreError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PipelineConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_match_reference_camera() {
        let config = load(&[]).unwrap();
        assert_eq!(config.calibration.latitude, 28.6139);
        assert_eq!(config.calibration.frame_width, 640);
        assert_eq!(config.tracker, TrackerConfig::default());
        assert_eq!(config.tracking_retention, chrono::Duration::seconds(30));
        assert_eq!(config.eviction_interval, Duration::from_millis(500));
        assert!(config.feed_file_path.is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("PERSISTENCE_THRESHOLD_SECS", "2.5"),
            ("FEED_FILE_PATH", "/tmp/detection.json"),
            ("CAMERA_BEARING_DEG", "270"),
        ])
        .unwrap();
        assert_eq!(
            config.tracker.persistence_threshold,
            chrono::Duration::milliseconds(2500)
        );
        assert_eq!(config.calibration.bearing_degrees, 270.0);
        assert_eq!(
            config.feed_file_path,
            Some(PathBuf::from("/tmp/detection.json"))
        );
    }

    #[test]
    fn unparsable_value_is_rejected() {
        let err = load(&[("FRAME_WIDTH", "wide")]).unwrap_err();
        assert!(err.to_string().contains("FRAME_WIDTH"));
    }

    #[test]
    fn invalid_calibration_fails_fast() {
        assert!(load(&[("CAMERA_HEIGHT_M", "0")]).is_err());
        assert!(load(&[("CAMERA_LAT", "NaN")]).is_err());
        assert!(load(&[("CAMERA_HFOV_DEG", "180")]).is_err());
    }

    #[test]
    fn retention_outside_bounds_is_rejected() {
        for value in ["-5", "0", "9223372036854775807"] {
            let err = load(&[("TRACKING_RETENTION_SECS", value)]).unwrap_err();
            assert!(err.to_string().contains("TRACKING_RETENTION_SECS"), "{value}");
        }
        let config = load(&[("TRACKING_RETENTION_SECS", "3600")]).unwrap();
        assert_eq!(config.tracking_retention, chrono::Duration::hours(1));
    }

    #[test]
    fn thresholds_outside_bounds_are_rejected() {
        assert!(load(&[("PERSISTENCE_THRESHOLD_SECS", "-1")]).is_err());
        assert!(load(&[("STALE_THRESHOLD_SECS", "0")]).is_err());
        assert!(load(&[("STALE_THRESHOLD_SECS", "1e300")]).is_err());
        assert!(load(&[("PERSISTENCE_THRESHOLD_SECS", "inf")]).is_err());
    }
}
