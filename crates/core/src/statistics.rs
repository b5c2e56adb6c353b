//! Time-windowed aggregation over confirmed detections.
//!
//! A store reduces the records of a window into a [`WindowAggregate`]
//! (in SQL for Postgres, with [`WindowAggregate::fold`] in memory) and the
//! aggregate is turned into the API shapes here. Hour-of-day buckets use the
//! UTC offset of the caller's `now`, which is the server's local time in
//! production.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::AlertLevel;
use crate::error::CoreError;
use crate::types::{round_to, Timestamp};

/// Placeholder reported as the peak hour of an empty window.
pub const NO_PEAK_HOUR: &str = "N/A";

/// Decimal places used to bucket heatmap points (about 11 m).
pub const HEATMAP_DECIMALS: i32 = 4;

// ---------------------------------------------------------------------------
// Period
// ---------------------------------------------------------------------------

/// Reporting window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// Since local midnight.
    Today,
    /// The last 7 days.
    Week,
    /// The last 30 days.
    Month,
    /// No cutoff.
    #[default]
    All,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Today => "today",
            Period::Week => "week",
            Period::Month => "month",
            Period::All => "all",
        }
    }

    /// Earliest timestamp included in the window, or `None` for [`Period::All`].
    pub fn cutoff<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<Timestamp> {
        match self {
            Period::Today => Some(local_midnight(now)),
            Period::Week => Some(now.with_timezone(&Utc) - Duration::days(7)),
            Period::Month => Some(now.with_timezone(&Utc) - Duration::days(30)),
            Period::All => None,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "today" => Ok(Period::Today),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            "all" => Ok(Period::All),
            other => Err(CoreError::Validation(format!(
                "Invalid period '{other}'. Must be one of: today, week, month, all"
            ))),
        }
    }
}

fn local_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Timestamp {
    let midnight = now.date_naive().and_time(chrono::NaiveTime::MIN);
    match now.timezone().from_local_datetime(&midnight).earliest() {
        Some(local) => local.with_timezone(&Utc),
        // Midnight skipped by a DST transition.
        None => Utc.from_utc_datetime(&midnight),
    }
}

// ---------------------------------------------------------------------------
// Samples and results
// ---------------------------------------------------------------------------

/// The fields of a confirmed detection that the aggregations read.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSample {
    pub timestamp: Timestamp,
    pub latitude: f64,
    pub longitude: f64,
    pub confidence: f64,
    pub alert_level: AlertLevel,
}

/// Summary statistics for one [`Period`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub total_detections: i64,
    pub high_alerts: i64,
    /// Mean confidence rounded to 4 decimals; 0 for an empty window.
    pub average_confidence: f64,
    /// `"HH:00"` of the busiest hour, or [`NO_PEAK_HOUR`].
    pub peak_hour: String,
    pub peak_hour_count: i64,
    /// Count per alert level; levels with no detections are absent.
    pub alert_breakdown: BTreeMap<AlertLevel, i64>,
    pub period: Period,
}

/// A heatmap cell serialized as `[latitude, longitude, count]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatPoint(pub f64, pub f64, pub i64);

// ---------------------------------------------------------------------------
// Aggregations
// ---------------------------------------------------------------------------

/// Running totals for one reporting window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowAggregate {
    pub total: i64,
    pub confidence_sum: f64,
    /// Detections per local hour of day.
    pub per_hour: [i64; 24],
    pub breakdown: BTreeMap<AlertLevel, i64>,
}

impl WindowAggregate {
    /// Fold samples into totals, bucketing hours in `tz`.
    pub fn fold<'a, Tz: TimeZone>(
        samples: impl IntoIterator<Item = &'a DetectionSample>,
        tz: &Tz,
    ) -> Self {
        let mut agg = Self::default();
        for sample in samples {
            agg.total += 1;
            agg.confidence_sum += sample.confidence;
            agg.per_hour[sample.timestamp.with_timezone(tz).hour() as usize] += 1;
            *agg.breakdown.entry(sample.alert_level).or_insert(0) += 1;
        }
        agg
    }

    /// Statistics for `period`. Empty windows yield zeroed values.
    pub fn summarize(&self, period: Period) -> Statistics {
        let average_confidence = if self.total == 0 {
            0.0
        } else {
            round_to(self.confidence_sum / self.total as f64, 4)
        };

        let (peak_hour, peak_hour_count) = match busiest_hour(&self.per_hour) {
            Some((hour, count)) => (format!("{hour:02}:00"), count),
            None => (NO_PEAK_HOUR.to_string(), 0),
        };

        Statistics {
            total_detections: self.total,
            high_alerts: self.breakdown.get(&AlertLevel::High).copied().unwrap_or(0),
            average_confidence,
            peak_hour,
            peak_hour_count,
            alert_breakdown: self.breakdown.clone(),
            period,
        }
    }

    /// Detection count for every hour of the day, keyed `"00"`..`"23"`.
    pub fn hourly(&self) -> BTreeMap<String, i64> {
        self.per_hour
            .iter()
            .enumerate()
            .map(|(hour, &count)| (format!("{hour:02}"), count))
            .collect()
    }
}

/// Hour with the most detections; the earliest hour wins ties.
fn busiest_hour(per_hour: &[i64; 24]) -> Option<(usize, i64)> {
    let mut best: Option<(usize, i64)> = None;
    for (hour, &count) in per_hour.iter().enumerate() {
        if count > best.map_or(0, |(_, c)| c) {
            best = Some((hour, count));
        }
    }
    best
}

/// Samples at or after `cutoff` (all when `None`).
pub fn since(
    samples: &[DetectionSample],
    cutoff: Option<Timestamp>,
) -> impl Iterator<Item = &DetectionSample> {
    samples
        .iter()
        .filter(move |s| cutoff.map_or(true, |c| s.timestamp >= c))
}

/// Heatmap cell key for a position.
pub fn heat_cell(latitude: f64, longitude: f64) -> (i64, i64) {
    let scale = 10f64.powi(HEATMAP_DECIMALS);
    (
        (latitude * scale).round() as i64,
        (longitude * scale).round() as i64,
    )
}

/// Group detections into ~11 m cells, ordered by cell. Each cell reports the
/// position of the first sample that landed in it, so pass samples newest
/// first to get the latest position.
pub fn heat_cells<'a>(samples: impl IntoIterator<Item = &'a DetectionSample>) -> Vec<HeatPoint> {
    let mut cells: BTreeMap<(i64, i64), HeatPoint> = BTreeMap::new();
    for sample in samples {
        cells
            .entry(heat_cell(sample.latitude, sample.longitude))
            .or_insert_with(|| HeatPoint(sample.latitude, sample.longitude, 0))
            .2 += 1;
    }
    cells.into_values().collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::FixedOffset;

    use super::*;

    fn at(h: u32, m: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 10, h, m, 0).unwrap()
    }

    fn compute_window<Tz: TimeZone>(
        samples: &[DetectionSample],
        period: Period,
        now: &DateTime<Tz>,
    ) -> Statistics {
        WindowAggregate::fold(since(samples, period.cutoff(now)), &now.timezone()).summarize(period)
    }

    fn sample(ts: Timestamp, confidence: f64) -> DetectionSample {
        DetectionSample {
            timestamp: ts,
            latitude: 28.6139,
            longitude: 77.2090,
            confidence,
            alert_level: crate::alert::classify(confidence),
        }
    }

    #[test]
    fn empty_window_is_neutral() {
        let stats = compute_window(&[], Period::All, &at(12, 0));
        assert_eq!(stats.total_detections, 0);
        assert_eq!(stats.high_alerts, 0);
        assert_eq!(stats.average_confidence, 0.0);
        assert_eq!(stats.peak_hour, NO_PEAK_HOUR);
        assert_eq!(stats.peak_hour_count, 0);
        assert!(stats.alert_breakdown.is_empty());
    }

    #[test]
    fn totals_average_and_breakdown() {
        let samples = vec![
            sample(at(9, 0), 0.90),
            sample(at(9, 30), 0.75),
            sample(at(10, 0), 0.50),
            sample(at(10, 5), 0.88),
        ];
        let stats = compute_window(&samples, Period::All, &at(12, 0));
        assert_eq!(stats.total_detections, 4);
        assert_eq!(stats.high_alerts, 2);
        assert_eq!(stats.average_confidence, 0.7575);
        assert_eq!(stats.alert_breakdown.get(&AlertLevel::High), Some(&2));
        assert_eq!(stats.alert_breakdown.get(&AlertLevel::Medium), Some(&1));
        assert_eq!(stats.alert_breakdown.get(&AlertLevel::Low), Some(&1));
    }

    #[test]
    fn breakdown_omits_absent_levels() {
        let samples = vec![sample(at(9, 0), 0.95)];
        let stats = compute_window(&samples, Period::All, &at(12, 0));
        assert_eq!(stats.alert_breakdown.len(), 1);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["alert_breakdown"], serde_json::json!({"HIGH": 1}));
        assert_eq!(json["period"], "all");
    }

    #[test]
    fn peak_hour_ties_go_to_earliest_hour() {
        let samples = vec![
            sample(at(14, 0), 0.9),
            sample(at(14, 10), 0.9),
            sample(at(8, 0), 0.9),
            sample(at(8, 59), 0.9),
        ];
        let stats = compute_window(&samples, Period::All, &at(20, 0));
        assert_eq!(stats.peak_hour, "08:00");
        assert_eq!(stats.peak_hour_count, 2);
    }

    #[test]
    fn peak_hour_uses_timezone_of_now() {
        let ist = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let now = at(12, 0).with_timezone(&ist);
        // 03:45 UTC is 09:15 in UTC+05:30.
        let stats = compute_window(&[sample(at(3, 45), 0.9)], Period::All, &now);
        assert_eq!(stats.peak_hour, "09:00");
    }

    #[test]
    fn today_starts_at_local_midnight() {
        let ist = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let now = at(12, 0).with_timezone(&ist);
        // Local midnight on 2026-03-10 in UTC+05:30 is 18:30 UTC on 03-09.
        let cutoff = Period::Today.cutoff(&now).unwrap();
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2026, 3, 9, 18, 30, 0).unwrap());
    }

    #[test]
    fn week_and_month_cutoffs() {
        let now = at(12, 0);
        assert_eq!(Period::Week.cutoff(&now), Some(now - Duration::days(7)));
        assert_eq!(Period::Month.cutoff(&now), Some(now - Duration::days(30)));
        assert_eq!(Period::All.cutoff(&now), None);
    }

    #[test]
    fn window_excludes_older_records() {
        let now = at(12, 0);
        let samples = vec![
            sample(now - Duration::days(8), 0.9),
            sample(now - Duration::days(2), 0.8),
            sample(now - Duration::hours(1), 0.7),
        ];
        assert_eq!(compute_window(&samples, Period::Week, &now).total_detections, 2);
        assert_eq!(compute_window(&samples, Period::Month, &now).total_detections, 3);
        assert_eq!(compute_window(&samples, Period::Today, &now).total_detections, 1);
    }

    #[test]
    fn period_parses_known_values_only() {
        assert_eq!("week".parse::<Period>().unwrap(), Period::Week);
        assert!("year".parse::<Period>().is_err());
    }

    #[test]
    fn hourly_distribution_has_all_hours() {
        let samples = vec![sample(at(7, 0), 0.9), sample(at(7, 30), 0.9)];
        let dist = WindowAggregate::fold(&samples, &Utc).hourly();
        assert_eq!(dist.len(), 24);
        assert_eq!(dist["07"], 2);
        assert_eq!(dist["00"], 0);
    }

    #[test]
    fn heatmap_groups_nearby_points() {
        let mut a = sample(at(9, 0), 0.9);
        a.latitude = 28.61391;
        let mut b = sample(at(9, 1), 0.9);
        b.latitude = 28.61392;
        let mut c = sample(at(9, 2), 0.9);
        c.latitude = 28.6200;
        let points = heat_cells(&[a, b, c]);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], HeatPoint(28.61391, 77.2090, 2));
        assert_eq!(points[1].2, 1);
    }

    #[test]
    fn summarize_accepts_totals_from_a_store() {
        let mut agg = WindowAggregate {
            total: 3,
            confidence_sum: 2.4,
            ..WindowAggregate::default()
        };
        agg.per_hour[22] = 2;
        agg.per_hour[3] = 1;
        agg.breakdown.insert(AlertLevel::High, 3);
        let stats = agg.summarize(Period::Week);
        assert_eq!(stats.average_confidence, 0.8);
        assert_eq!(stats.peak_hour, "22:00");
        assert_eq!(stats.high_alerts, 3);
        assert_eq!(stats.period, Period::Week);
    }

    #[test]
    fn cell_key_rounds_to_four_decimals() {
        assert_eq!(heat_cell(28.61394, 77.20906), (286139, 772091));
        assert_eq!(heat_cell(-1.00006, 0.0), (-10001, 0));
    }
}
