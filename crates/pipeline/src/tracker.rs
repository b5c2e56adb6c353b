//! Per-location sighting state machine.
//!
//! A sighting is keyed by the [`LocationKey`] of its projected position. It
//! starts on the first detection at a key, accumulates updates, and is
//! confirmed exactly once when it has been seen continuously for at least the
//! persistence threshold. Sightings idle for longer than the stale threshold
//! are evicted, either by a sweep or lazily on the next detection at the key.
//!
//! The tracker itself is synchronous and owned by a single task
//! ([`TrackerActor`](crate::actor::TrackerActor)); durable writes happen
//! elsewhere and are reported back as a [`PersistOutcome`].

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::Duration;
use groundwatch_core::alert::{self, Geofence};
use groundwatch_core::detection::RawDetection;
use groundwatch_core::geo::{GeoPosition, LocationKey};
use groundwatch_core::types::{round_to, DbId, Timestamp};
use groundwatch_db::models::detection::CreateDetection;
use groundwatch_db::models::tracking::UpsertTracking;
use serde::Serialize;

/// Default minimum continuous-sighting duration before confirmation.
pub const DEFAULT_PERSISTENCE_THRESHOLD_SECS: f64 = 5.0;

/// Default idle time after which a sighting is evicted.
pub const DEFAULT_STALE_THRESHOLD_SECS: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    pub persistence_threshold: Duration,
    pub stale_threshold: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            persistence_threshold: duration_from_secs(DEFAULT_PERSISTENCE_THRESHOLD_SECS),
            stale_threshold: duration_from_secs(DEFAULT_STALE_THRESHOLD_SECS),
        }
    }
}

// ---------------------------------------------------------------------------
// Sighting state
// ---------------------------------------------------------------------------

/// Where a sighting is in its durable-write lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceState {
    /// Not written. A qualifying update will confirm it.
    Unsaved,
    /// Confirmed and handed to the writer; no re-confirmation until reported.
    Pending,
    /// Written to the store. Never reverts.
    Saved,
}

/// An in-progress sighting at one location key.
#[derive(Debug, Clone)]
pub struct TrackedSighting {
    pub location_key: LocationKey,
    /// Distinguishes this lifecycle from earlier ones at the same key.
    pub generation: u64,
    pub first_seen: Timestamp,
    pub last_seen: Timestamp,
    pub update_count: u32,
    pub latest: RawDetection,
    pub latest_position: GeoPosition,
    pub persistence: PersistenceState,
    pub detection_id: Option<DbId>,
}

impl TrackedSighting {
    fn start(
        key: LocationKey,
        generation: u64,
        position: GeoPosition,
        raw: RawDetection,
        now: Timestamp,
    ) -> Self {
        Self {
            location_key: key,
            generation,
            first_seen: now,
            last_seen: now,
            update_count: 1,
            latest: raw,
            latest_position: position,
            persistence: PersistenceState::Unsaved,
            detection_id: None,
        }
    }

    pub fn stored(&self) -> bool {
        self.persistence == PersistenceState::Saved
    }

    pub fn duration(&self) -> Duration {
        self.last_seen - self.first_seen
    }

    fn is_stale(&self, now: Timestamp, threshold: Duration) -> bool {
        now - self.last_seen > threshold
    }

    pub fn snapshot(&self) -> SightingSnapshot {
        SightingSnapshot {
            location_key: self.location_key.to_string(),
            latitude: self.latest_position.latitude,
            longitude: self.latest_position.longitude,
            first_seen: self.first_seen,
            last_seen: self.last_seen,
            update_count: self.update_count,
            duration_seconds: round_to(seconds(self.duration()), 2),
            confidence: self.latest.confidence,
            source_id: self.latest.source_id.clone(),
            persistence: self.persistence,
            stored: self.stored(),
            detection_id: self.detection_id,
        }
    }
}

/// Read-only view of a sighting for the tracking endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SightingSnapshot {
    pub location_key: String,
    pub latitude: f64,
    pub longitude: f64,
    pub first_seen: Timestamp,
    pub last_seen: Timestamp,
    pub update_count: u32,
    pub duration_seconds: f64,
    pub confidence: f64,
    pub source_id: String,
    pub persistence: PersistenceState,
    pub stored: bool,
    pub detection_id: Option<DbId>,
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Everything the writer needs to persist a confirmed sighting.
#[derive(Debug, Clone, PartialEq)]
pub struct Confirmation {
    pub key: LocationKey,
    pub generation: u64,
    pub record: CreateDetection,
    pub tracking: UpsertTracking,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// A new lifecycle began at the key.
    Started { key: LocationKey },
    /// An existing sighting was refreshed.
    Updated { key: LocationKey, update_count: u32 },
    /// The sighting crossed the persistence threshold and must be written.
    Confirmed(Confirmation),
}

impl IngestOutcome {
    pub fn key(&self) -> LocationKey {
        match self {
            IngestOutcome::Started { key } | IngestOutcome::Updated { key, .. } => *key,
            IngestOutcome::Confirmed(confirmation) => confirmation.key,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, IngestOutcome::Confirmed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            IngestOutcome::Started { .. } => "started",
            IngestOutcome::Updated { .. } => "updated",
            IngestOutcome::Confirmed(_) => "confirmed",
        }
    }
}

/// Result of a durable write, reported back to the tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOutcome {
    /// Written; the sighting becomes `Saved`.
    Persisted {
        key: LocationKey,
        generation: u64,
        id: DbId,
    },
    /// Not written; the next qualifying update confirms again.
    PendingRetry { key: LocationKey, generation: u64 },
}

impl PersistOutcome {
    pub fn retry(confirmation: &Confirmation) -> Self {
        PersistOutcome::PendingRetry {
            key: confirmation.key,
            generation: confirmation.generation,
        }
    }

    fn target(&self) -> (LocationKey, u64) {
        match self {
            PersistOutcome::Persisted {
                key, generation, ..
            }
            | PersistOutcome::PendingRetry { key, generation } => (*key, *generation),
        }
    }
}

// ---------------------------------------------------------------------------
// SightingTracker
// ---------------------------------------------------------------------------

pub struct SightingTracker {
    config: TrackerConfig,
    sightings: HashMap<LocationKey, TrackedSighting>,
    next_generation: u64,
}

impl SightingTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            sightings: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Fold one detection into the sighting at its location key.
    pub fn ingest(
        &mut self,
        position: GeoPosition,
        raw: RawDetection,
        now: Timestamp,
        zones: &[Geofence],
    ) -> IngestOutcome {
        let key = position.location_key();
        let config = &self.config;

        match self.sightings.entry(key) {
            Entry::Occupied(mut entry) if !entry.get().is_stale(now, config.stale_threshold) => {
                update(entry.get_mut(), position, raw, now, config, zones)
            }
            entry => {
                self.next_generation += 1;
                let fresh = TrackedSighting::start(key, self.next_generation, position, raw, now);
                match entry {
                    Entry::Occupied(mut stale) => {
                        stale.insert(fresh);
                    }
                    Entry::Vacant(vacant) => {
                        vacant.insert(fresh);
                    }
                }
                IngestOutcome::Started { key }
            }
        }
    }

    /// Apply a writer report. Returns `false` when the sighting it refers to
    /// no longer exists (evicted or replaced by a newer lifecycle).
    pub fn record_outcome(&mut self, outcome: &PersistOutcome) -> bool {
        let (key, generation) = outcome.target();
        let Some(sighting) = self.sightings.get_mut(&key) else {
            return false;
        };
        if sighting.generation != generation || sighting.persistence != PersistenceState::Pending
        {
            return false;
        }
        match outcome {
            PersistOutcome::Persisted { id, .. } => {
                sighting.persistence = PersistenceState::Saved;
                sighting.detection_id = Some(*id);
            }
            PersistOutcome::PendingRetry { .. } => {
                sighting.persistence = PersistenceState::Unsaved;
            }
        }
        true
    }

    /// Remove every sighting idle for longer than the stale threshold.
    pub fn evict(&mut self, now: Timestamp) -> Vec<LocationKey> {
        let threshold = self.config.stale_threshold;
        let stale: Vec<LocationKey> = self
            .sightings
            .values()
            .filter(|s| s.is_stale(now, threshold))
            .map(|s| s.location_key)
            .collect();
        for key in &stale {
            self.sightings.remove(key);
        }
        stale
    }

    pub fn get(&self, key: &LocationKey) -> Option<&TrackedSighting> {
        self.sightings.get(key)
    }

    pub fn len(&self) -> usize {
        self.sightings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sightings.is_empty()
    }

    /// All live sightings, most recently seen first.
    pub fn snapshot(&self) -> Vec<SightingSnapshot> {
        let mut all: Vec<_> = self.sightings.values().map(TrackedSighting::snapshot).collect();
        all.sort_by(|a, b| {
            b.last_seen
                .cmp(&a.last_seen)
                .then_with(|| a.location_key.cmp(&b.location_key))
        });
        all
    }
}

fn update(
    sighting: &mut TrackedSighting,
    position: GeoPosition,
    raw: RawDetection,
    now: Timestamp,
    config: &TrackerConfig,
    zones: &[Geofence],
) -> IngestOutcome {
    sighting.update_count = sighting.update_count.saturating_add(1);
    sighting.last_seen = sighting.last_seen.max(now);
    sighting.latest = raw;
    sighting.latest_position = position;

    if sighting.duration() >= config.persistence_threshold
        && sighting.persistence == PersistenceState::Unsaved
    {
        sighting.persistence = PersistenceState::Pending;
        return IngestOutcome::Confirmed(confirm(sighting, zones));
    }

    IngestOutcome::Updated {
        key: sighting.location_key,
        update_count: sighting.update_count,
    }
}

/// Convert fractional seconds into a millisecond-precision duration.
pub fn duration_from_secs(secs: f64) -> Duration {
    Duration::milliseconds((secs * 1000.0).round() as i64)
}

fn seconds(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 1000.0
}

fn confirm(sighting: &TrackedSighting, zones: &[Geofence]) -> Confirmation {
    let position = sighting.latest_position;
    let confidence = sighting.latest.confidence;
    let record = CreateDetection {
        timestamp: sighting.latest.captured_at,
        latitude: round_to(position.latitude, 6),
        longitude: round_to(position.longitude, 6),
        confidence: round_to(confidence, 4),
        message: sighting.latest.message.clone(),
        source_id: sighting.latest.source_id.clone(),
        alert_level: alert::classify(confidence),
        duration_seconds: round_to(seconds(sighting.duration()), 2),
        in_safe_zone: alert::in_safe_zone(&position, zones),
        image_base64: sighting.latest.image_base64.clone(),
    };
    let tracking = UpsertTracking {
        location_key: sighting.location_key.to_string(),
        first_seen: sighting.first_seen,
        last_seen: sighting.last_seen,
        update_count: i32::try_from(sighting.update_count).unwrap_or(i32::MAX),
        latitude: position.latitude,
        longitude: position.longitude,
    };
    Confirmation {
        key: sighting.location_key,
        generation: sighting.generation,
        record,
        tracking,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};
    use groundwatch_core::alert::AlertLevel;

    use super::*;

    fn t(secs: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn raw(confidence: f64, at: Timestamp) -> RawDetection {
        RawDetection {
            pixel_x: 320.0,
            pixel_y: 180.0,
            confidence,
            source_id: "cam-1".into(),
            message: "PERSON DETECTED".into(),
            captured_at: at,
            arrival_time: at,
            image_base64: None,
        }
    }

    fn here() -> GeoPosition {
        GeoPosition::new(28.613906, 77.209)
    }

    fn tracker(stale_secs: i64) -> SightingTracker {
        SightingTracker::new(TrackerConfig {
            persistence_threshold: Duration::seconds(5),
            stale_threshold: Duration::seconds(stale_secs),
        })
    }

    fn feed(tracker: &mut SightingTracker, secs: i64) -> IngestOutcome {
        tracker.ingest(here(), raw(0.9, t(secs)), t(secs), &[])
    }

    #[test]
    fn first_detection_starts_a_sighting() {
        let mut tracker = tracker(10);
        let outcome = feed(&mut tracker, 0);
        assert_matches!(outcome, IngestOutcome::Started { .. });
        let sighting = tracker.get(&here().location_key()).unwrap();
        assert_eq!(sighting.update_count, 1);
        assert_eq!(sighting.persistence, PersistenceState::Unsaved);
    }

    #[test]
    fn confirms_exactly_once_across_many_updates() {
        let mut tracker = tracker(10);
        let outcomes: Vec<_> = (0..=8).map(|s| feed(&mut tracker, s)).collect();
        let confirmed: Vec<_> = outcomes.iter().filter(|o| o.is_confirmed()).collect();
        assert_eq!(confirmed.len(), 1);
        assert!(outcomes[5].is_confirmed());
        assert_matches!(outcomes[6], IngestOutcome::Updated { update_count: 7, .. });
    }

    #[test]
    fn below_threshold_never_confirms() {
        let mut tracker = tracker(10);
        for s in 0..5 {
            assert!(!feed(&mut tracker, s).is_confirmed());
        }
    }

    #[test]
    fn confirmation_carries_rounded_classified_record() {
        let mut tracker = tracker(10);
        let position = GeoPosition::new(28.61390612345, 77.20900098765);
        tracker.ingest(position, raw(0.876_543, t(0)), t(0), &[]);
        let outcome = tracker.ingest(position, raw(0.876_543, t(6)), t(6), &[]);
        let confirmation = assert_matches!(outcome, IngestOutcome::Confirmed(c) => c);
        assert_eq!(confirmation.record.latitude, 28.613906);
        assert_eq!(confirmation.record.longitude, 77.209001);
        assert_eq!(confirmation.record.confidence, 0.8765);
        assert_eq!(confirmation.record.alert_level, AlertLevel::High);
        assert_eq!(confirmation.record.duration_seconds, 6.0);
        assert_eq!(confirmation.record.timestamp, t(6));
        assert_eq!(confirmation.tracking.update_count, 2);
        assert_eq!(confirmation.tracking.location_key, "28.61391_77.20900");
    }

    #[test]
    fn confirmation_uses_capture_time_and_snapshot() {
        let mut tracker = tracker(10);
        let captured = t(-3600);
        tracker.ingest(here(), raw(0.9, t(0)), t(0), &[]);
        let latest = RawDetection {
            captured_at: captured,
            image_base64: Some("/9j/4AAQ".into()),
            ..raw(0.9, t(6))
        };
        let outcome = tracker.ingest(here(), latest, t(6), &[]);
        let confirmation = assert_matches!(outcome, IngestOutcome::Confirmed(c) => c);
        assert_eq!(confirmation.record.timestamp, captured);
        assert_eq!(confirmation.record.image_base64.as_deref(), Some("/9j/4AAQ"));
        // Tracking keeps arrival times.
        assert_eq!(confirmation.tracking.last_seen, t(6));
    }

    #[test]
    fn confirmation_flags_safe_zone() {
        let mut tracker = tracker(10);
        let zones = vec![Geofence {
            name: "Depot".into(),
            center: here(),
            radius_meters: 20.0,
        }];
        tracker.ingest(here(), raw(0.5, t(0)), t(0), &zones);
        let outcome = tracker.ingest(here(), raw(0.5, t(5)), t(5), &zones);
        let confirmation = assert_matches!(outcome, IngestOutcome::Confirmed(c) => c);
        assert!(confirmation.record.in_safe_zone);
        assert_eq!(confirmation.record.alert_level, AlertLevel::Low);
    }

    #[test]
    fn persisted_report_marks_saved_permanently() {
        let mut tracker = tracker(10);
        feed(&mut tracker, 0);
        let confirmation = assert_matches!(feed(&mut tracker, 5), IngestOutcome::Confirmed(c) => c);
        assert!(tracker.record_outcome(&PersistOutcome::Persisted {
            key: confirmation.key,
            generation: confirmation.generation,
            id: 17,
        }));

        let sighting = tracker.get(&confirmation.key).unwrap();
        assert!(sighting.stored());
        assert_eq!(sighting.detection_id, Some(17));

        // A late retry report cannot un-store it.
        assert!(!tracker.record_outcome(&PersistOutcome::retry(&confirmation)));
        assert!(tracker.get(&confirmation.key).unwrap().stored());
        assert!(!feed(&mut tracker, 7).is_confirmed());
    }

    #[test]
    fn failed_write_is_retried_on_next_update() {
        let mut tracker = tracker(10);
        feed(&mut tracker, 0);
        let first = assert_matches!(feed(&mut tracker, 5), IngestOutcome::Confirmed(c) => c);

        // In flight: no second confirmation.
        assert!(!feed(&mut tracker, 6).is_confirmed());

        assert!(tracker.record_outcome(&PersistOutcome::retry(&first)));
        assert_eq!(
            tracker.get(&first.key).unwrap().persistence,
            PersistenceState::Unsaved
        );
        let second = assert_matches!(feed(&mut tracker, 7), IngestOutcome::Confirmed(c) => c);
        assert_eq!(second.generation, first.generation);
        assert_eq!(second.record.duration_seconds, 7.0);
    }

    #[test]
    fn gap_longer_than_stale_threshold_restarts_lifecycle() {
        let mut tracker = tracker(30);
        feed(&mut tracker, 0);
        let outcome = feed(&mut tracker, 35);
        assert_matches!(outcome, IngestOutcome::Started { .. });

        let sighting = tracker.get(&here().location_key()).unwrap();
        assert_eq!(sighting.first_seen, t(35));
        assert_eq!(sighting.update_count, 1);

        // The new lifecycle confirms on its own schedule.
        assert!(!feed(&mut tracker, 38).is_confirmed());
        assert!(feed(&mut tracker, 40).is_confirmed());
    }

    #[test]
    fn report_for_replaced_lifecycle_is_ignored() {
        let mut tracker = tracker(10);
        feed(&mut tracker, 0);
        let old = assert_matches!(feed(&mut tracker, 5), IngestOutcome::Confirmed(c) => c);
        feed(&mut tracker, 30);

        assert!(!tracker.record_outcome(&PersistOutcome::Persisted {
            key: old.key,
            generation: old.generation,
            id: 1,
        }));
        assert!(!tracker.get(&old.key).unwrap().stored());
    }

    #[test]
    fn evict_removes_only_stale_entries() {
        let mut tracker = tracker(10);
        feed(&mut tracker, 0);
        let other = GeoPosition::new(28.7, 77.3);
        tracker.ingest(other, raw(0.9, t(8)), t(8), &[]);

        let evicted = tracker.evict(t(11));
        assert_eq!(evicted, vec![here().location_key()]);
        assert_eq!(tracker.len(), 1);

        // Idempotent.
        assert!(tracker.evict(t(11)).is_empty());
    }

    #[test]
    fn evict_ignores_persistence_state() {
        let mut tracker = tracker(10);
        feed(&mut tracker, 0);
        assert!(feed(&mut tracker, 5).is_confirmed());
        assert_eq!(tracker.evict(t(16)).len(), 1);
        assert!(tracker.is_empty());
    }

    #[test]
    fn out_of_order_arrival_never_moves_last_seen_back() {
        let mut tracker = tracker(10);
        feed(&mut tracker, 0);
        feed(&mut tracker, 4);
        feed(&mut tracker, 2);
        let sighting = tracker.get(&here().location_key()).unwrap();
        assert_eq!(sighting.last_seen, t(4));
        assert_eq!(sighting.update_count, 3);
    }

    #[test]
    fn snapshot_lists_most_recent_first() {
        let mut tracker = tracker(10);
        feed(&mut tracker, 0);
        tracker.ingest(GeoPosition::new(28.7, 77.3), raw(0.4, t(3)), t(3), &[]);
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].location_key, "28.70000_77.30000");
        assert!(!snapshot[0].stored);
    }
}
