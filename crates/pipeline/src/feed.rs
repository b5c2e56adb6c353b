//! File-based detection feed.
//!
//! Some vision producers write their latest detection to a JSON file rather
//! than calling the API. [`FeedWatcher`] polls the file's modification time
//! and ingests the payload whenever it changes. Bad input is logged and
//! skipped; the watcher only stops on cancellation.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use groundwatch_core::detection::DetectionPayload;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::ingest::Ingestor;

pub struct FeedWatcher {
    path: PathBuf,
    poll_interval: Duration,
    ingestor: Ingestor,
}

impl FeedWatcher {
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration, ingestor: Ingestor) -> Self {
        Self {
            path: path.into(),
            poll_interval,
            ingestor,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(path = %self.path.display(), "Feed watcher started");

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_modified: Option<SystemTime> = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Feed watcher stopping");
                    break;
                }
                _ = interval.tick() => {
                    let modified = match tokio::fs::metadata(&self.path).await {
                        Ok(meta) => meta.modified().ok(),
                        Err(e) => {
                            tracing::trace!(error = %e, "Feed file not readable");
                            continue;
                        }
                    };
                    if modified.is_none() || modified == last_modified {
                        continue;
                    }
                    last_modified = modified;
                    self.consume().await;
                }
            }
        }
    }

    async fn consume(&self) {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to read feed file");
                return;
            }
        };

        let payload: DetectionPayload = match serde_json::from_str(&contents) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed detection in feed file, skipping");
                return;
            }
        };

        match self.ingestor.ingest(payload).await {
            Ok(outcome) => {
                tracing::debug!(
                    location_key = %outcome.key(),
                    outcome = outcome.label(),
                    "Feed detection ingested"
                );
            }
            Err(e) => tracing::warn!(error = %e, "Feed detection rejected"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use groundwatch_core::geo::CameraCalibration;
    use tokio::sync::mpsc;

    use super::*;
    use crate::actor::{TrackerActor, TrackerHandle};
    use crate::tracker::{SightingTracker, TrackerConfig};
    use crate::zones::ZoneRegistry;

    fn calibration() -> CameraCalibration {
        CameraCalibration {
            latitude: 28.6139,
            longitude: 77.2090,
            height_meters: 2.5,
            tilt_degrees: 15.0,
            bearing_degrees: 0.0,
            horizontal_fov_degrees: 60.0,
            vertical_fov_degrees: 45.0,
            frame_width: 640,
            frame_height: 360,
        }
    }

    fn start_tracker() -> (TrackerHandle, mpsc::Receiver<crate::tracker::Confirmation>) {
        let (writer_tx, writer_rx) = mpsc::channel(8);
        let (actor, handle) = TrackerActor::new(
            SightingTracker::new(TrackerConfig::default()),
            Arc::new(ZoneRegistry::default()),
            writer_tx,
        );
        tokio::spawn(actor.run());
        (handle, writer_rx)
    }

    async fn watch(path: PathBuf, handle: TrackerHandle) -> (CancellationToken, tokio::task::JoinHandle<()>) {
        let ingestor = Ingestor::new(Arc::new(calibration()), handle);
        let watcher = FeedWatcher::new(path, Duration::from_millis(20), ingestor);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(watcher.run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(200)).await;
        (cancel, task)
    }

    #[tokio::test]
    async fn ingests_payload_written_to_feed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detection.json");
        std::fs::write(
            &path,
            r#"{"pixel_x": 320, "pixel_y": 180, "confidence": 0.91, "source_id": "cam-1"}"#,
        )
        .unwrap();

        let (handle, _writer_rx) = start_tracker();
        let (cancel, task) = watch(path, handle.clone()).await;

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].update_count, 1);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn malformed_feed_is_skipped_without_stopping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detection.json");
        std::fs::write(&path, "{not json").unwrap();

        let (handle, _writer_rx) = start_tracker();
        let (cancel, task) = watch(path, handle.clone()).await;

        assert!(handle.snapshot().await.unwrap().is_empty());
        assert!(!task.is_finished());

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn missing_feed_file_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, _writer_rx) = start_tracker();
        let (cancel, task) = watch(dir.path().join("absent.json"), handle.clone()).await;

        assert!(handle.snapshot().await.unwrap().is_empty());
        assert!(!task.is_finished());

        cancel.cancel();
        task.await.unwrap();
    }
}
