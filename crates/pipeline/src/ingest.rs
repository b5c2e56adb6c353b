//! Entry point for raw detection payloads.

use std::sync::Arc;

use chrono::Utc;
use groundwatch_core::detection::DetectionPayload;
use groundwatch_core::geo::{self, CameraCalibration};
use groundwatch_core::types::Timestamp;

use crate::actor::TrackerHandle;
use crate::error::PipelineError;
use crate::tracker::IngestOutcome;

/// Validates payloads, projects them onto the ground and forwards them to
/// the tracker. Cheap to clone.
#[derive(Clone)]
pub struct Ingestor {
    calibration: Arc<CameraCalibration>,
    tracker: TrackerHandle,
}

impl Ingestor {
    pub fn new(calibration: Arc<CameraCalibration>, tracker: TrackerHandle) -> Self {
        Self {
            calibration,
            tracker,
        }
    }

    pub async fn ingest(&self, payload: DetectionPayload) -> Result<IngestOutcome, PipelineError> {
        self.ingest_at(payload, Utc::now()).await
    }

    /// Ingest with an explicit arrival time.
    pub async fn ingest_at(
        &self,
        payload: DetectionPayload,
        arrival_time: Timestamp,
    ) -> Result<IngestOutcome, PipelineError> {
        let raw = payload.into_raw(&self.calibration, arrival_time)?;
        let position = geo::project(raw.pixel_x, raw.pixel_y, &self.calibration);
        self.tracker.ingest(position, raw).await
    }
}
