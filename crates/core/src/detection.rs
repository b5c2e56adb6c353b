//! Ingestion-boundary types for raw detections from the vision source.
//!
//! [`DetectionPayload`] is the loosely-shaped JSON an upstream producer sends.
//! It becomes a [`RawDetection`] only after [`DetectionPayload::into_raw`]
//! succeeds, so tracker state never sees unvalidated input.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::geo::CameraCalibration;
use crate::types::Timestamp;

/// Message stored on a record when the producer supplies none.
pub const DEFAULT_MESSAGE: &str = "PERSON DETECTED";

/// Upper bound on the base64 frame snapshot a producer may attach.
pub const MAX_IMAGE_BASE64_LEN: usize = 262_144;

// `validator` length bounds are `u64`.
const MAX_IMAGE_BASE64_LEN_U64: u64 = MAX_IMAGE_BASE64_LEN as u64;

/// Wire shape of one detection (bounding-box centre in pixels).
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DetectionPayload {
    pub pixel_x: f64,
    pub pixel_y: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence: f64,
    #[validate(length(min = 1, max = 64))]
    pub source_id: String,
    #[validate(length(max = 256))]
    pub message: Option<String>,
    /// When the frame was captured upstream, if known.
    pub captured_at: Option<Timestamp>,
    /// JPEG snapshot of the frame, base64 encoded.
    #[validate(length(max = MAX_IMAGE_BASE64_LEN_U64))]
    pub image_base64: Option<String>,
}

/// A structurally valid detection, stamped with its arrival time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawDetection {
    pub pixel_x: f64,
    pub pixel_y: f64,
    pub confidence: f64,
    pub source_id: String,
    pub message: String,
    pub captured_at: Timestamp,
    pub arrival_time: Timestamp,
    pub image_base64: Option<String>,
}

impl DetectionPayload {
    /// Validate against the camera frame and stamp with `arrival_time`.
    pub fn into_raw(
        self,
        calib: &CameraCalibration,
        arrival_time: Timestamp,
    ) -> Result<RawDetection, CoreError> {
        if !self.pixel_x.is_finite() || !self.pixel_y.is_finite() || !self.confidence.is_finite()
        {
            return Err(CoreError::Validation(
                "pixel coordinates and confidence must be finite numbers".into(),
            ));
        }
        self.validate()?;

        if self.source_id.trim().is_empty() {
            return Err(CoreError::Validation("source_id must not be blank".into()));
        }
        if !calib.contains_pixel(self.pixel_x, self.pixel_y) {
            return Err(CoreError::Validation(format!(
                "pixel ({}, {}) is outside the {}x{} frame",
                self.pixel_x, self.pixel_y, calib.frame_width, calib.frame_height
            )));
        }

        let image_base64 = self.image_base64.filter(|img| !img.is_empty());
        if image_base64.as_deref().is_some_and(|img| !is_base64(img)) {
            return Err(CoreError::Validation(
                "image_base64 is not valid base64 text".into(),
            ));
        }

        let message = self
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MESSAGE.to_string());

        Ok(RawDetection {
            pixel_x: self.pixel_x,
            pixel_y: self.pixel_y,
            confidence: self.confidence,
            source_id: self.source_id,
            message,
            captured_at: self.captured_at.unwrap_or(arrival_time),
            arrival_time,
            image_base64,
        })
    }
}

fn is_base64(text: &str) -> bool {
    let body = text.trim_end_matches('=');
    text.len() - body.len() <= 2
        && body
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/')
}
