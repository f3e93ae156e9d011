use bytes::Bytes;
use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Camera recorded when the uploader does not name one
pub const DEFAULT_CAMERA: &str = "UnknownCam";

/// Detections at or below this confidence never reach the cropper
pub const MIN_REGION_CONFIDENCE: f64 = 0.5;

/// One accepted upload, owned by the worker that processes it
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub image_id: Uuid,
    /// Stored filename of the normalized original, `<image_id>.jpg`
    pub image_name: String,
    pub camera: String,
    pub received_at: DateTime<Utc>,
    /// Normalized JPEG sent to the detector
    pub image: Bytes,
    /// Decoded pixels of `image`, cropped per region
    pub pixels: Arc<RgbImage>,
}

impl UploadJob {
    pub fn new(camera: impl Into<String>, image: Bytes, pixels: RgbImage) -> Self {
        let image_id = Uuid::now_v7();
        Self {
            image_id,
            image_name: image_name_for(image_id),
            camera: camera.into(),
            received_at: Utc::now(),
            image,
            pixels: Arc::new(pixels),
        }
    }
}

pub fn image_name_for(image_id: Uuid) -> String {
    format!("{image_id}.jpg")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Received,
    Detecting,
    /// Finished, possibly with per-region failures
    Done,
    /// Detection failed or timed out; no region was processed
    Failed,
}

/// Per-region step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// The classification task aborted (panicked) instead of returning
    Classifying,
    /// The record could not be appended; it is lost
    Logging,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Classifying => "classifying",
            Stage::Logging => "logging",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum AlertStatus {
    /// Healthy leaf or no catalog match
    NotRequired,
    Sent,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RegionOutcome {
    /// Record appended
    Recorded {
        label: String,
        confidence: f64,
        alert: AlertStatus,
    },
    Failed {
        stage: Stage,
        error: String,
    },
    /// Not started before the job deadline
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionReport {
    /// Position in the detector's (filtered) output
    pub index: usize,
    #[serde(flatten)]
    pub outcome: RegionOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    pub image_id: Uuid,
    pub camera: String,
    pub state: JobState,
    pub regions: Vec<RegionReport>,
    /// Detector error for failed jobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobReport {
    pub fn recorded(&self) -> usize {
        self.regions
            .iter()
            .filter(|r| matches!(r.outcome, RegionOutcome::Recorded { .. }))
            .count()
    }

    pub fn alerted(&self) -> usize {
        self.regions
            .iter()
            .filter(|r| {
                matches!(
                    r.outcome,
                    RegionOutcome::Recorded {
                        alert: AlertStatus::Sent,
                        ..
                    }
                )
            })
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.regions
            .iter()
            .filter(|r| r.outcome == RegionOutcome::Skipped)
            .count()
    }
}
