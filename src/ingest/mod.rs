//! Upload intake: validate, normalize, store, enqueue
//!
//! The caller gets an acknowledgement as soon as the job is queued; the
//! pipeline result is never part of it.

mod camera;

use bytes::Bytes;
use image::ImageError;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ImagingConfig;
use crate::imaging::{NormalizeError, normalize};
use crate::observability::Metrics;
use crate::pipeline::UploadJob;
use crate::queue::{JobBroker, QueueError};
use crate::storage::{StorageClient, StorageError};

pub use camera::{CameraIdError, resolve_camera};

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Upload is not a decodable image: {0}")]
    Decode(ImageError),

    #[error("Failed to re-encode upload: {0}")]
    Encode(ImageError),

    #[error("Invalid camera id: {0}")]
    InvalidCamera(#[from] CameraIdError),

    #[error("Processing queue is full")]
    QueueFull,

    #[error("Processing workers are unavailable")]
    QueueClosed,

    #[error("Failed to store upload: {0}")]
    Storage(#[from] StorageError),

    #[error("Image processing task failed: {0}")]
    Task(String),
}

impl From<QueueError> for IntakeError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Full => IntakeError::QueueFull,
            QueueError::Closed => IntakeError::QueueClosed,
        }
    }
}

impl From<NormalizeError> for IntakeError {
    fn from(err: NormalizeError) -> Self {
        match err {
            NormalizeError::Decode(e) => IntakeError::Decode(e),
            NormalizeError::Encode(e) => IntakeError::Encode(e),
        }
    }
}

/// Acknowledgement returned to the uploader
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Accepted {
    pub image_id: Uuid,
    pub image_name: String,
    pub camera: String,
}

#[derive(Clone)]
pub struct Intake {
    broker: Arc<JobBroker>,
    storage: Arc<StorageClient>,
    metrics: Arc<Metrics>,
    imaging: ImagingConfig,
    max_camera_id_len: usize,
}

impl Intake {
    pub fn new(
        broker: Arc<JobBroker>,
        storage: Arc<StorageClient>,
        metrics: Arc<Metrics>,
        imaging: ImagingConfig,
        max_camera_id_len: usize,
    ) -> Self {
        Self {
            broker,
            storage,
            metrics,
            imaging,
            max_camera_id_len,
        }
    }

    /// Accept one raw upload and hand it to a worker without waiting for the pipeline
    pub async fn accept(&self, raw: Bytes, camera: Option<&str>) -> Result<Accepted, IntakeError> {
        let camera = resolve_camera(camera, self.max_camera_id_len)?;

        // Claim queue capacity before spending CPU on the image
        let slot = self.broker.reserve().inspect_err(|e| {
            if *e == QueueError::Full {
                warn!(camera = %camera, "Upload rejected, processing queue full");
                self.metrics.upload_rejected();
            }
        })?;

        let imaging = self.imaging.clone();
        let normalized = tokio::task::spawn_blocking(move || normalize(&raw, &imaging))
            .await
            .map_err(|e| IntakeError::Task(e.to_string()))??;

        let job = UploadJob::new(camera, normalized.jpeg, normalized.pixels);
        self.storage.upload(&job.image_name, job.image.clone()).await?;

        let accepted = Accepted {
            image_id: job.image_id,
            image_name: job.image_name.clone(),
            camera: job.camera.clone(),
        };

        slot.send(job);
        self.metrics.upload_accepted();
        info!(image_id = %accepted.image_id, camera = %accepted.camera, "Upload accepted");

        Ok(accepted)
    }
}
