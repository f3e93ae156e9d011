//! Clients for the hosted leaf detector and disease classifier
//!
//! Both services accept a multipart image upload and answer with a JSON
//! `predictions` array. Detector failures are hard errors for the job;
//! classifier failures degrade to [`ClassificationResult::unknown`].

mod classifier;
mod detector;
pub mod http;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::imaging::Crop;

pub use classifier::HostedClassifier;
pub use detector::HostedDetector;
pub use http::{RetryPolicy, ServiceClient};

/// Label recorded when classification is unavailable
pub const UNKNOWN_LABEL: &str = "Unknown";

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out")]
    Timeout,

    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("client setup failed: {0}")]
    Setup(String),
}

impl InferenceError {
    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            InferenceError::Request(_) | InferenceError::Timeout => true,
            InferenceError::Status { status, .. } => *status >= 500 || *status == 429,
            InferenceError::InvalidResponse(_) | InferenceError::Setup(_) => false,
        }
    }
}

/// Leaf bounding box in center coordinates, as returned by the detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub confidence: f64,
    #[serde(default)]
    pub class: Option<String>,
}

impl DetectedRegion {
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: String,
    pub confidence: f64,
}

impl ClassificationResult {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn unknown() -> Self {
        Self {
            label: UNKNOWN_LABEL.to_string(),
            confidence: 0.0,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_LABEL && self.confidence == 0.0
    }
}

#[async_trait]
pub trait Detector: Send + Sync {
    /// Detect leaf regions in a full normalized JPEG
    async fn detect(&self, image: Bytes) -> Result<Vec<DetectedRegion>, InferenceError>;
}

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify one crop; never fails, degrading to [`ClassificationResult::unknown`]
    async fn classify(&self, crop: &Crop) -> ClassificationResult;
}
