//! Request and response shapes of the HTTP boundary.
//!
//! - `POST /upload?camera=<id>` answers [`UploadAccepted`]
//! - `GET /api/results?limit=<n>` answers [`ResultsResponse`]
//! - `GET /health` answers [`HealthResponse`]
//!
//! Errors are always an [`ErrorResponse`]:
//!
//! ```json
//! { "code": "QUEUE_FULL", "message": "processing queue is full, retry later" }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::observability::MetricsSnapshot;

#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    pub camera: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UploadAccepted {
    pub image_id: Uuid,
    pub image_name: String,
    pub camera: String,
    /// Always `queued`; the pipeline outcome is never part of this response
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResultsQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

/// One result log row joined with its catalog entry
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResultEntry {
    pub timestamp: DateTime<Utc>,
    pub time_since: String,
    pub inference: String,
    pub confidence: f64,
    pub image_name: String,
    pub image_url: String,
    pub camera: String,
    pub plant_name: String,
    pub disease: String,
    pub description: String,
    pub cure: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResultsResponse {
    pub results: Vec<ResultEntry>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, String>,
    pub alert_sink: &'static str,
    pub version: String,
    pub metrics: MetricsSnapshot,
}
