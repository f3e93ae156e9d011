use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;

use super::http::ServiceClient;
use super::{DetectedRegion, Detector, InferenceError};
use crate::config::InferenceServiceConfig;

#[derive(Debug, Deserialize)]
struct DetectionResponse {
    /// A body with no `predictions` field means nothing was found
    #[serde(default)]
    predictions: Vec<DetectedRegion>,
}

pub(crate) fn parse_detections(body: &[u8]) -> Result<Vec<DetectedRegion>, InferenceError> {
    let response: DetectionResponse = serde_json::from_slice(body)
        .map_err(|e| InferenceError::InvalidResponse(e.to_string()))?;
    Ok(response.predictions)
}

/// Hosted object-detection model finding leaves in a full frame
pub struct HostedDetector {
    client: ServiceClient,
}

impl HostedDetector {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    pub fn from_config(config: &InferenceServiceConfig) -> Result<Self, InferenceError> {
        Ok(Self::new(ServiceClient::from_config(config)?))
    }
}

#[async_trait]
impl Detector for HostedDetector {
    async fn detect(&self, image: Bytes) -> Result<Vec<DetectedRegion>, InferenceError> {
        let body = self.client.post_image(image).await?;
        parse_detections(&body)
    }
}
