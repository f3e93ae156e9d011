use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use super::http::ServiceClient;
use super::{ClassificationResult, Classifier, InferenceError};
use crate::config::InferenceServiceConfig;
use crate::imaging::{Crop, encode_jpeg};

#[derive(Debug, Deserialize)]
struct RankedPrediction {
    class: String,
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct ClassificationResponse {
    #[serde(default)]
    predictions: Vec<RankedPrediction>,
}

/// Top-ranked prediction, or `None` when the body carries nothing usable
pub(crate) fn parse_top_prediction(body: &[u8]) -> Option<ClassificationResult> {
    let response: ClassificationResponse = serde_json::from_slice(body).ok()?;
    response
        .predictions
        .into_iter()
        .next()
        .filter(|top| !top.class.trim().is_empty())
        .map(|top| ClassificationResult::new(top.class, top.confidence))
}

/// Hosted classification model labelling one leaf crop
pub struct HostedClassifier {
    client: ServiceClient,
    jpeg_quality: u8,
}

impl HostedClassifier {
    pub fn new(client: ServiceClient, jpeg_quality: u8) -> Self {
        Self {
            client,
            jpeg_quality,
        }
    }

    pub fn from_config(
        config: &InferenceServiceConfig,
        jpeg_quality: u8,
    ) -> Result<Self, InferenceError> {
        Ok(Self::new(ServiceClient::from_config(config)?, jpeg_quality))
    }
}

#[async_trait]
impl Classifier for HostedClassifier {
    async fn classify(&self, crop: &Crop) -> ClassificationResult {
        if crop.is_empty() {
            return ClassificationResult::unknown();
        }

        let jpeg = match encode_jpeg(&crop.image, self.jpeg_quality) {
            Ok(jpeg) => jpeg,
            Err(e) => {
                warn!(error = %e, "Failed to encode crop, using fallback classification");
                return ClassificationResult::unknown();
            }
        };

        let body = match self.client.post_image(jpeg).await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %self.client.url(), error = %e, "Classifier call failed, using fallback classification");
                return ClassificationResult::unknown();
            }
        };

        parse_top_prediction(&body).unwrap_or_else(|| {
            warn!(url = %self.client.url(), "Classifier returned no usable prediction, using fallback classification");
            ClassificationResult::unknown()
        })
    }
}
