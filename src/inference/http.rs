//! HTTP transport shared by the hosted inference clients

use bytes::Bytes;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{debug, warn};

use super::InferenceError;
use crate::config::InferenceServiceConfig;

pub type Result<T> = std::result::Result<T, InferenceError>;

/// Retry policy for one service; a single attempt by default
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Delay before attempt `attempt + 1`: backoff, 2x backoff, 4x backoff, ...
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Multipart image poster for a Roboflow-style hosted model
pub struct ServiceClient {
    client: Client,
    url: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl ServiceClient {
    pub fn from_config(config: &InferenceServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout())
            .user_agent(concat!("leafwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| InferenceError::Setup(e.to_string()))?;

        let url = format!(
            "{}/{}/{}",
            config.endpoint.trim_end_matches('/'),
            config.model,
            config.version
        );

        Ok(Self {
            client,
            url,
            api_key: config.api_key.clone(),
            retry: RetryPolicy {
                max_attempts: config.max_attempts.max(1),
                backoff: config.retry_backoff(),
            },
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Post a JPEG and return the raw response body
    pub async fn post_image(&self, jpeg: Bytes) -> Result<Bytes> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.post_once(jpeg.clone()).await {
                Ok(body) => {
                    if attempt > 1 {
                        debug!(url = %self.url, attempt, "Inference call succeeded after retry");
                    }
                    return Ok(body);
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    warn!(url = %self.url, attempt, error = %e, "Inference call failed, retrying");
                    tokio::time::sleep(self.retry.delay_after(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post_once(&self, jpeg: Bytes) -> Result<Bytes> {
        let size = jpeg.len();
        let part = Part::stream_with_length(jpeg, size as u64)
            .file_name("image.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| InferenceError::Setup(e.to_string()))?;
        let form = Form::new().part("file", part);

        let mut request = self.client.post(&self.url).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.query(&[("api_key", key)]);
        }

        let response = request.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body: truncate(&body, 256),
            });
        }

        let body = response.bytes().await.map_err(map_reqwest_error)?;
        debug!(url = %self.url, request_bytes = size, response_bytes = body.len(), "Inference call completed");

        Ok(body)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> InferenceError {
    if e.is_timeout() {
        InferenceError::Timeout
    } else {
        InferenceError::Request(e.to_string())
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
