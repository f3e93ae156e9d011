//! Alert dispatch for diseased-leaf findings
//!
//! Delivery is best effort: the pipeline logs a [`DeliveryError`] and moves on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::json;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

use crate::catalog::CatalogEntry;
use crate::config::AlertsConfig;
use crate::ledger::LogRecord;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Webhook request failed: {0}")]
    Request(String),

    #[error("Webhook returned status {0}")]
    Status(u16),

    #[error("Alert sink setup failed: {0}")]
    Setup(String),
}

pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Notification for one diseased region, composed from its record and catalog entry
#[derive(Debug, Clone, PartialEq)]
pub struct AlertMessage {
    pub plant_name: String,
    pub disease: String,
    /// Percentage, as stored in the result log
    pub confidence: f64,
    pub camera: String,
    pub image_name: String,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub cure: String,
}

impl AlertMessage {
    pub fn new(record: &LogRecord, entry: &CatalogEntry) -> Self {
        Self {
            plant_name: entry.plant_name.clone(),
            disease: entry.disease.clone(),
            confidence: record.confidence,
            camera: record.camera.clone(),
            image_name: record.image_name.clone(),
            timestamp: record.timestamp,
            description: entry.description.clone(),
            cure: entry.cure.clone(),
        }
    }

    pub fn text(&self) -> String {
        format!(
            "Plant disease detected\n\
             Plant: {}\n\
             Disease: {}\n\
             Confidence: {:.2}%\n\
             Camera: {}\n\
             Image: {}\n\
             Time: {}\n\
             Description: {}\n\
             Cure: {}",
            self.plant_name,
            self.disease,
            self.confidence,
            self.camera,
            self.image_name,
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.description,
            self.cure,
        )
    }
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn dispatch(&self, message: &AlertMessage) -> Result<()>;

    /// Short name reported on `/health`
    fn name(&self) -> &'static str;
}

/// Build the sink selected by configuration
pub fn from_config(config: &AlertsConfig) -> Result<Box<dyn AlertSink>> {
    match (&config.webhook_url, config.enabled) {
        (Some(url), true) => Ok(Box::new(WebhookSink::new(url, config)?)),
        _ => {
            info!(enabled = config.enabled, "No alert webhook in use, alerts go to the log");
            Ok(Box::new(LogSink))
        }
    }
}

/// Posts `{ <payload_key>: <text> }` to a chat webhook
pub struct WebhookSink {
    client: Client,
    url: String,
    payload_key: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, config: &AlertsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| DeliveryError::Setup(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            payload_key: config.payload_key.clone(),
        })
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    async fn dispatch(&self, message: &AlertMessage) -> Result<()> {
        let mut payload = serde_json::Map::new();
        payload.insert(self.payload_key.clone(), json!(message.text()));

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status(status.as_u16()));
        }

        debug!(image_name = %message.image_name, "Alert delivered to webhook");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

/// Writes alerts to the service log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    async fn dispatch(&self, message: &AlertMessage) -> Result<()> {
        info!(
            plant = %message.plant_name,
            disease = %message.disease,
            confidence = message.confidence,
            camera = %message.camera,
            image_name = %message.image_name,
            "Disease alert"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Keeps every dispatched message in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Mutex<Vec<AlertMessage>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<AlertMessage> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AlertSink for MemorySink {
    async fn dispatch(&self, message: &AlertMessage) -> Result<()> {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.clone());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
