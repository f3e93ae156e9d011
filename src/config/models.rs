use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub imaging: ImagingConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default = "default_detector")]
    pub detector: InferenceServiceConfig,
    #[serde(default = "default_classifier")]
    pub classifier: InferenceServiceConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            imaging: ImagingConfig::default(),
            pipeline: PipelineConfig::default(),
            detector: default_detector(),
            classifier: default_classifier(),
            catalog: CatalogConfig::default(),
            ledger: LedgerConfig::default(),
            alerts: AlertsConfig::default(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Number of records returned by the results listing when no limit is given
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
    #[serde(default)]
    pub api: ApiLimits,
}

/// Upload request limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiLimits {
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: ByteSize,
    #[serde(default = "default_max_camera_id_len")]
    pub max_camera_id_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            recent_limit: default_recent_limit(),
            api: ApiLimits::default(),
        }
    }
}

impl Default for ApiLimits {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            max_camera_id_len: default_max_camera_id_len(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}

fn default_recent_limit() -> usize {
    20
}

fn default_max_upload_bytes() -> ByteSize {
    ByteSize(10 * 1024 * 1024) // 10 MB
}

fn default_max_camera_id_len() -> usize {
    64
}

/// Storage provider type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    #[default]
    Local,
    Memory,
}

/// Where original uploads are kept
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub provider: StorageProvider,
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageProvider::Local,
            root: default_storage_root(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("data/uploads")
}

/// Working resolution and encoding applied to every upload
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImagingConfig {
    #[serde(default = "default_working_dim")]
    pub width: u32,
    #[serde(default = "default_working_dim")]
    pub height: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for ImagingConfig {
    fn default() -> Self {
        Self {
            width: default_working_dim(),
            height: default_working_dim(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

fn default_working_dim() -> u32 {
    640
}

fn default_jpeg_quality() -> u8 {
    75
}

/// Worker pool sizing and job deadline
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Backlog per worker channel
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    #[serde(default = "default_job_deadline_ms")]
    pub job_deadline_ms: u64,
}

impl PipelineConfig {
    pub fn job_deadline(&self) -> Duration {
        Duration::from_millis(self.job_deadline_ms)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_depth: default_queue_depth(),
            job_deadline_ms: default_job_deadline_ms(),
        }
    }
}

fn default_workers() -> usize {
    4
}

fn default_queue_depth() -> usize {
    16
}

fn default_job_deadline_ms() -> u64 {
    120_000
}

/// Hosted inference endpoint (detector or classifier)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InferenceServiceConfig {
    #[serde(default = "default_inference_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_model_version")]
    pub version: String,
    #[serde(default = "default_request_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// 1 means a single attempt without retry
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Loaded from environment, not from config file
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl InferenceServiceConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            endpoint: default_inference_endpoint(),
            model: model.into(),
            version: default_model_version(),
            timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            api_key: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

fn default_detector() -> InferenceServiceConfig {
    InferenceServiceConfig::new("leaf-detection")
}

fn default_classifier() -> InferenceServiceConfig {
    InferenceServiceConfig::new("plant-disease-classification")
}

fn default_inference_endpoint() -> String {
    "https://detect.roboflow.com".to_string()
}

fn default_model_version() -> String {
    "1".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_max_attempts() -> u32 {
    1
}

fn default_retry_backoff_ms() -> u64 {
    500
}

/// Disease reference table
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
        }
    }
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("data/catalog.csv")
}

/// Append-only result log
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
        }
    }
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("data/results.csv")
}

/// Alert delivery
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertsConfig {
    #[serde(default = "default_alerts_enabled")]
    pub enabled: bool,
    #[serde(default = "default_alert_timeout_ms")]
    pub timeout_ms: u64,
    /// JSON field carrying the message text (`text` for Slack-style hooks, `content` for Discord)
    #[serde(default = "default_payload_key")]
    pub payload_key: String,
    /// Loaded from environment, not from config file
    #[serde(skip)]
    pub webhook_url: Option<String>,
}

impl AlertsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            enabled: default_alerts_enabled(),
            timeout_ms: default_alert_timeout_ms(),
            payload_key: default_payload_key(),
            webhook_url: None,
        }
    }
}

fn default_alerts_enabled() -> bool {
    true
}

fn default_alert_timeout_ms() -> u64 {
    10_000
}

fn default_payload_key() -> String {
    "text".to_string()
}
