use super::models::{Config, InferenceServiceConfig};
use thiserror::Error;

/// Hard cap on accepted upload size
const MAX_UPLOAD_BYTES: u64 = 32 * 1024 * 1024; // 32 MB

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("max_upload_bytes ({actual}) must be between 1 and {limit}")]
    UploadSizeOutOfRange { actual: u64, limit: u64 },

    #[error("{field} must be positive")]
    MustBePositive { field: &'static str },

    #[error("{service} endpoint '{endpoint}' must use http:// or https://")]
    InvalidEndpoint { service: &'static str, endpoint: String },

    #[error("{service} model name is required")]
    MissingModel { service: &'static str },

    #[error("jpeg_quality must be within 1..=100, got {0}")]
    InvalidJpegQuality(u8),

    #[error("Alert webhook URL must use http:// or https://")]
    InvalidWebhookUrl,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_server(config)?;
    validate_imaging(config)?;
    validate_pipeline(config)?;
    validate_service("detector", &config.detector)?;
    validate_service("classifier", &config.classifier)?;
    validate_alerts(config)?;
    Ok(())
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn positive(value: u64, field: &'static str) -> Result<(), ValidationError> {
    if value == 0 {
        return Err(ValidationError::MustBePositive { field });
    }
    Ok(())
}

fn validate_server(config: &Config) -> Result<(), ValidationError> {
    let actual = config.server.api.max_upload_bytes.as_u64();
    if actual == 0 || actual > MAX_UPLOAD_BYTES {
        return Err(ValidationError::UploadSizeOutOfRange {
            actual,
            limit: MAX_UPLOAD_BYTES,
        });
    }

    positive(config.server.recent_limit as u64, "server.recent_limit")?;
    positive(
        config.server.api.max_camera_id_len as u64,
        "server.api.max_camera_id_len",
    )
}

fn validate_imaging(config: &Config) -> Result<(), ValidationError> {
    positive(config.imaging.width.into(), "imaging.width")?;
    positive(config.imaging.height.into(), "imaging.height")?;

    if !(1..=100).contains(&config.imaging.jpeg_quality) {
        return Err(ValidationError::InvalidJpegQuality(config.imaging.jpeg_quality));
    }

    Ok(())
}

fn validate_pipeline(config: &Config) -> Result<(), ValidationError> {
    positive(config.pipeline.workers as u64, "pipeline.workers")?;
    positive(config.pipeline.queue_depth as u64, "pipeline.queue_depth")?;
    positive(config.pipeline.job_deadline_ms, "pipeline.job_deadline_ms")
}

fn validate_service(
    service: &'static str,
    config: &InferenceServiceConfig,
) -> Result<(), ValidationError> {
    if !is_http_url(&config.endpoint) {
        return Err(ValidationError::InvalidEndpoint {
            service,
            endpoint: config.endpoint.clone(),
        });
    }

    if config.model.trim().is_empty() {
        return Err(ValidationError::MissingModel { service });
    }

    let (timeout, attempts) = match service {
        "detector" => ("detector.timeout_ms", "detector.max_attempts"),
        _ => ("classifier.timeout_ms", "classifier.max_attempts"),
    };
    positive(config.timeout_ms, timeout)?;
    positive(config.max_attempts.into(), attempts)
}

fn validate_alerts(config: &Config) -> Result<(), ValidationError> {
    positive(config.alerts.timeout_ms, "alerts.timeout_ms")?;

    if let Some(url) = &config.alerts.webhook_url {
        if !is_http_url(url) {
            return Err(ValidationError::InvalidWebhookUrl);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::ByteSize;

    #[test]
    fn test_valid_config() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_upload_size_limit() {
        let mut config = Config::default();
        config.server.api.max_upload_bytes = ByteSize(64 * 1024 * 1024);

        assert!(matches!(
            validate(&config),
            Err(ValidationError::UploadSizeOutOfRange { .. })
        ));
    }

    #[test]
    fn test_zero_workers() {
        let mut config = Config::default();
        config.pipeline.workers = 0;

        assert!(matches!(
            validate(&config),
            Err(ValidationError::MustBePositive { field: "pipeline.workers" })
        ));
    }

    #[test]
    fn test_zero_queue_depth() {
        let mut config = Config::default();
        config.pipeline.queue_depth = 0;

        assert!(matches!(
            validate(&config),
            Err(ValidationError::MustBePositive { field: "pipeline.queue_depth" })
        ));
    }

    #[test]
    fn test_invalid_endpoint_scheme() {
        let mut config = Config::default();
        config.classifier.endpoint = "ftp://models.local".to_string();

        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidEndpoint { service: "classifier", .. })
        ));
    }

    #[test]
    fn test_missing_model() {
        let mut config = Config::default();
        config.detector.model = "  ".to_string();

        assert!(matches!(
            validate(&config),
            Err(ValidationError::MissingModel { service: "detector" })
        ));
    }

    #[test]
    fn test_zero_attempts() {
        let mut config = Config::default();
        config.detector.max_attempts = 0;

        assert!(matches!(
            validate(&config),
            Err(ValidationError::MustBePositive { field: "detector.max_attempts" })
        ));
    }

    #[test]
    fn test_jpeg_quality_range() {
        let mut config = Config::default();
        config.imaging.jpeg_quality = 0;

        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidJpegQuality(0))
        ));
    }

    #[test]
    fn test_webhook_scheme() {
        let mut config = Config::default();
        config.alerts.webhook_url = Some("hooks.example.com/abc".to_string());

        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidWebhookUrl)
        ));
    }
}
