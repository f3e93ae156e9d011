//! Configuration management for LeafWatch
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use leafwatch::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `LEAFWATCH__<section>__<key>`
//!
//! Examples:
//! - `LEAFWATCH__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `LEAFWATCH__PIPELINE__WORKERS=8`
//! - `LEAFWATCH__DETECTOR__ENDPOINT=http://inference.local:9001`
//!
//! Secrets are read from plain environment variables only and never from the file:
//! `DETECTOR_API_KEY`, `CLASSIFIER_API_KEY` (both default to `ROBOFLOW_API_KEY`)
//! and `ALERT_WEBHOOK_URL`.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/leafwatch.toml`.
//! This can be overridden using the `LEAFWATCH_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    AlertsConfig, ApiLimits, CatalogConfig, Config, ImagingConfig, InferenceServiceConfig,
    LedgerConfig, PipelineConfig, ServerConfig, StorageConfig, StorageProvider,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment + secrets)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, without resolving secrets
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Render the resolved configuration as TOML (secrets are never serialized)
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(
            &config_path,
            r#"
[catalog]
path = "reference/diseases.csv"
        "#,
        )
        .unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(
            config.catalog.path,
            std::path::PathBuf::from("reference/diseases.csv")
        );
    }

    #[test]
    fn test_validation_catches_zero_deadline() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(
            &config_path,
            r#"
[pipeline]
job_deadline_ms = 0
        "#,
        )
        .unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::MustBePositive { .. })
        ));
    }

    #[test]
    fn test_toml_excludes_secrets() {
        let mut config = Config::default();
        config.detector.api_key = Some("super-secret".to_string());
        config.alerts.webhook_url = Some("https://hooks.example.com/secret".to_string());

        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("[pipeline]"));
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("hooks.example.com"));
    }
}
