use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "LEAFWATCH_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/leafwatch.toml";
const ENV_PREFIX: &str = "LEAFWATCH";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;
    load_secrets(&mut config, |name| env::var(name).ok());

    Ok(config)
}

/// Secrets only ever come from the environment
pub(crate) fn load_secrets<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let shared_key = lookup("ROBOFLOW_API_KEY");

    config.detector.api_key = lookup("DETECTOR_API_KEY").or_else(|| shared_key.clone());
    config.classifier.api_key = lookup("CLASSIFIER_API_KEY").or(shared_key);
    config.alerts.webhook_url = lookup("ALERT_WEBHOOK_URL").filter(|url| !url.is_empty());
}

/// Load configuration from a specific path and environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // LEAFWATCH__PIPELINE__WORKERS -> pipeline.workers
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
