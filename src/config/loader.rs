//! Configuration Loader
//!
//! Environment-aware loading: defaults, then `finsight.toml`, then
//! `finsight.<environment>.toml`, then `FINSIGHT_*` environment variables.
//! Both files are optional.

use super::error::{ConfigResult, ConfigurationError};
use super::FinsightConfig;
use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub struct ConfigManager {
    config: FinsightConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;
        config.validate()?;

        debug!(
            "Configuration loaded: {}",
            serde_json::to_string(&Self::sanitize_config_for_logging(&config))
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );

        info!(
            environment = %environment,
            storage = ?config.storage.backend,
            workers = config.workers.worker_count,
            queue_capacity = config.queue.capacity,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(config: FinsightConfig, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: Self::default_config_directory(),
        }))
    }

    pub fn config(&self) -> &FinsightConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Configuration as JSON with the database URL masked
    pub fn debug_config(&self) -> serde_json::Value {
        Self::sanitize_config_for_logging(&self.config)
    }

    /// `FINSIGHT_ENV`, defaulting to `development`
    pub fn detect_environment() -> String {
        env::var("FINSIGHT_ENV").unwrap_or_else(|_| "development".to_string())
    }

    /// `FINSIGHT_CONFIG_DIR`, defaulting to `./config`
    pub fn default_config_directory() -> PathBuf {
        env::var("FINSIGHT_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    fn load_and_merge_config(config_dir: &Path, environment: &str) -> ConfigResult<FinsightConfig> {
        let defaults = Config::try_from(&FinsightConfig::default())
            .map_err(|e| ConfigurationError::source_error("defaults", e))?;

        let base_file = config_dir.join("finsight.toml");
        let env_file = config_dir.join(format!("finsight.{environment}.toml"));

        let merged = Config::builder()
            .add_source(defaults)
            .add_source(File::from(base_file.clone()).required(false))
            .add_source(File::from(env_file.clone()).required(false))
            .add_source(
                Environment::with_prefix("FINSIGHT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| {
                ConfigurationError::source_error(
                    format!("{} / {}", base_file.display(), env_file.display()),
                    e,
                )
            })?;

        merged
            .try_deserialize::<FinsightConfig>()
            .map_err(ConfigurationError::deserialize_error)
    }

    fn sanitize_config_for_logging(config: &FinsightConfig) -> serde_json::Value {
        let mut value = serde_json::to_value(config).unwrap_or(serde_json::Value::Null);
        if let Some(url) = value.pointer_mut("/database/url") {
            if !url.is_null() {
                *url = serde_json::Value::String("***REDACTED***".to_string());
            }
        }
        value
    }
}
