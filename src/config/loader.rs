//! Configuration Loader
//!
//! Environment-aware configuration loading. Handles file discovery,
//! environment detection and layering of defaults, files and environment
//! variables.

use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::WebledConfig;
use crate::error::ConfigurationError;

/// Base name of configuration files inside the config directory
const CONFIG_FILE_STEM: &str = "webled";

/// Loaded, validated configuration together with where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: WebledConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> Result<Arc<ConfigManager>, ConfigurationError> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(
        config_dir: Option<PathBuf>,
    ) -> Result<Arc<ConfigManager>, ConfigurationError> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> Result<Arc<ConfigManager>, ConfigurationError> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;
        config.validate()?;

        debug!(
            "Configuration loaded: {}",
            serde_json::to_string(&config).unwrap_or_else(|_| "[serialization error]".to_string())
        );
        info!(
            environment = environment,
            workers = config.scheduler.worker_count,
            retention_seconds = config.scheduler.retention_seconds,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(
        config: WebledConfig,
        environment: &str,
    ) -> Result<Arc<ConfigManager>, ConfigurationError> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: PathBuf::from("config"),
        }))
    }

    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
    ) -> Result<WebledConfig, ConfigurationError> {
        let base_file = config_directory.join(format!("{CONFIG_FILE_STEM}.toml"));
        let env_file = config_directory.join(format!("{CONFIG_FILE_STEM}.{environment}.toml"));

        let merged = Config::builder()
            .add_source(Config::try_from(&WebledConfig::default())?)
            .add_source(File::from(base_file).required(false))
            .add_source(File::from(env_file).required(false))
            .add_source(
                Environment::with_prefix("WEBLED")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(merged.try_deserialize()?)
    }

    /// Detect the current environment from environment variables
    pub fn detect_environment() -> String {
        env::var("WEBLED_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &WebledConfig {
        &self.config
    }

    /// Get the current environment
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Directory configuration files were looked up in
    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }
}
