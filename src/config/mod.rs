//! # Webled Configuration System
//!
//! Typed configuration for the work engine, the action binding, the media
//! library and the HTTP surface.
//!
//! ## Sources
//!
//! Values are layered by [`ConfigManager`], later sources overriding earlier ones:
//!
//! 1. Built-in defaults ([`WebledConfig::default`])
//! 2. `config/webled.toml` (optional)
//! 3. `config/webled.<environment>.toml` (optional)
//! 4. `WEBLED__SECTION__KEY` environment variables
//!
//! ## Usage
//!
//! ```rust,no_run
//! use webled::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let workers = manager.config().scheduler.worker_count;
//! let retention = manager.config().scheduler.retention();
//! # Ok(())
//! # }
//! ```

pub mod loader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants;
use crate::error::ConfigurationError;

pub use loader::ConfigManager;

/// Root configuration structure mirroring webled.toml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct WebledConfig {
    /// Executor pool and queue sizing
    pub scheduler: SchedulerConfig,

    /// Dependency wait backoff
    pub backoff: BackoffConfig,

    /// External programs backing job actions
    pub actions: ActionsConfig,

    /// Media library directories
    pub library: LibraryConfig,

    /// HTTP control surface
    pub web: WebConfig,
}

impl WebledConfig {
    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.scheduler.worker_count == 0 {
            return Err(ConfigurationError::invalid_value(
                "scheduler.worker_count",
                "must be greater than 0",
            ));
        }
        if self.scheduler.worker_count > self.scheduler.idle_queue_capacity {
            return Err(ConfigurationError::invalid_value(
                "scheduler.worker_count",
                format!(
                    "cannot exceed idle_queue_capacity ({})",
                    self.scheduler.idle_queue_capacity
                ),
            ));
        }
        if self.scheduler.pending_queue_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "scheduler.pending_queue_capacity",
                "must be greater than 0",
            ));
        }
        if self.backoff.initial_delay_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "backoff.initial_delay_ms",
                "must be greater than 0",
            ));
        }
        if self.backoff.max_delay_ms < self.backoff.initial_delay_ms {
            return Err(ConfigurationError::invalid_value(
                "backoff.max_delay_ms",
                "must not be smaller than initial_delay_ms",
            ));
        }
        if self.backoff.multiplier < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "backoff.multiplier",
                "must be at least 1.0",
            ));
        }
        if self.backoff.max_attempts == Some(0) {
            return Err(ConfigurationError::invalid_value(
                "backoff.max_attempts",
                "must be greater than 0 when set",
            ));
        }
        Ok(())
    }
}

/// Executor pool and queue sizing
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub worker_count: usize,
    pub pending_queue_capacity: usize,
    pub idle_queue_capacity: usize,
    pub retention_seconds: u64,
}

impl SchedulerConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_seconds)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: constants::DEFAULT_WORKER_COUNT,
            pending_queue_capacity: constants::PENDING_QUEUE_CAPACITY,
            idle_queue_capacity: constants::IDLE_QUEUE_CAPACITY,
            retention_seconds: constants::RETENTION_WINDOW.as_secs(),
        }
    }
}

/// Backoff applied while a job waits on an unfinished dependency
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub jitter: bool,
    /// `None` keeps retrying until the dependency resolves
    pub max_attempts: Option<u32>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: constants::backoff::INITIAL_DELAY_MS,
            max_delay_ms: constants::backoff::MAX_DELAY_MS,
            multiplier: constants::backoff::MULTIPLIER,
            jitter: true,
            max_attempts: None,
        }
    }
}

/// External programs used by [`crate::orchestration::CommandJobAction`]
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ActionsConfig {
    pub downloader: String,
    pub transcoder: String,
    pub transcode_args: Vec<String>,
    /// Directory for scratch files, the system temp dir when unset
    pub scratch_dir: Option<PathBuf>,
}

impl ActionsConfig {
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            downloader: "youtube-dl".to_string(),
            transcoder: "ffmpeg".to_string(),
            transcode_args: [
                "-vf",
                "scale=-2:128,crop=128:128",
                "-c:v",
                "libvpx",
                "-b:v",
                "1M",
                "-c:a",
                "libvorbis",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            scratch_dir: None,
        }
    }
}

/// Media library layout
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub meta_dir: PathBuf,
    pub data_dir: PathBuf,
    pub data_extension: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            meta_dir: PathBuf::from("/var/webled/meta"),
            data_dir: PathBuf::from("/var/webled/data"),
            data_extension: "webm".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebConfig {
    pub bind_address: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8081".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = WebledConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler.worker_count, 4);
        assert_eq!(config.scheduler.retention(), Duration::from_secs(900));
        assert_eq!(config.backoff.max_attempts, None);
        assert_eq!(config.actions.downloader, "youtube-dl");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = WebledConfig::default();
        config.scheduler.worker_count = 0;
        assert!(config.validate().is_err());

        let mut config = WebledConfig::default();
        config.scheduler.worker_count = config.scheduler.idle_queue_capacity + 1;
        assert!(config.validate().is_err());

        let mut config = WebledConfig::default();
        config.backoff.max_delay_ms = config.backoff.initial_delay_ms - 1;
        assert!(config.validate().is_err());

        let mut config = WebledConfig::default();
        config.backoff.multiplier = 0.5;
        assert!(config.validate().is_err());

        let mut config = WebledConfig::default();
        config.backoff.max_attempts = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scratch_dir_falls_back_to_temp_dir() {
        let actions = ActionsConfig::default();
        assert_eq!(actions.scratch_dir(), std::env::temp_dir());
    }
}
