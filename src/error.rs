//! # Error Types
//!
//! One error enum per concern, gathered under [`WebledError`] for callers that
//! cross module boundaries.
//!
//! Job execution failures never reach the submission path: an [`ActionError`]
//! is recorded on the job as `success=false` and is only observable through
//! status polling.

use std::path::PathBuf;

/// Errors returned synchronously by the orchestrator facade at submission time
#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error("Invalid source locator '{locator}': {reason}")]
    InvalidLocator { locator: String, reason: String },

    #[error("Could not allocate scratch file: {reason}")]
    TemporaryResource { reason: String },

    #[error("Pending queue is closed, the dispatcher is not running")]
    QueueClosed,

    #[error("Executor pool is full ({max_workers} workers)")]
    PoolFull { max_workers: usize },

    #[error("Orchestrator has been shut down")]
    ShutDown,

    #[error("Refusing to start: {0}")]
    InvalidConfiguration(#[from] ConfigurationError),
}

/// Errors produced while running a job action
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}")]
    NonZeroExit {
        program: String,
        status: String,
        output: String,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the media library
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("Invalid URI ({locator}: {reason})")]
    Probe { locator: String, reason: String },

    #[error("Library I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed media metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("No such file: {id}")]
    NotFound { id: String },

    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),
}

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigurationError {
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Crate-wide error type
#[derive(Debug, thiserror::Error)]
pub enum WebledError {
    #[error("Orchestration error: {0}")]
    Orchestration(#[from] OrchestrationError),

    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

pub type Result<T> = std::result::Result<T, WebledError>;
