#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Webled
//!
//! Core of a small media appliance: fetches remote media, transcodes it for
//! the display and keeps a local library of what it acquired.
//!
//! ## Overview
//!
//! Work is broken into jobs (download, transcode, delete a scratch file) that
//! form dependency chains. A fixed pool of executors runs them; a dispatcher
//! makes sure a job never starts before its predecessor succeeded and fails
//! the rest of a chain as soon as one link fails. Callers submit a request,
//! get job UIDs back immediately and poll for status.
//!
//! ## Module Organization
//!
//! - [`orchestration`] - Job model, registry, executor pool, dispatcher and the [`Overlord`] facade
//! - [`library`] - Catalog of acquired media
//! - [`web`] - HTTP/JSON control surface
//! - [`config`] - Layered configuration
//! - [`logging`] - Structured logging setup
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use webled::config::WebledConfig;
//! use webled::orchestration::{CommandJobAction, Overlord};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WebledConfig::default();
//! let overlord = Overlord::start(&config, Arc::new(CommandJobAction::new(config.actions.clone())))?;
//!
//! let (download, convert) = overlord
//!     .submit_acquire_and_prepare("https://example.com/watch?v=1", "/var/webled/data/1.webm")
//!     .await?;
//!
//! for status in overlord.get_statuses(&[download, convert]) {
//!     println!("{} {}: done={} success={}", status.kind, status.uid, status.done, status.success);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod library;
pub mod logging;
pub mod orchestration;
pub mod web;

pub use config::{ConfigManager, WebledConfig};
pub use error::{Result, WebledError};
pub use library::{Librarian, LibraryEntry};
pub use orchestration::{JobSpec, JobStatus, JobUid, Overlord};
