//! # System Constants
//!
//! Fixed operational boundaries of the work engine. Configuration defaults
//! fall back to these values.

use std::time::Duration;

/// Capacity of the pending job queue. Producers wait when it is full.
pub const PENDING_QUEUE_CAPACITY: usize = 200;

/// Capacity of the idle-registration queue, an upper bound on pool size.
pub const IDLE_QUEUE_CAPACITY: usize = 1024;

/// Default number of executors spawned at startup
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// How long a finished job stays queryable before it is evicted
pub const RETENTION_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Suffix appended by the downloader to in-flight files
pub const DOWNLOAD_TEMPORARY_SUFFIX: &str = "temporary";

/// Prefix of scratch files allocated for acquisitions
pub const SCRATCH_FILE_PREFIX: &str = "ledweb";

/// Wire names for job kinds
pub mod job_kinds {
    pub const WEB_DOWNLOAD: &str = "web_download";
    pub const CONVERT: &str = "convert";
    pub const REMOVE_FILE: &str = "remove_file";
}

/// Defaults for dependency backoff
pub mod backoff {
    pub const INITIAL_DELAY_MS: u64 = 100;
    pub const MAX_DELAY_MS: u64 = 10_000;
    pub const MULTIPLIER: f64 = 2.0;
    pub const JITTER_MAX_PERCENTAGE: f64 = 0.1;
}
