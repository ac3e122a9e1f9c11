//! # Orchestration Types
//!
//! The job data model shared by the registry, the dispatcher and the
//! executor pool.
//!
//! A [`Job`] is immutable apart from its [`JobState`] and its dependency
//! backoff counter. Jobs form single-predecessor chains: each job holds at
//! most one strong reference to the job it depends on.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::Span;
use url::Url;

use super::backoff::DependencyBackoff;
use crate::constants::job_kinds;

/// Process-unique job identifier. `0` is reserved for "no job".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct JobUid(u64);

impl JobUid {
    pub const NONE: JobUid = JobUid(0);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for JobUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobUid {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(JobUid)
    }
}

/// Closed set of job kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    WebDownload,
    Convert,
    RemoveFile,
}

impl JobKind {
    pub fn name(self) -> &'static str {
        match self {
            JobKind::WebDownload => job_kinds::WEB_DOWNLOAD,
            JobKind::Convert => job_kinds::CONVERT,
            JobKind::RemoveFile => job_kinds::REMOVE_FILE,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind-specific, immutable job parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSpec {
    Download { locator: Url, target: PathBuf },
    Transcode { source: PathBuf, target: PathBuf },
    DeleteFile { path: PathBuf },
}

impl JobSpec {
    pub fn kind(&self) -> JobKind {
        match self {
            JobSpec::Download { .. } => JobKind::WebDownload,
            JobSpec::Transcode { .. } => JobKind::Convert,
            JobSpec::DeleteFile { .. } => JobKind::RemoveFile,
        }
    }

    /// Parameters rendered as strings, in declaration order
    pub fn parameters(&self) -> Vec<String> {
        match self {
            JobSpec::Download { locator, target } => {
                vec![locator.to_string(), target.display().to_string()]
            }
            JobSpec::Transcode { source, target } => {
                vec![source.display().to_string(), target.display().to_string()]
            }
            JobSpec::DeleteFile { path } => vec![path.display().to_string()],
        }
    }

    /// Short human-readable description, used as the job's span name field
    pub fn describe(&self) -> String {
        format!("{}({})", self.kind(), self.parameters().join(", "))
    }
}

/// How a job reached `done=true`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum JobOutcome {
    /// The job's action ran on an executor
    Executed { success: bool },
    /// Skipped because its dependency finished unsuccessfully
    DependencyFailed { dependency: JobUid },
    /// Gave up waiting on an unfinished dependency
    DependencyTimedOut { attempts: u32 },
    /// No executor was left to run the job
    NoExecutor,
}

impl JobOutcome {
    pub fn success(self) -> bool {
        matches!(self, JobOutcome::Executed { success: true })
    }

    pub fn name(self) -> &'static str {
        match self {
            JobOutcome::Executed { .. } => "executed",
            JobOutcome::DependencyFailed { .. } => "dependency_failed",
            JobOutcome::DependencyTimedOut { .. } => "dependency_timed_out",
            JobOutcome::NoExecutor => "no_executor",
        }
    }
}

/// Mutable part of a job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobState {
    pub done: bool,
    /// Meaningful only once `done` is true
    pub success: bool,
    pub outcome: Option<JobOutcome>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Dispatch eligibility of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// No dependency, or the dependency succeeded
    Ready,
    /// The dependency has not finished yet
    Blocked,
    /// The dependency finished unsuccessfully
    DependencyFailed(JobUid),
}

/// Invoked with `(title, path)` once a chain's artifact is available
pub type CompletionCallback = Arc<dyn Fn(String, PathBuf) + Send + Sync>;

/// Completion callback bound to the arguments it will receive
pub struct CompletionHook {
    pub title: String,
    pub path: PathBuf,
    pub callback: CompletionCallback,
}

impl CompletionHook {
    pub fn new(title: impl Into<String>, path: impl Into<PathBuf>, callback: CompletionCallback) -> Self {
        Self {
            title: title.into(),
            path: path.into(),
            callback,
        }
    }
}

impl fmt::Debug for CompletionHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionHook")
            .field("title", &self.title)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// A single schedulable unit of work
#[derive(Debug)]
pub struct Job {
    uid: JobUid,
    spec: JobSpec,
    dependency: Option<Arc<Job>>,
    state: RwLock<JobState>,
    backoff: Mutex<DependencyBackoff>,
    on_success: Mutex<Option<CompletionHook>>,
    span: Span,
    created_at: DateTime<Utc>,
}

impl Job {
    pub(crate) fn new(
        uid: JobUid,
        spec: JobSpec,
        dependency: Option<Arc<Job>>,
        backoff: DependencyBackoff,
    ) -> Self {
        let span = tracing::info_span!(
            "webled.work",
            uid = %uid,
            kind = %spec.kind(),
            name = %spec.describe(),
        );
        Self {
            uid,
            spec,
            dependency,
            state: RwLock::new(JobState::default()),
            backoff: Mutex::new(backoff),
            on_success: Mutex::new(None),
            span,
            created_at: Utc::now(),
        }
    }

    pub fn uid(&self) -> JobUid {
        self.uid
    }

    pub fn kind(&self) -> JobKind {
        self.spec.kind()
    }

    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    pub fn dependency(&self) -> Option<&Arc<Job>> {
        self.dependency.as_ref()
    }

    /// UID of the predecessor, [`JobUid::NONE`] for root jobs
    pub fn dependency_uid(&self) -> JobUid {
        self.dependency
            .as_ref()
            .map(|dep| dep.uid)
            .unwrap_or(JobUid::NONE)
    }

    /// Diagnostic context for this job
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Snapshot of the mutable state
    pub fn state(&self) -> JobState {
        self.state.read().clone()
    }

    pub fn is_done(&self) -> bool {
        self.state.read().done
    }

    pub fn readiness(&self) -> Readiness {
        match &self.dependency {
            None => Readiness::Ready,
            Some(dep) => {
                let dep_state = dep.state.read();
                match (dep_state.done, dep_state.success) {
                    (false, _) => Readiness::Blocked,
                    (true, true) => Readiness::Ready,
                    (true, false) => Readiness::DependencyFailed(dep.uid),
                }
            }
        }
    }

    /// Record the terminal state. Returns false if the job was already done,
    /// in which case nothing changes.
    pub(crate) fn finish(&self, outcome: JobOutcome) -> bool {
        let mut state = self.state.write();
        if state.done {
            return false;
        }
        state.done = true;
        state.success = outcome.success();
        state.outcome = Some(outcome);
        state.completed_at = Some(Utc::now());
        true
    }

    /// Delay before the next dependency check, `None` once attempts are exhausted
    pub(crate) fn next_backoff(&self) -> Option<Duration> {
        self.backoff.lock().next_delay()
    }

    pub fn backoff_attempts(&self) -> u32 {
        self.backoff.lock().attempts()
    }

    pub(crate) fn set_completion_hook(&self, hook: CompletionHook) {
        *self.on_success.lock() = Some(hook);
    }

    pub(crate) fn take_completion_hook(&self) -> Option<CompletionHook> {
        self.on_success.lock().take()
    }

    pub fn status(&self) -> JobStatus {
        let state = self.state();
        JobStatus {
            kind: self.kind(),
            uid: self.uid,
            depends_on: self.dependency_uid(),
            done: state.done,
            success: state.success,
            parameters: self.spec.parameters(),
            outcome: state.outcome.map(|o| o.name().to_string()),
            created_at: self.created_at,
            completed_at: state.completed_at,
        }
    }
}

/// Externally visible status record of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub kind: JobKind,
    pub uid: JobUid,
    /// `0` when the job has no dependency
    pub depends_on: JobUid,
    pub done: bool,
    pub success: bool,
    pub parameters: Vec<String>,
    pub outcome: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
