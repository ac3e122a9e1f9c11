//! # Job Registry
//!
//! UID-keyed directory of every job the orchestrator created and has not yet
//! evicted.
//!
//! ## Key Features
//!
//! - **Strictly increasing UIDs** from a shared atomic counter, safe under concurrent callers
//! - **Sharded concurrent map** so status reads never serialize behind writers
//! - **One-shot eviction timers** armed when a job finishes, never a periodic sweep
//!
//! Unknown UIDs are never an error: [`JobRegistry::get`] yields `None` and
//! [`JobRegistry::get_statuses`] silently omits them.
//!
//! ```rust
//! use webled::config::BackoffConfig;
//! use webled::orchestration::{JobRegistry, JobSpec, JobUid};
//!
//! let registry = JobRegistry::new(BackoffConfig::default());
//! let job = registry.create(JobSpec::DeleteFile { path: "/tmp/scratch".into() }, None);
//!
//! assert_eq!(registry.get_statuses(&[job.uid(), JobUid::new(9_999)]).len(), 1);
//! ```

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::backoff::DependencyBackoff;
use super::types::{Job, JobOutcome, JobSpec, JobStatus, JobUid};
use crate::config::BackoffConfig;
use crate::logging::log_job_operation;

#[derive(Debug, Clone)]
pub struct JobRegistry {
    jobs: Arc<DashMap<JobUid, Arc<Job>>>,
    next_uid: Arc<AtomicU64>,
    backoff: BackoffConfig,
}

impl JobRegistry {
    /// Create an empty registry. Jobs it creates back off on dependencies per `backoff`.
    pub fn new(backoff: BackoffConfig) -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
            next_uid: Arc::new(AtomicU64::new(1)),
            backoff,
        }
    }

    /// Allocate a UID, store the job and return it
    pub fn create(&self, spec: JobSpec, dependency: Option<&Arc<Job>>) -> Arc<Job> {
        let uid = JobUid::new(self.next_uid.fetch_add(1, Ordering::Relaxed));
        let job = Arc::new(Job::new(
            uid,
            spec,
            dependency.cloned(),
            DependencyBackoff::new(self.backoff.clone()),
        ));
        self.jobs.insert(uid, job.clone());

        debug!(
            uid = %uid,
            kind = %job.kind(),
            depends_on = %job.dependency_uid(),
            "Job created"
        );
        job
    }

    pub fn get(&self, uid: JobUid) -> Option<Arc<Job>> {
        self.jobs.get(&uid).map(|entry| entry.value().clone())
    }

    /// Status records for the known UIDs, in request order
    pub fn get_statuses(&self, uids: &[JobUid]) -> Vec<JobStatus> {
        uids.iter()
            .filter_map(|uid| self.get(*uid))
            .map(|job| job.status())
            .collect()
    }

    /// Remove `uid` once `after` has elapsed. Not cancellable once armed.
    pub fn schedule_eviction(&self, uid: JobUid, after: Duration) -> JoinHandle<()> {
        let jobs = Arc::downgrade(&self.jobs);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(jobs) = jobs.upgrade() {
                if jobs.remove(&uid).is_some() {
                    debug!(uid = %uid, "Job evicted");
                }
            }
        })
    }

    /// Record a job's terminal state, arm its eviction and fire its
    /// completion hook on success. Returns false if the job was already done.
    pub(crate) fn finish_job(&self, job: &Arc<Job>, outcome: JobOutcome, retention: Duration) -> bool {
        if !job.finish(outcome) {
            return false;
        }
        log_job_operation(
            "finish",
            job.uid(),
            job.kind(),
            if outcome.success() { "succeeded" } else { "failed" },
            Some(outcome.name()),
        );
        self.schedule_eviction(job.uid(), retention);

        if outcome.success() {
            if let Some(hook) = job.take_completion_hook() {
                info!(
                    uid = %job.uid(),
                    title = %hook.title,
                    path = %hook.path.display(),
                    "Artifact available, notifying"
                );
                tokio::spawn(async move {
                    (hook.callback)(hook.title, hook.path);
                });
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::types::CompletionHook;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;

    fn delete(path: &str) -> JobSpec {
        JobSpec::DeleteFile {
            path: PathBuf::from(path),
        }
    }

    #[test]
    fn test_uids_are_strictly_increasing() {
        let registry = JobRegistry::default();
        let uids: Vec<JobUid> = (0..10)
            .map(|i| registry.create(delete(&format!("/tmp/{i}")), None).uid())
            .collect();

        assert!(uids.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(!uids.contains(&JobUid::NONE));
        assert_eq!(registry.len(), 10);
    }

    #[test]
    fn test_concurrent_creates_yield_distinct_uids() {
        let registry = JobRegistry::default();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    (0..250)
                        .map(|_| registry.create(delete("/tmp/x"), None).uid())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut uids: Vec<JobUid> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        uids.sort();
        uids.dedup();
        assert_eq!(uids.len(), 2_000);
    }

    #[test]
    fn test_unknown_uids_are_omitted() {
        let registry = JobRegistry::default();
        let root = registry.create(delete("/a"), None);
        let dependent = registry.create(delete("/b"), Some(&root));

        assert!(registry.get(JobUid::new(424_242)).is_none());
        assert!(registry.get_statuses(&[JobUid::new(424_242)]).is_empty());

        let statuses = registry.get_statuses(&[dependent.uid(), JobUid::new(0), root.uid()]);
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].uid, dependent.uid());
        assert_eq!(statuses[0].depends_on, root.uid());
        assert_eq!(statuses[1].uid, root.uid());
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_after_retention_window() {
        let registry = JobRegistry::default();
        let job = registry.create(delete("/a"), None);
        let uid = job.uid();

        assert!(registry.finish_job(&job, JobOutcome::Executed { success: true }, Duration::from_secs(900)));
        tokio::time::sleep(Duration::from_secs(899)).await;
        assert_eq!(registry.get_statuses(&[uid]).len(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(registry.get_statuses(&[uid]).is_empty());
    }

    #[tokio::test]
    async fn test_finish_job_fires_hook_once_on_success() {
        let registry = JobRegistry::default();
        let job = registry.create(delete("/a"), None);
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let counter = calls.clone();
        job.set_completion_hook(CompletionHook::new(
            "title",
            "/data/out.media",
            Arc::new(move |title, path| {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send((title, path));
            }),
        ));

        let retention = Duration::from_secs(60);
        assert!(registry.finish_job(&job, JobOutcome::Executed { success: true }, retention));
        assert!(!registry.finish_job(&job, JobOutcome::Executed { success: true }, retention));

        let (title, path) = rx.recv().await.unwrap();
        assert_eq!(title, "title");
        assert_eq!(path, PathBuf::from("/data/out.media"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_finish_job_skips_hook_on_failure() {
        let registry = JobRegistry::default();
        let job = registry.create(delete("/a"), None);
        job.set_completion_hook(CompletionHook::new(
            "title",
            "/data/out.media",
            Arc::new(|_, _| panic!("callback must not fire on failure")),
        ));

        registry.finish_job(&job, JobOutcome::Executed { success: false }, Duration::from_secs(60));
        tokio::task::yield_now().await;
        assert!(job.take_completion_hook().is_some());
    }
}
