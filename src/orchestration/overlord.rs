//! # Overlord
//!
//! Orchestrator facade. Owns the registry, the executor pool and the
//! dispatcher, and decomposes high-level requests into job chains.
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
//! let statuses = overlord.get_statuses(&[download, convert]);
//! # Ok(())
//! # }
//! ```

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::dispatcher::{Dispatcher, IdleQueue};
use super::job_action::JobAction;
use super::registry::JobRegistry;
use super::types::{
    CompletionCallback, CompletionHook, Job, JobOutcome, JobSpec, JobStatus, JobUid,
};
use super::worker::{JobSlot, Worker, WorkerHandle, WorkerSnapshot};
use crate::config::WebledConfig;
use crate::constants::SCRATCH_FILE_PREFIX;
use crate::error::OrchestrationError;
use crate::logging::log_job_operation;

/// Request to fetch remote media and prepare it at `destination`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireRequest {
    pub locator: String,
    pub destination: PathBuf,
    /// Passed to the completion callback, defaults to the locator
    pub title: Option<String>,
}

impl AcquireRequest {
    pub fn new(locator: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            locator: locator.into(),
            destination: destination.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

pub struct Overlord {
    registry: JobRegistry,
    action: Arc<dyn JobAction>,
    retention: Duration,
    scratch_dir: PathBuf,
    max_workers: usize,
    pending_tx: mpsc::Sender<Arc<Job>>,
    pending_rx: Mutex<Option<mpsc::Receiver<Arc<Job>>>>,
    /// Taken on shutdown so the idle queue closes once the last worker exits
    idle_tx: Mutex<Option<mpsc::Sender<JobSlot>>>,
    idle_queue: IdleQueue,
    workers: RwLock<Vec<WorkerHandle>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Overlord {
    /// Build an idle orchestrator: no workers, dispatcher not started
    pub(crate) fn new(config: &WebledConfig, action: Arc<dyn JobAction>) -> Self {
        let scheduler = &config.scheduler;
        let (pending_tx, pending_rx) = mpsc::channel(scheduler.pending_queue_capacity.max(1));
        let (idle_tx, idle_rx) = mpsc::channel(scheduler.idle_queue_capacity.max(1));
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            registry: JobRegistry::new(config.backoff.clone()),
            action,
            retention: scheduler.retention(),
            scratch_dir: config.actions.scratch_dir(),
            max_workers: scheduler.idle_queue_capacity.max(1),
            pending_tx,
            pending_rx: Mutex::new(Some(pending_rx)),
            idle_tx: Mutex::new(Some(idle_tx)),
            idle_queue: Arc::new(tokio::sync::Mutex::new(idle_rx)),
            workers: RwLock::new(Vec::new()),
            dispatcher: Mutex::new(None),
            shutdown_tx,
        }
    }

    /// Validate `config`, spawn `scheduler.worker_count` workers and start
    /// dispatching
    pub fn start(config: &WebledConfig, action: Arc<dyn JobAction>) -> Result<Self, OrchestrationError> {
        config.validate()?;
        let overlord = Self::new(config, action);
        for _ in 0..config.scheduler.worker_count {
            overlord.spawn_worker()?;
        }
        overlord.start_dispatching();
        Ok(overlord)
    }

    /// Add one executor to the pool and return its id
    pub(crate) fn spawn_worker(&self) -> Result<usize, OrchestrationError> {
        let Some(idle_tx) = self.idle_tx.lock().clone() else {
            return Err(OrchestrationError::ShutDown);
        };
        let mut workers = self.workers.write();
        if workers.len() >= self.max_workers {
            return Err(OrchestrationError::PoolFull {
                max_workers: self.max_workers,
            });
        }

        let id = workers.len();
        workers.push(Worker::spawn(
            id,
            idle_tx,
            self.action.clone(),
            self.registry.clone(),
            self.retention,
            self.shutdown_tx.subscribe(),
        ));
        debug!(worker = id, "Worker spawned");
        Ok(id)
    }

    /// Start the dispatch loop. Returns false if it was already started.
    pub(crate) fn start_dispatching(&self) -> bool {
        let Some(pending_rx) = self.pending_rx.lock().take() else {
            warn!("Dispatcher already started");
            return false;
        };

        let dispatcher = Dispatcher::new(
            pending_rx,
            self.pending_tx.clone(),
            self.idle_queue.clone(),
            self.registry.clone(),
            self.retention,
            self.shutdown_tx.subscribe(),
        );
        *self.dispatcher.lock() = Some(tokio::spawn(dispatcher.run()));
        info!(workers = self.workers.read().len(), "Dispatching started");
        true
    }

    /// Download → Transcode → DeleteFile chain. Returns the download and
    /// transcode UIDs; the cleanup job is not tracked by callers.
    pub async fn submit_acquire_and_prepare(
        &self,
        locator: &str,
        destination: impl Into<PathBuf>,
    ) -> Result<(JobUid, JobUid), OrchestrationError> {
        self.submit_acquisition(AcquireRequest::new(locator, destination), None)
            .await
    }

    /// Like [`Overlord::submit_acquire_and_prepare`], invoking `on_ready`
    /// with `(title, destination)` once the transcode succeeded
    pub async fn submit_acquisition(
        &self,
        request: AcquireRequest,
        on_ready: Option<CompletionCallback>,
    ) -> Result<(JobUid, JobUid), OrchestrationError> {
        let locator = Url::parse(&request.locator).map_err(|e| OrchestrationError::InvalidLocator {
            locator: request.locator.clone(),
            reason: e.to_string(),
        })?;
        let scratch = self.allocate_scratch_file()?;

        let download = self.registry.create(
            JobSpec::Download {
                locator,
                target: scratch.clone(),
            },
            None,
        );
        let convert = self.registry.create(
            JobSpec::Transcode {
                source: scratch.clone(),
                target: request.destination.clone(),
            },
            Some(&download),
        );
        let cleanup = self.registry.create(
            JobSpec::DeleteFile {
                path: scratch.clone(),
            },
            Some(&convert),
        );

        if let Some(callback) = on_ready {
            let title = request.title.clone().unwrap_or_else(|| request.locator.clone());
            convert.set_completion_hook(CompletionHook::new(
                title,
                request.destination.clone(),
                callback,
            ));
        }

        if let Err(e) = self
            .enqueue_chain(vec![download.clone(), convert.clone(), cleanup])
            .await
        {
            // The cleanup job will never run
            if let Err(remove) = tokio::fs::remove_file(&scratch).await {
                warn!(path = %scratch.display(), error = %remove, "Could not remove scratch file");
            }
            return Err(e);
        }

        info!(
            locator = %request.locator,
            destination = %request.destination.display(),
            download = %download.uid(),
            convert = %convert.uid(),
            "Acquisition submitted"
        );
        Ok((download.uid(), convert.uid()))
    }

    /// Create and enqueue a single job
    pub async fn submit(
        &self,
        spec: JobSpec,
        dependency: Option<&Arc<Job>>,
    ) -> Result<Arc<Job>, OrchestrationError> {
        let job = self.registry.create(spec, dependency);
        self.enqueue_chain(vec![job.clone()]).await?;
        Ok(job)
    }

    /// Enqueue jobs in order. On failure the jobs not yet enqueued are
    /// finished as failed so nothing waits on them forever.
    async fn enqueue_chain(&self, jobs: Vec<Arc<Job>>) -> Result<(), OrchestrationError> {
        let mut remaining = jobs.into_iter();
        while let Some(job) = remaining.next() {
            log_job_operation("enqueue", job.uid(), job.kind(), "pending", None);
            if let Err(mpsc::error::SendError(job)) = self.pending_tx.send(job).await {
                for stranded in std::iter::once(job).chain(remaining) {
                    self.registry
                        .finish_job(&stranded, JobOutcome::NoExecutor, self.retention);
                }
                return Err(OrchestrationError::QueueClosed);
            }
        }
        Ok(())
    }

    fn allocate_scratch_file(&self) -> Result<PathBuf, OrchestrationError> {
        let file = tempfile::Builder::new()
            .prefix(SCRATCH_FILE_PREFIX)
            .tempfile_in(&self.scratch_dir)
            .map_err(|e| OrchestrationError::TemporaryResource {
                reason: format!("{}: {e}", self.scratch_dir.display()),
            })?;
        let (_file, path) = file.keep().map_err(|e| OrchestrationError::TemporaryResource {
            reason: e.to_string(),
        })?;
        Ok(path)
    }

    pub fn get_statuses(&self, uids: &[JobUid]) -> Vec<JobStatus> {
        self.registry.get_statuses(uids)
    }

    pub fn job(&self, uid: JobUid) -> Option<Arc<Job>> {
        self.registry.get(uid)
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn workers(&self) -> Vec<WorkerSnapshot> {
        self.workers
            .read()
            .iter()
            .map(WorkerHandle::snapshot)
            .collect()
    }

    /// Stop the dispatcher and every worker. Workers finish the job they are
    /// running first. Jobs that never reached an executor finish as
    /// [`JobOutcome::NoExecutor`].
    pub async fn shutdown(&self) {
        info!("Shutting down orchestrator");
        self.shutdown_tx.send_replace(true);
        drop(self.idle_tx.lock().take());

        let mut handles: Vec<JoinHandle<()>> = self
            .workers
            .write()
            .iter_mut()
            .filter_map(WorkerHandle::take_join_handle)
            .collect();
        if let Some(dispatcher) = self.dispatcher.lock().take() {
            handles.push(dispatcher);
        }

        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!(error = %e, "Task ended abnormally during shutdown");
            }
        }
        info!("Orchestrator stopped");
    }
}
