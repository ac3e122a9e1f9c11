//! # Executor Pool Workers
//!
//! Each worker alternates between two phases:
//!
//! 1. **Idle**: publish its own inbound slot onto the shared idle-registration
//!    queue, then wait for a job on that slot.
//! 2. **Busy**: run the job's action to completion, record the outcome and go
//!    back to idle.
//!
//! Availability is the presence of a worker's slot in the idle queue; there is
//! no separate idle list. A busy worker is simply not offered to the
//! dispatcher.

use futures::FutureExt;
use parking_lot::RwLock;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, Instrument};

use super::job_action::JobAction;
use super::registry::JobRegistry;
use super::types::{Job, JobOutcome, JobUid};

/// A worker's inbound slot, as published on the idle-registration queue
pub(crate) type JobSlot = mpsc::Sender<Arc<Job>>;

/// Point-in-time view of a worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerSnapshot {
    pub id: usize,
    pub current: Option<JobUid>,
    pub jobs_run: u64,
    pub jobs_failed: u64,
}

/// Counters shared between a running worker and the pool
#[derive(Debug, Default)]
pub(crate) struct WorkerStatus {
    current: RwLock<Option<JobUid>>,
    jobs_run: AtomicU64,
    jobs_failed: AtomicU64,
}

/// Pool-side handle to a spawned worker
#[derive(Debug)]
pub(crate) struct WorkerHandle {
    id: usize,
    status: Arc<WorkerStatus>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub(crate) fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            id: self.id,
            current: *self.status.current.read(),
            jobs_run: self.status.jobs_run.load(Ordering::Relaxed),
            jobs_failed: self.status.jobs_failed.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn take_join_handle(&mut self) -> Option<JoinHandle<()>> {
        self.join.take()
    }
}

pub(crate) struct Worker {
    id: usize,
    slot_tx: JobSlot,
    slot_rx: mpsc::Receiver<Arc<Job>>,
    idle_queue: mpsc::Sender<JobSlot>,
    action: Arc<dyn JobAction>,
    registry: JobRegistry,
    retention: Duration,
    status: Arc<WorkerStatus>,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    /// Start a worker loop and return the pool's handle to it
    pub(crate) fn spawn(
        id: usize,
        idle_queue: mpsc::Sender<JobSlot>,
        action: Arc<dyn JobAction>,
        registry: JobRegistry,
        retention: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> WorkerHandle {
        // One job at a time: the slot is only published while the worker is idle
        let (slot_tx, slot_rx) = mpsc::channel(1);
        let status = Arc::new(WorkerStatus::default());

        let worker = Worker {
            id,
            slot_tx,
            slot_rx,
            idle_queue,
            action,
            registry,
            retention,
            status: status.clone(),
            shutdown,
        };
        let join = tokio::spawn(worker.run());

        WorkerHandle {
            id,
            status,
            join: Some(join),
        }
    }

    async fn run(mut self) {
        info!(worker = self.id, "Worker started");

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            // Idle phase: advertise availability
            tokio::select! {
                published = self.idle_queue.send(self.slot_tx.clone()) => {
                    if published.is_err() {
                        debug!(worker = self.id, "Idle queue closed");
                        break;
                    }
                }
                _ = self.shutdown.changed() => break,
            }

            let job = tokio::select! {
                job = self.slot_rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
                _ = self.shutdown.changed() => break,
            };

            // Busy phase
            self.execute(job).await;
        }

        // A job handed over just before shutdown still runs
        self.slot_rx.close();
        while let Some(job) = self.slot_rx.recv().await {
            self.execute(job).await;
        }

        info!(worker = self.id, "Worker stopped");
    }

    async fn execute(&self, job: Arc<Job>) {
        let span = job.span().clone();
        async {
            *self.status.current.write() = Some(job.uid());
            debug!(worker = self.id, "Hit worker");

            let result = AssertUnwindSafe(self.action.run(job.spec()))
                .catch_unwind()
                .await;

            let success = match result {
                Ok(Ok(report)) => {
                    debug!(output = %report.output, "Done.");
                    true
                }
                Ok(Err(e)) => {
                    error!(worker = self.id, error = %e, "Error running handler");
                    false
                }
                Err(_) => {
                    error!(worker = self.id, "Job action panicked");
                    false
                }
            };

            self.registry
                .finish_job(&job, JobOutcome::Executed { success }, self.retention);

            self.status.jobs_run.fetch_add(1, Ordering::Relaxed);
            if !success {
                self.status.jobs_failed.fetch_add(1, Ordering::Relaxed);
            }
            *self.status.current.write() = None;
        }
        .instrument(span)
        .await
    }
}
