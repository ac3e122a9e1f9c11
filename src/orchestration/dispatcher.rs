//! # Dispatcher
//!
//! Single control loop pulling jobs off the pending queue. For each job:
//!
//! - **Blocked** on an unfinished dependency: re-submitted to the pending
//!   queue after the job's backoff delay, from a separate task.
//! - **Dependency failed**: finished as failed without ever reaching an executor.
//! - **Ready**: handed to the next idle executor, from a separate task.
//!
//! The loop itself never waits on a dependency or on a saturated pool. Once
//! shutdown is signalled, jobs still queued or waiting out a backoff finish
//! as [`JobOutcome::NoExecutor`] so their chains cascade.
//! Requeued jobs can overtake or fall behind independent jobs, so there is no
//! global FIFO order; within a chain a dependent never starts before its
//! predecessor is done.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};

use super::registry::JobRegistry;
use super::types::{Job, JobOutcome, Readiness};
use super::worker::JobSlot;

/// Idle-registration queue receiver, shared by all handoff tasks
pub(crate) type IdleQueue = Arc<Mutex<mpsc::Receiver<JobSlot>>>;

pub(crate) struct Dispatcher {
    pending_rx: mpsc::Receiver<Arc<Job>>,
    pending_tx: mpsc::Sender<Arc<Job>>,
    idle_queue: IdleQueue,
    registry: JobRegistry,
    retention: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Dispatcher {
    pub(crate) fn new(
        pending_rx: mpsc::Receiver<Arc<Job>>,
        pending_tx: mpsc::Sender<Arc<Job>>,
        idle_queue: IdleQueue,
        registry: JobRegistry,
        retention: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            pending_rx,
            pending_tx,
            idle_queue,
            registry,
            retention,
            shutdown,
        }
    }

    pub(crate) async fn run(mut self) {
        info!("Dispatcher started");

        loop {
            if *self.shutdown.borrow() {
                break;
            }
            tokio::select! {
                job = self.pending_rx.recv() => match job {
                    Some(job) => self.dispatch(job),
                    None => break,
                },
                _ = self.shutdown.changed() => break,
            }
        }

        // Nothing will dispatch what is still queued
        self.pending_rx.close();
        while let Some(job) = self.pending_rx.recv().await {
            self.registry
                .finish_job(&job, JobOutcome::NoExecutor, self.retention);
        }

        info!("Dispatcher stopped");
    }

    fn dispatch(&self, job: Arc<Job>) {
        let span = job.span().clone();
        let _entered = span.enter();

        match job.readiness() {
            Readiness::Blocked => match job.next_backoff() {
                Some(delay) => {
                    debug!(
                        delay_ms = delay.as_millis() as u64,
                        attempt = job.backoff_attempts(),
                        "Blocked on precondition..."
                    );
                    let pending_tx = self.pending_tx.clone();
                    let registry = self.registry.clone();
                    let retention = self.retention;
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        if let Err(mpsc::error::SendError(job)) = pending_tx.send(job).await {
                            debug!(uid = %job.uid(), "Dispatcher gone, dropping requeue");
                            registry.finish_job(&job, JobOutcome::NoExecutor, retention);
                        }
                    });
                }
                None => {
                    let attempts = job.backoff_attempts();
                    warn!(attempts, "Gave up waiting on dependency");
                    self.registry.finish_job(
                        &job,
                        JobOutcome::DependencyTimedOut { attempts },
                        self.retention,
                    );
                }
            },
            Readiness::DependencyFailed(dependency) => {
                info!(dependency = %dependency, "Dependency failed, skipping");
                self.registry.finish_job(
                    &job,
                    JobOutcome::DependencyFailed { dependency },
                    self.retention,
                );
            }
            Readiness::Ready => {
                debug!("Dispatching...");
                tokio::spawn(hand_off(
                    job,
                    self.idle_queue.clone(),
                    self.registry.clone(),
                    self.retention,
                ));
            }
        }
    }
}

/// Wait for an idle executor and give it the job. Slots of executors that
/// stopped in the meantime are skipped.
async fn hand_off(mut job: Arc<Job>, idle_queue: IdleQueue, registry: JobRegistry, retention: Duration) {
    loop {
        let slot = {
            let mut idle = idle_queue.lock().await;
            idle.recv().await
        };

        match slot {
            Some(slot) => match slot.send(job).await {
                Ok(()) => return,
                Err(mpsc::error::SendError(returned)) => {
                    debug!(uid = %returned.uid(), "Executor slot closed, trying next");
                    job = returned;
                }
            },
            None => {
                error!(uid = %job.uid(), "No executors left to run job");
                registry.finish_job(&job, JobOutcome::NoExecutor, retention);
                return;
            }
        }
    }
}
