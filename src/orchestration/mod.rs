//! # Orchestration Engine
//!
//! Dependency-aware job scheduling for the appliance's media pipeline.
//!
//! ## Core Components
//!
//! - **Overlord**: facade that decomposes requests into job chains and answers status queries
//! - **JobRegistry**: UID-keyed job directory with timed eviction of finished jobs
//! - **Dispatcher**: routes pending jobs to idle executors, backs off on unfinished dependencies
//! - **Worker**: fixed-size executor pool; workers self-register on an idle queue
//! - **JobAction**: the external effect of a job, behind a trait
//!
//! Jobs form chains through a single optional predecessor. A job is only
//! handed to an executor once its predecessor finished successfully; if the
//! predecessor failed, the job fails without running and the failure
//! propagates down the chain.

pub mod backoff;
mod dispatcher;
pub mod job_action;
pub mod overlord;
pub mod registry;
pub mod types;
pub mod worker;

pub use backoff::DependencyBackoff;
pub use job_action::{ActionReport, CommandJobAction, JobAction};
pub use overlord::{AcquireRequest, Overlord};
pub use registry::JobRegistry;
pub use types::{
    CompletionCallback, CompletionHook, Job, JobKind, JobOutcome, JobSpec, JobState, JobStatus,
    JobUid, Readiness,
};
pub use worker::WorkerSnapshot;
