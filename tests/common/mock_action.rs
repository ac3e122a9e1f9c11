use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use webled::error::ActionError;
use webled::orchestration::{ActionReport, JobAction, JobKind, JobSpec};

/// Scriptable job action that records what it was asked to run
///
/// Kinds marked failing report failure, kinds marked gated block until
/// [`MockJobAction::release`] is called.
pub struct MockJobAction {
    failing: HashSet<JobKind>,
    gated: HashSet<JobKind>,
    gate: watch::Sender<bool>,
    delay: Duration,
    invocations: Mutex<Vec<JobSpec>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl MockJobAction {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(false);
        Self {
            failing: HashSet::new(),
            gated: HashSet::new(),
            gate,
            delay: Duration::ZERO,
            invocations: Mutex::new(Vec::new()),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        }
    }

    pub fn failing(mut self, kind: JobKind) -> Self {
        self.failing.insert(kind);
        self
    }

    pub fn gated(mut self, kind: JobKind) -> Self {
        self.gated.insert(kind);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Let gated actions proceed
    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    pub fn invocations(&self) -> Vec<JobSpec> {
        self.invocations.lock().clone()
    }

    pub fn invoked_kinds(&self) -> Vec<JobKind> {
        self.invocations.lock().iter().map(JobSpec::kind).collect()
    }

    pub fn invocation_count(&self, kind: JobKind) -> usize {
        self.invocations
            .lock()
            .iter()
            .filter(|spec| spec.kind() == kind)
            .count()
    }

    /// Highest number of actions observed running at once
    pub fn max_concurrency(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobAction for MockJobAction {
    async fn run(&self, spec: &JobSpec) -> Result<ActionReport, ActionError> {
        let kind = spec.kind();
        self.invocations.lock().push(spec.clone());

        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(running, Ordering::SeqCst);

        if self.gated.contains(&kind) {
            let mut gate = self.gate.subscribe();
            let _ = gate.wait_for(|open| *open).await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.running.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&kind) {
            return Err(ActionError::NonZeroExit {
                program: kind.to_string(),
                status: "exit status: 1".to_string(),
                output: "scripted failure".to_string(),
            });
        }
        Ok(ActionReport::new(format!("{kind} ok")))
    }
}
