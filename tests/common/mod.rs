#![allow(dead_code)]

pub mod mock_action;
pub mod strategies;

pub use mock_action::*;

use std::path::Path;
use std::time::Duration;
use webled::config::WebledConfig;
use webled::orchestration::{JobStatus, JobUid, Overlord};

/// Configuration with short backoff delays and scratch files under `scratch`
pub fn fast_config(scratch: &Path, workers: usize) -> WebledConfig {
    let mut config = WebledConfig::default();
    config.scheduler.worker_count = workers;
    config.backoff.initial_delay_ms = 5;
    config.backoff.max_delay_ms = 25;
    config.backoff.jitter = false;
    config.actions.scratch_dir = Some(scratch.to_path_buf());
    config
}

/// Poll until `condition` holds, panicking after five seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached within 5s");
}

/// Wait for every UID to report `done=true` and return their statuses
pub async fn wait_for_done(overlord: &Overlord, uids: &[JobUid]) -> Vec<JobStatus> {
    wait_until(|| {
        let statuses = overlord.get_statuses(uids);
        statuses.len() == uids.len() && statuses.iter().all(|status| status.done)
    })
    .await;
    overlord.get_statuses(uids)
}
