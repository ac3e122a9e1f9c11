//! # Work Status Handlers

use axum::extract::{Query, State};
use tracing::debug;

use crate::orchestration::{JobStatus, JobUid, WorkerSnapshot};
use crate::web::errors::{ApiResult, Envelope};
use crate::web::state::AppState;

/// Job statuses: GET /api/1/webled/work/get?uid=1&uid=2
///
/// Unparsable uids are skipped and unknown ones omitted, so the result may be
/// shorter than the request.
pub async fn get_statuses(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<Vec<JobStatus>> {
    let uids: Vec<JobUid> = params
        .iter()
        .filter(|(key, _)| key == "uid")
        .filter_map(|(_, value)| match value.parse::<JobUid>() {
            Ok(uid) => Some(uid),
            Err(_) => {
                debug!(uid = %value, "Skipping unparsable uid");
                None
            }
        })
        .collect();

    Ok(Envelope::ok(state.overlord.get_statuses(&uids)))
}

/// Executor pool: GET /api/1/webled/work/workers
pub async fn list_workers(State(state): State<AppState>) -> ApiResult<Vec<WorkerSnapshot>> {
    Ok(Envelope::ok(state.overlord.workers()))
}
