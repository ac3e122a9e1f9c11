//! # Library Handlers

use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::library::LibraryEntry;
use crate::orchestration::JobUid;
use crate::web::errors::{ApiError, ApiResult, Envelope};
use crate::web::state::AppState;

#[derive(Debug, Serialize)]
pub struct VideoList {
    pub videos: Vec<LibraryEntry>,
}

#[derive(Debug, Deserialize)]
pub struct AcquireParams {
    pub uri: Option<String>,
}

/// Library contents: GET /api/1/webled/library/get
pub async fn get_videos(State(state): State<AppState>) -> ApiResult<VideoList> {
    let videos = state.librarian.videos().await?;
    Ok(Envelope::ok(VideoList { videos }))
}

/// Fetch and prepare media: GET /api/1/webled/library/acquire?uri=...
///
/// Returns the UIDs to poll, empty when the media is already available.
pub async fn acquire(
    State(state): State<AppState>,
    Query(params): Query<AcquireParams>,
) -> ApiResult<Vec<JobUid>> {
    let uri = params
        .uri
        .filter(|uri| !uri.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing uri parameter."))?;

    info!(uri = %uri, "Acquire requested");
    let uids = state.librarian.acquire(&uri, state.on_ready.clone()).await?;
    Ok(Envelope::ok(uids))
}
