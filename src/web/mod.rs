//! # Web API
//!
//! HTTP/JSON control surface. API routes live under `/api/1/webled` and answer
//! with an [`errors::Envelope`]; `/health` sits at the root.

pub mod errors;
pub mod handlers;
pub mod state;

use axum::routing::get;
use axum::Router;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub use errors::{ApiError, ApiResult, Envelope};
pub use state::AppState;

/// Build the application router with request tracing
pub fn create_app(state: AppState) -> Router {
    let api = Router::new()
        .route("/work/get", get(handlers::work::get_statuses))
        .route("/work/workers", get(handlers::work::list_workers))
        .route("/library/get", get(handlers::library::get_videos))
        .route("/library/acquire", get(handlers::library::acquire));

    Router::new()
        .route("/health", get(handlers::health::basic_health))
        .nest("/api/1/webled", api)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
