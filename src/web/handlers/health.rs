//! # Health Check Handlers

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
}

/// Basic health check endpoint: GET /health
///
/// Answers as long as the process is serving requests.
pub async fn basic_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
