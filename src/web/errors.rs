//! # Web API Error Types
//!
//! Every handler answers with the same envelope. Failures are reported with
//! status 503 and `okay=false`; the `error` field carries the message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::error::{LibraryError, OrchestrationError};

/// Success message sent alongside data
pub const NO_ERROR: &str = "No error.";

/// Response body of every `/api/1` endpoint
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub okay: bool,
    pub error: String,
    pub data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            okay: true,
            error: NO_ERROR.to_string(),
            data: Some(data),
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    BadRequest { message: String },

    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),

    #[error(transparent)]
    Library(#[from] LibraryError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self, "Handler returned error");
        let body: Envelope<()> = Envelope {
            okay: false,
            error: self.to_string(),
            data: None,
        };
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Envelope<T>, ApiError>;
