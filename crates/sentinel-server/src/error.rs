//! HTTP-surface error type for the C12 entrypoint: pre-stream validation
//! and startup failures only. Once a session is created every further
//! failure is reported in-band as an `error` SSE event (C6), never as an
//! HTTP error.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("request body too large: {0} bytes (max {1})")]
    PayloadTooLarge(usize, usize),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: String,
    message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServerError::PayloadTooLarge(..) => (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large"),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        let message = self.to_string();
        match status {
            StatusCode::INTERNAL_SERVER_ERROR => tracing::error!(code, %message, "request failed"),
            _ => tracing::warn!(code, %message, "request rejected"),
        }
        (status, Json(ErrorResponse { code: code.to_string(), message })).into_response()
    }
}
