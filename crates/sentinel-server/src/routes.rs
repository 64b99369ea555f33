//! HTTP routes (C12): `POST /v1/stream` opens one sentinel-framed SSE
//! session; `GET /health` reports provider liveness.

use std::convert::Infallible;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use sentinel_artifacts::ArtifactsSink;
use sentinel_emitter::{EmitterStream, EventEmitter};
use sentinel_session::SessionController;
use sentinel_types::new_id;

use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Largest prompt body accepted, guarding against request-body DoS.
const MAX_PROMPT_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct StreamRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    /// Test-only idempotency key, accepted in the body so integration
    /// tests don't need to set headers. A real client should prefer the
    /// `Idempotency-Key` header.
    #[serde(default, rename = "testKey")]
    pub test_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub model: String,
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let ok = state.provider.health_check().await.is_ok();
    Json(HealthResponse { ok, model: state.config.model_id.clone() })
}

/// `POST /v1/stream`: validates the request, opens a session, and hands
/// back an SSE stream the controller drives independently on a spawned
/// task. Once the stream is open, every further failure is reported
/// in-band (C6's `error` event), never as an HTTP status.
pub async fn stream_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: std::result::Result<Json<StreamRequest>, JsonRejection>,
) -> Result<(HeaderMap, Sse<impl futures::Stream<Item = std::result::Result<Event, Infallible>>>)> {
    let Json(request) = request.map_err(|rejection| ServerError::BadRequest(rejection.body_text()))?;

    if let Some(prompt) = &request.prompt {
        if prompt.len() > MAX_PROMPT_BYTES {
            return Err(ServerError::PayloadTooLarge(prompt.len(), MAX_PROMPT_BYTES));
        }
    }

    let idempotency_key = headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or(request.test_key);

    let session_id = new_id();
    let (emitter, stream) = EventEmitter::channel(state.config.max_queued_chunks);
    let artifacts = ArtifactsSink::new(&state.config.artifacts_dir, &session_id)
        .map_err(|e| ServerError::Internal(format!("failed to open artifacts sink: {e}")))?;

    let controller = SessionController::new(session_id.clone(), state.session_deps(), emitter, artifacts);
    tokio::spawn(controller.run(request.prompt, request.mode, idempotency_key));

    tracing::info!(session_id = %session_id, "session opened");

    let mut response_headers = HeaderMap::new();
    response_headers.insert("cache-control", HeaderValue::from_static("no-cache, no-transform"));
    response_headers.insert("connection", HeaderValue::from_static("keep-alive"));
    response_headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response_headers.insert("x-session-id", HeaderValue::from_str(&session_id).unwrap_or_else(|_| HeaderValue::from_static("")));

    Ok((response_headers, Sse::new(into_sse_stream(stream))))
}

/// Adapts [`EmitterStream`]'s infallible `Event` items into the
/// `Result<Event, Infallible>` shape axum's `Sse` wants, without changing
/// what actually goes over the wire.
fn into_sse_stream(stream: EmitterStream) -> impl futures::Stream<Item = std::result::Result<Event, Infallible>> {
    stream.map(Ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_request_defaults_are_all_none() {
        let request: StreamRequest = serde_json::from_str("{}").unwrap();
        assert!(request.prompt.is_none());
        assert!(request.mode.is_none());
        assert!(request.test_key.is_none());
    }

    #[test]
    fn stream_request_parses_test_key() {
        let request: StreamRequest = serde_json::from_str(r#"{"prompt":"hi","testKey":"abc"}"#).unwrap();
        assert_eq!(request.test_key.as_deref(), Some("abc"));
    }

    #[test]
    fn health_response_serializes_expected_shape() {
        let response = HealthResponse { ok: true, model: "gpt-4o-mini".to_string() };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"ok\":true"));
        assert!(json.contains("gpt-4o-mini"));
    }
}
