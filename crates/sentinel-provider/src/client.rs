//! `ProviderClient` trait (C9) and its concrete OpenAI-compatible
//! implementation over `reqwest` SSE streaming.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, stream};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{ProviderError, Result};
use crate::types::{ChatMessage, CompletionRequest, ProviderEvent, Role, ToolCallHint};

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for [`OpenAiProviderClient`]: base URL, credentials, and
/// the connection-level retry policy (distinct from C4's fixed-step tool
/// retry — this one backs off exponentially, matching the provider-client
/// idiom it is grounded on).
#[derive(Debug, Clone)]
pub struct OpenAiProviderClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl OpenAiProviderClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: 2,
            retry_backoff: Duration::from_millis(250),
        }
    }
}

impl From<&sentinel_config::Config> for OpenAiProviderClientConfig {
    fn from(config: &sentinel_config::Config) -> Self {
        Self::new(config.provider_base_url.clone(), config.provider_api_key.clone())
    }
}

/// Stream of provider events, cancellable by dropping or calling
/// [`ProviderStream::abort`]. Aborting causes the underlying HTTP body
/// stream to be dropped on the next poll, ending the stream with no
/// further items — the controller uses this to end a round early once a
/// `tool.call` fires (no further provider text is wanted once the
/// tokenizer has captured a tool invocation).
pub struct ProviderStream {
    inner: Pin<Box<dyn Stream<Item = Result<ProviderEvent>> + Send>>,
    cancel: CancellationToken,
}

impl ProviderStream {
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    /// Build a `ProviderStream` from an already-assembled event stream and
    /// its cancellation token. Used by [`crate::mock::MockProviderClient`]
    /// to satisfy the same cancellable-stream contract real backends do,
    /// without reimplementing `abort()` semantics per fake.
    pub fn from_parts(
        inner: Pin<Box<dyn Stream<Item = Result<ProviderEvent>> + Send>>,
        cancel: CancellationToken,
    ) -> Self {
        Self { inner, cancel }
    }
}

impl Stream for ProviderStream {
    type Item = Result<ProviderEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// The out-of-scope "language-model provider client" contract this crate
/// implements concretely: stream textual deltas with cancellation support,
/// plus a liveness probe for `GET /health`.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn stream(&self, request: CompletionRequest) -> Result<ProviderStream>;
    async fn health_check(&self) -> Result<()>;
}

/// Concrete streaming client against an OpenAI-compatible
/// `/chat/completions` endpoint (OpenAI itself, Groq, a local Ollama
/// OpenAI-compat shim, ...).
pub struct OpenAiProviderClient {
    http: Client,
    config: OpenAiProviderClientConfig,
}

impl OpenAiProviderClient {
    pub fn new(config: OpenAiProviderClientConfig) -> Self {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { http, config }
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn build_request(&self, request: &CompletionRequest) -> OpenAiChatRequest {
        OpenAiChatRequest {
            model: request.model.clone(),
            messages: request.messages.iter().map(OpenAiMessage::from).collect(),
            temperature: request.temperature,
            seed: request.seed,
            max_tokens: request.max_tokens,
            stream: true,
        }
    }

    async fn send_with_retry(&self, body: &OpenAiChatRequest) -> Result<reqwest::Response> {
        let mut attempt = 0u32;
        loop {
            let mut builder = self.http.post(self.chat_completions_url()).json(body);
            if let Some(key) = &self.config.api_key {
                builder = builder.bearer_auth(key);
            }
            match builder.send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let body = resp.text().await.unwrap_or_default();
                    let err = ProviderError::Status { status, body };
                    if !err.is_retryable() || attempt >= self.config.max_retries {
                        return Err(err);
                    }
                    tracing::warn!(attempt, status, "provider request failed, retrying");
                }
                Err(e) => {
                    let err = ProviderError::from(e);
                    if !err.is_retryable() || attempt >= self.config.max_retries {
                        return Err(err);
                    }
                    tracing::warn!(attempt, error = %err, "provider request failed, retrying");
                }
            }
            tokio::time::sleep(self.config.retry_backoff * 2u32.saturating_pow(attempt)).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl ProviderClient for OpenAiProviderClient {
    async fn stream(&self, request: CompletionRequest) -> Result<ProviderStream> {
        let body = self.build_request(&request);
        let response = self.send_with_retry(&body).await?;
        let byte_stream = response.bytes_stream();
        let cancel = CancellationToken::new();

        let state = SseState {
            byte_stream: Box::pin(byte_stream),
            buffer: String::new(),
            done: false,
            cancel: cancel.clone(),
        };
        let events = stream::unfold(state, next_event);
        Ok(ProviderStream { inner: Box::pin(events.map(Ok)), cancel })
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/models", self.config.base_url.trim_end_matches('/'));
        let mut builder = self.http.get(url);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::HealthCheck(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::HealthCheck(format!("status {}", response.status())))
        }
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send>>;

struct SseState {
    byte_stream: ByteStream,
    buffer: String,
    done: bool,
    cancel: CancellationToken,
}

/// Pull the next `ProviderEvent` out of a line-buffered OpenAI-compatible
/// SSE body, awaiting more bytes as needed. Cancellation-aware: if aborted
/// mid-wait, ends the stream and drops `byte_stream` without reading
/// further.
async fn next_event(mut state: SseState) -> Option<(ProviderEvent, SseState)> {
    loop {
        if state.done {
            return None;
        }
        if state.cancel.is_cancelled() {
            return Some((ProviderEvent::Done, finish(state)));
        }

        if let Some(line_end) = state.buffer.find('\n') {
            let line = state.buffer[..line_end].trim_end_matches('\r').to_string();
            state.buffer.drain(..=line_end);
            if let Some(event) = parse_sse_line(&line) {
                if matches!(event, ProviderEvent::Done | ProviderEvent::Error(_)) {
                    state.done = true;
                }
                return Some((event, state));
            }
            continue;
        }

        tokio::select! {
            biased;
            _ = state.cancel.cancelled() => {
                return Some((ProviderEvent::Done, finish(state)));
            }
            next = state.byte_stream.next() => {
                match next {
                    Some(Ok(bytes)) => {
                        state.buffer.push_str(&String::from_utf8_lossy(&bytes));
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((ProviderEvent::Error(e.to_string()), state));
                    }
                    None => {
                        state.done = true;
                        return Some((ProviderEvent::Done, state));
                    }
                }
            }
        }
    }
}

fn finish(mut state: SseState) -> SseState {
    state.done = true;
    state
}

/// Parse one SSE line into a `ProviderEvent`, or `None` for lines carrying
/// no event (blank keep-alive lines, non-`data:` framing).
fn parse_sse_line(line: &str) -> Option<ProviderEvent> {
    let payload = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:"))?;
    let payload = payload.trim();
    if payload.is_empty() {
        return None;
    }
    if payload == "[DONE]" {
        return Some(ProviderEvent::Done);
    }
    match serde_json::from_str::<OpenAiStreamChunk>(payload) {
        Ok(chunk) => {
            let choice = chunk.choices.into_iter().next()?;
            if let Some(tool_call) = choice.delta.tool_calls.and_then(|calls| calls.into_iter().next()) {
                return Some(ProviderEvent::ToolCallHint(ToolCallHint {
                    id: tool_call.id.unwrap_or_default(),
                    name: tool_call.function.as_ref().and_then(|f| f.name.clone()).unwrap_or_default(),
                    arguments: tool_call
                        .function
                        .as_ref()
                        .and_then(|f| f.arguments.clone())
                        .unwrap_or_default(),
                }));
            }
            if let Some(content) = choice.delta.content {
                if !content.is_empty() {
                    return Some(ProviderEvent::TextDelta(content));
                }
            }
            if choice.finish_reason.is_some() {
                return Some(ProviderEvent::Done);
            }
            None
        }
        Err(e) => Some(ProviderEvent::Error(format!("malformed provider chunk: {e}"))),
    }
}

#[derive(Debug, Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f64,
    seed: u64,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: &'static str,
    content: String,
}

impl From<&ChatMessage> for OpenAiMessage {
    fn from(message: &ChatMessage) -> Self {
        let role = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        Self { role, content: message.content.clone() }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiStreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct OpenAiStreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiStreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamToolCall {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<OpenAiStreamFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamFunctionCall {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sse_line_ignores_keep_alive() {
        assert!(parse_sse_line("").is_none());
        assert!(parse_sse_line(": keep-alive").is_none());
    }

    #[test]
    fn parse_sse_line_recognizes_done_sentinel() {
        assert!(matches!(parse_sse_line("data: [DONE]"), Some(ProviderEvent::Done)));
    }

    #[test]
    fn parse_sse_line_extracts_text_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"hi"}}]}"#;
        match parse_sse_line(line) {
            Some(ProviderEvent::TextDelta(text)) => assert_eq!(text, "hi"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parse_sse_line_extracts_tool_call_hint() {
        let line = r#"data: {"choices":[{"delta":{"tool_calls":[{"id":"c1","function":{"name":"f","arguments":"{}"}}]}}]}"#;
        match parse_sse_line(line) {
            Some(ProviderEvent::ToolCallHint(hint)) => {
                assert_eq!(hint.id, "c1");
                assert_eq!(hint.name, "f");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parse_sse_line_reports_finish_reason_as_done() {
        let line = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert!(matches!(parse_sse_line(line), Some(ProviderEvent::Done)));
    }

    #[test]
    fn parse_sse_line_reports_malformed_json_as_error() {
        match parse_sse_line("data: {not json") {
            Some(ProviderEvent::Error(_)) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }
}
