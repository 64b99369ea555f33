//! Stream session controller (C6): owns one request's lifecycle end to
//! end — the provider round loop, tokenizer feed, schema validation, tool
//! orchestration, fallback/repair, and artifact/metric bookkeeping.
//!
//! An iteration-bounded round loop generalized from native `tool_use`
//! blocks to in-band sentinel frames and a multi-component pipeline
//! (tokenizer → validator → orchestrator → emitter) instead of a single
//! agent loop.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use serde_json::{json, Value};
use tokio::time::Instant;

use sentinel_artifacts::ArtifactsSink;
use sentinel_config::Config;
use sentinel_emitter::EventEmitter;
use sentinel_provider::{ChatMessage, CompletionRequest, ProviderClient, ProviderEvent};
use sentinel_schema::{repair_reply, validate_frame, SchemaRegistry};
use sentinel_tokenizer::{SentinelTokenizer, TokenEvent};
use sentinel_tools::{tool_result_payload, OrchestratorConfig, ToolOrchestrator};
use sentinel_types::{
    new_id, FrameKind, SessionMetrics, ValidationCounts, ValidationNote, EVENT_DONE, EVENT_ERROR,
    EVENT_JSON_BEGIN, EVENT_JSON_DELTA, EVENT_JSON_END, EVENT_RESULT_BEGIN, EVENT_RESULT_DELTA,
    EVENT_RESULT_END, EVENT_TOOL_CALL, EVENT_TOOL_RESULT,
};

use crate::error::SessionError;

/// Bound on the provider-round loop.
const MAX_ROUNDS: usize = 5;

/// The process-wide collaborators C6 shares with every other session,
/// plus the per-request config snapshot.
pub struct SessionDeps {
    pub config: Arc<Config>,
    pub provider: Arc<dyn ProviderClient>,
    pub registry: Arc<SchemaRegistry>,
    pub orchestrator: Arc<ToolOrchestrator>,
}

type PendingTool = (String, String, Option<Value>);

/// Owns one request's lifecycle: setup, drive, fallback/repair, finish.
/// Consumed by `run`; intended to be driven from a dedicated spawned task
/// per session, since each HTTP stream session runs as an independent
/// logical task.
pub struct SessionController {
    id: String,
    deps: SessionDeps,
    emitter: EventEmitter,
    artifacts: ArtifactsSink,
}

impl SessionController {
    pub fn new(id: impl Into<String>, deps: SessionDeps, emitter: EventEmitter, artifacts: ArtifactsSink) -> Self {
        Self { id: id.into(), deps, emitter, artifacts }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Run the full session lifecycle to completion. Never panics on a
    /// recoverable failure — fallback, repair and client cancellation are
    /// all handled inline — and always returns the resulting metrics, even
    /// on a fatal or cancelled path.
    pub async fn run(self, prompt: Option<String>, mode: Option<String>, idempotency_key: Option<String>) -> SessionMetrics {
        let start = Instant::now();
        let prompt_text = prompt.unwrap_or_default();
        let mode_text = mode.unwrap_or_default();

        self.write_prompt_artifact(&prompt_text, &mode_text);

        let mut messages =
            vec![ChatMessage::system(self.system_prompt(&mode_text)), ChatMessage::user(prompt_text)];

        let mut tokenizer = SentinelTokenizer::new();
        let mut bodies: HashMap<String, String> = HashMap::new();
        let mut schemas: HashMap<String, String> = HashMap::new();
        let mut validation = ValidationCounts::default();
        let mut result_seen = false;
        let mut last_result_note: Option<ValidationNote> = None;
        let mut final_reply: Option<Value> = None;
        let mut tool_latency_total_ms: u64 = 0;
        let mut tool_calls_made: u64 = 0;

        let mut deadline = Instant::now() + self.deps.config.frame_timeout();

        'rounds: for _round in 0..MAX_ROUNDS {
            if self.emitter.is_closed() {
                return self.finish(start, validation, false, None, None, false).await;
            }

            let request = CompletionRequest::from_config(&self.deps.config, messages.clone());
            let mut stream = match self.deps.provider.stream(request).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(session_id = %self.id, error = %e, "provider request failed");
                    self.emit_error("internal_error", &e.to_string()).await;
                    return self.finish(start, validation, true, None, None, false).await;
                }
            };

            let mut pending_tool: Option<PendingTool> = None;

            'read: loop {
                tokio::select! {
                    biased;
                    _ = tokio::time::sleep_until(deadline) => {
                        self.emit_error("frame_timeout", "no frame activity within FRAME_TIMEOUT_MS").await;
                        return self.finish(start, validation, true, None, None, false).await;
                    }
                    _ = Self::wait_for_disconnect(&self.emitter) => {
                        stream.abort();
                        return self.finish(start, validation, false, None, None, false).await;
                    }
                    next = stream.next() => {
                        match next {
                            Some(Ok(ProviderEvent::TextDelta(text))) => {
                                for ev in tokenizer.feed(&text) {
                                    let is_frame_event = !matches!(ev, TokenEvent::Text { .. });
                                    if let Some(tool) = self
                                        .dispatch_event(
                                            ev,
                                            &mut bodies,
                                            &mut schemas,
                                            &mut validation,
                                            &mut last_result_note,
                                            &mut final_reply,
                                            &mut result_seen,
                                        )
                                        .await
                                    {
                                        pending_tool = Some(tool);
                                    }
                                    if is_frame_event {
                                        deadline = Instant::now() + self.deps.config.frame_timeout();
                                    }
                                }
                                if pending_tool.is_some() {
                                    stream.abort();
                                    break 'read;
                                }
                                if result_seen {
                                    break 'read;
                                }
                            }
                            Some(Ok(ProviderEvent::ToolCallHint(_))) => {}
                            Some(Ok(ProviderEvent::Done)) => break 'read,
                            Some(Ok(ProviderEvent::Error(message))) => {
                                tracing::warn!(session_id = %self.id, message, "provider stream reported an error");
                                break 'read;
                            }
                            Some(Err(e)) => {
                                tracing::error!(session_id = %self.id, error = %e, "provider stream failed");
                                self.emit_error("internal_error", &e.to_string()).await;
                                return self.finish(start, validation, true, None, None, false).await;
                            }
                            None => break 'read,
                        }
                    }
                }
            }

            if result_seen {
                break 'rounds;
            }

            let Some((id, name, args)) = pending_tool else {
                break 'rounds;
            };

            if self.emitter.is_closed() {
                return self.finish(start, validation, false, None, None, false).await;
            }

            let invocation = self
                .deps
                .orchestrator
                .handle_call(
                    &id,
                    &name,
                    args,
                    idempotency_key.as_deref(),
                    &self.id,
                    OrchestratorConfig::new(self.deps.config.tool_timeout(), self.deps.config.tool_retries),
                    None,
                )
                .await;
            tool_calls_made += 1;
            if let Some(finished) = invocation.finished_at_ms {
                tool_latency_total_ms += finished.saturating_sub(invocation.started_at_ms);
            }

            let payload = tool_result_payload(&invocation);
            self.emit(EVENT_TOOL_RESULT, payload.clone()).await;
            deadline = Instant::now() + self.deps.config.frame_timeout();

            messages.push(ChatMessage::assistant(format!(
                "TOOL_RESULT id={} name={}\n{}",
                invocation.id,
                invocation.name,
                serde_json::to_string(&payload["result"]).unwrap_or_else(|_| "null".to_string()),
            )));
        }

        let mut degraded = false;
        if !result_seen {
            degraded = true;
            let reply = json!({
                "answer": "",
                "citations": [],
                "diagnostics": {"error": "provider_no_result", "model": self.deps.config.model_id},
            });
            self.emit_result_frame(&new_id(), "AssistantReply", &reply).await;
            final_reply = Some(reply);
        } else if let Some(note) = last_result_note.take() {
            if !note.ok {
                degraded = true;
                if self.deps.config.repair_retries > 0 {
                    let repaired = repair_reply(note.errors.as_deref().unwrap_or("schema validation failed"));
                    self.emit_result_frame(&new_id(), "AssistantReply", &repaired).await;
                    final_reply = Some(repaired);
                }
            }
        }

        let tool_latency_ms = if tool_calls_made > 0 { Some(tool_latency_total_ms) } else { None };
        self.finish(start, validation, degraded, final_reply, tool_latency_ms, true).await
    }

    /// Dispatch one tokenizer event: emit its wire frame, accumulate and
    /// validate `Object`/`Result` bodies, and surface a pending tool call
    /// to the round loop.
    #[allow(clippy::too_many_arguments)]
    async fn dispatch_event(
        &self,
        ev: TokenEvent,
        bodies: &mut HashMap<String, String>,
        schemas: &mut HashMap<String, String>,
        validation: &mut ValidationCounts,
        last_result_note: &mut Option<ValidationNote>,
        final_reply: &mut Option<Value>,
        result_seen: &mut bool,
    ) -> Option<PendingTool> {
        match ev {
            TokenEvent::Text { .. } => None,
            TokenEvent::JsonBegin { id, schema } => {
                schemas.insert(id.clone(), schema.clone());
                bodies.insert(id.clone(), String::new());
                self.emit(EVENT_JSON_BEGIN, json!({"id": id, "schema": schema})).await;
                None
            }
            TokenEvent::JsonDelta { id, chunk } => {
                if let Some(body) = bodies.get_mut(&id) {
                    body.push_str(&chunk);
                }
                self.emit(EVENT_JSON_DELTA, json!({"id": id, "chunk": chunk})).await;
                None
            }
            TokenEvent::JsonEnd { id, length } => {
                let schema = schemas.remove(&id).unwrap_or_default();
                let body = bodies.remove(&id).unwrap_or_default();
                let (note, _value) = validate_frame(&self.deps.registry, &id, &schema, FrameKind::Object, &body);
                if note.ok {
                    validation.ok_json += 1;
                } else {
                    validation.bad_json += 1;
                }
                self.emit(EVENT_JSON_END, json!({"id": id, "length": length})).await;
                None
            }
            TokenEvent::ToolCall { id, name, args } => {
                self.emit(EVENT_TOOL_CALL, json!({"id": id, "name": name, "args": args})).await;
                Some((id, name, args))
            }
            TokenEvent::ResultBegin { id, schema } => {
                schemas.insert(id.clone(), schema.clone());
                bodies.insert(id.clone(), String::new());
                self.emit(EVENT_RESULT_BEGIN, json!({"id": id, "schema": schema})).await;
                None
            }
            TokenEvent::ResultDelta { id, chunk } => {
                if let Some(body) = bodies.get_mut(&id) {
                    body.push_str(&chunk);
                }
                self.emit(EVENT_RESULT_DELTA, json!({"id": id, "chunk": chunk})).await;
                None
            }
            TokenEvent::ResultEnd { id, length } => {
                let schema = schemas.remove(&id).unwrap_or_default();
                let body = bodies.remove(&id).unwrap_or_default();
                let (note, value) = validate_frame(&self.deps.registry, &id, &schema, FrameKind::Result, &body);
                if note.ok {
                    validation.ok_result += 1;
                    *final_reply = value;
                } else {
                    validation.bad_result += 1;
                }
                *result_seen = true;
                *last_result_note = Some(note);
                self.emit(EVENT_RESULT_END, json!({"id": id, "length": length})).await;
                None
            }
        }
    }

    /// Polls [`EventEmitter::is_closed`] until the SSE receiver is dropped
    /// (client disconnect) or `close` is called, so it can sit as a branch
    /// in the `'read` loop's `select!` alongside the frame-silence timer.
    async fn wait_for_disconnect(emitter: &EventEmitter) {
        const POLL_PERIOD: std::time::Duration = std::time::Duration::from_millis(100);
        loop {
            if emitter.is_closed() {
                return;
            }
            tokio::time::sleep(POLL_PERIOD).await;
        }
    }

    async fn emit(&self, event: &'static str, data: Value) {
        self.emitter.send(event, data.clone()).await;
        if let Err(e) = self.try_append_frame(event, &data) {
            tracing::warn!(session_id = %self.id, error = %e, "failed to append frame artifact");
        }
    }

    async fn emit_error(&self, code: &str, message: &str) {
        tracing::warn!(session_id = %self.id, code, message, "session error");
        self.emit(EVENT_ERROR, json!({"code": code, "message": message})).await;
    }

    async fn emit_result_frame(&self, id: &str, schema: &str, reply: &Value) {
        self.emit(EVENT_RESULT_BEGIN, json!({"id": id, "schema": schema})).await;
        let chunk = serde_json::to_string(reply).unwrap_or_else(|_| "{}".to_string());
        let length = chunk.len();
        self.emit(EVENT_RESULT_DELTA, json!({"id": id, "chunk": chunk})).await;
        self.emit(EVENT_RESULT_END, json!({"id": id, "length": length})).await;
    }

    fn system_prompt(&self, mode: &str) -> String {
        let tools = self.deps.orchestrator.tool_names().join(", ");
        format!(
            "mode={mode} You are the sentinel-framed planning assistant. Emit every structured \
             artifact inside a sentinel frame: \u{27E6}BEGIN_OBJECT id=<id> schema=<name>\u{27E7}...\
             \u{27E6}END_OBJECT id=<id> schema=<name>\u{27E7} for intermediate documents, \
             \u{27E6}BEGIN_TOOL_CALL id=<id> name=<tool>\u{27E7}{{...}}\u{27E6}END_TOOL_CALL id=<id> \
             name=<tool>\u{27E7} to invoke a tool, and \u{27E6}BEGIN_RESULT id=<id> \
             schema=AssistantReply\u{27E7}...\u{27E6}END_RESULT id=<id> schema=AssistantReply\u{27E7} \
             exactly once to finish. Available tools: {tools}."
        )
    }

    fn write_prompt_artifact(&self, prompt: &str, mode: &str) {
        let doc = json!({
            "prompt": prompt,
            "mode": mode,
            "model": self.deps.config.model_id,
            "temperature": self.deps.config.temperature,
            "seed": self.deps.config.seed,
            "max_tokens": self.deps.config.max_tokens,
        });
        if let Err(e) = self.try_write_prompt(&doc) {
            tracing::warn!(session_id = %self.id, error = %e, "failed to write prompt artifact");
        }
    }

    fn try_write_prompt(&self, doc: &Value) -> Result<(), SessionError> {
        self.artifacts.write_prompt(doc)?;
        Ok(())
    }

    fn try_append_frame(&self, event: &str, data: &Value) -> Result<(), SessionError> {
        self.artifacts.append_frame(event, data)?;
        Ok(())
    }

    fn try_write_result(&self, reply: &Value) -> Result<(), SessionError> {
        self.artifacts.write_result(reply)?;
        Ok(())
    }

    fn try_write_metrics(&self, metrics: &SessionMetrics) -> Result<(), SessionError> {
        self.artifacts.write_metrics(metrics)?;
        Ok(())
    }

    /// Emit `done` (unless cancelled or a fatal/timeout path already
    /// short-circuited), write the result and metrics artifacts, and close
    /// the emitter. Always returns the metrics, even on a cancelled or
    /// fatal path, so callers have a uniform return value.
    async fn finish(
        &self,
        start: Instant,
        validation: ValidationCounts,
        degraded: bool,
        final_reply: Option<Value>,
        tool_latency_ms: Option<u64>,
        emit_done: bool,
    ) -> SessionMetrics {
        if emit_done && !self.emitter.is_closed() {
            self.emit(EVENT_DONE, json!({})).await;
        }

        if let Some(reply) = &final_reply {
            if let Err(e) = self.try_write_result(reply) {
                tracing::warn!(session_id = %self.id, error = %e, "failed to write result artifact");
            }
        }

        let metrics = SessionMetrics {
            total_ms: start.elapsed().as_millis() as u64,
            tool_latency_ms,
            model: self.deps.config.model_id.clone(),
            validation,
            degraded,
        };
        if let Err(e) = self.try_write_metrics(&metrics) {
            tracing::warn!(session_id = %self.id, error = %e, "failed to write metrics artifact");
        }

        self.emitter.close().await;
        metrics
    }
}
