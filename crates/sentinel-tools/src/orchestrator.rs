//! Tool orchestrator (C4): executes a `tool.call` with timeout, retry and
//! idempotency, producing exactly one terminal outcome per call.

use std::time::Duration;

use serde_json::{json, Value};
use sentinel_types::{now_ms, ToolInvocation};

use crate::idempotency::{cache_key, IdempotencyCache};
use crate::tool::{ToolContext, ToolRegistry};

/// Per-attempt timing and retry policy. Distinct from the provider client's
/// exponential backoff: this is a fixed-step schedule instead.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    pub tool_timeout: Duration,
    /// Retries *after* the first attempt. Total attempts = retries + 1.
    pub tool_retries: u32,
}

impl OrchestratorConfig {
    pub fn new(tool_timeout: Duration, tool_retries: u32) -> Self {
        Self { tool_timeout, tool_retries }
    }
}

fn backoff_for(attempt: u32) -> Duration {
    Duration::from_millis(100u64.saturating_mul((attempt + 1) as u64).min(500))
}

/// Executes tool calls against a shared [`ToolRegistry`] and
/// [`IdempotencyCache`].
pub struct ToolOrchestrator {
    registry: ToolRegistry,
    cache: std::sync::Arc<IdempotencyCache>,
}

impl ToolOrchestrator {
    pub fn new(registry: ToolRegistry, cache: std::sync::Arc<IdempotencyCache>) -> Self {
        Self { registry, cache }
    }

    /// The names of every tool this orchestrator can resolve, for the
    /// controller's system-prompt construction.
    pub fn tool_names(&self) -> Vec<&str> {
        self.registry.names()
    }

    /// Handle one `tool.call`, returning the completed [`ToolInvocation`]
    /// the controller turns into a `tool.result` event.
    ///
    /// `retries_override`, when set, replaces `config.tool_retries` for this
    /// call only — a test-only hook for inducing a one-shot failure or a
    /// guaranteed timeout without touching the process-wide default.
    pub async fn handle_call(
        &self,
        id: &str,
        name: &str,
        args: Option<Value>,
        idempotency_key: Option<&str>,
        session_id: &str,
        config: OrchestratorConfig,
        retries_override: Option<u32>,
    ) -> ToolInvocation {
        let started_at_ms = now_ms();

        let Some(args) = args else {
            return ToolInvocation {
                id: id.to_string(),
                name: name.to_string(),
                args: Value::Null,
                idempotency_key: idempotency_key.map(str::to_string),
                attempts: 0,
                started_at_ms,
                finished_at_ms: Some(now_ms()),
                result: None,
                error: Some("malformed tool call arguments".to_string()),
            };
        };

        let key = cache_key(idempotency_key, name, &args);
        if let Some(cached) = self.cache.get(&key) {
            return ToolInvocation {
                id: id.to_string(),
                name: name.to_string(),
                args,
                idempotency_key: idempotency_key.map(str::to_string),
                attempts: 0,
                started_at_ms,
                finished_at_ms: Some(now_ms()),
                result: Some(cached),
                error: None,
            };
        }

        let Some(tool) = self.registry.get(name) else {
            return ToolInvocation {
                id: id.to_string(),
                name: name.to_string(),
                args,
                idempotency_key: idempotency_key.map(str::to_string),
                attempts: 0,
                started_at_ms,
                finished_at_ms: Some(now_ms()),
                result: None,
                error: Some("Unknown tool".to_string()),
            };
        };

        let retries = retries_override.unwrap_or(config.tool_retries);
        let mut attempts = 0u32;
        let mut last_error = String::new();

        for attempt in 0..=retries {
            attempts = attempt + 1;
            let ctx = ToolContext::new(session_id, id, attempt);
            let outcome = tokio::time::timeout(config.tool_timeout, tool.execute(args.clone(), &ctx)).await;

            match outcome {
                Ok(Ok(result)) => {
                    self.cache.put(key, result.clone());
                    return ToolInvocation {
                        id: id.to_string(),
                        name: name.to_string(),
                        args,
                        idempotency_key: idempotency_key.map(str::to_string),
                        attempts,
                        started_at_ms,
                        finished_at_ms: Some(now_ms()),
                        result: Some(result),
                        error: None,
                    };
                }
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_elapsed) => last_error = "tool timed out".to_string(),
            }

            if attempt < retries {
                tokio::time::sleep(backoff_for(attempt)).await;
            }
        }

        ToolInvocation {
            id: id.to_string(),
            name: name.to_string(),
            args,
            idempotency_key: idempotency_key.map(str::to_string),
            attempts,
            started_at_ms,
            finished_at_ms: Some(now_ms()),
            result: None,
            error: Some(last_error),
        }
    }
}

/// Build the `{id, name, result}` wire payload for a `tool.result` event
/// from a completed invocation, folding an error into `result.error`.
pub fn tool_result_payload(invocation: &ToolInvocation) -> Value {
    let result = match (&invocation.result, &invocation.error) {
        (Some(r), _) => r.clone(),
        (None, Some(e)) => json!({"error": e}),
        (None, None) => json!({"error": "tool produced no result"}),
    };
    json!({
        "id": invocation.id,
        "name": invocation.name,
        "result": result,
    })
}
