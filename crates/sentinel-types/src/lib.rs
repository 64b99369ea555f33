//! Shared data model for the sentinel streaming gateway.
//!
//! Every other crate in the workspace depends on these types rather than
//! redefining frame, validation, or metrics shapes locally.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The three frame kinds a sentinel can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    Object,
    Tool,
    Result,
}

impl FrameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameKind::Object => "object",
            FrameKind::Tool => "tool",
            FrameKind::Result => "result",
        }
    }
}

/// State tracked for one currently-open frame.
///
/// Created on a `BEGIN_*` sentinel, mutated by body bytes, destroyed on the
/// matching `END_*` sentinel.
#[derive(Debug, Clone)]
pub struct FrameState {
    pub kind: FrameKind,
    pub id: String,
    /// Schema name for `Object`/`Result` frames, tool name for `Tool` frames.
    pub schema_or_name: String,
    pub accumulated_bytes: String,
}

impl FrameState {
    pub fn new(kind: FrameKind, id: impl Into<String>, schema_or_name: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            schema_or_name: schema_or_name.into(),
            accumulated_bytes: String::new(),
        }
    }
}

/// Recorded once per completed `Object`/`Result` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationNote {
    pub id: String,
    pub schema: String,
    pub kind: FrameKind,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<String>,
}

impl ValidationNote {
    pub fn ok(id: impl Into<String>, schema: impl Into<String>, kind: FrameKind) -> Self {
        Self {
            id: id.into(),
            schema: schema.into(),
            kind,
            ok: true,
            errors: None,
        }
    }

    pub fn failed(
        id: impl Into<String>,
        schema: impl Into<String>,
        kind: FrameKind,
        errors: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            schema: schema.into(),
            kind,
            ok: false,
            errors: Some(errors.into()),
        }
    }
}

/// One tool invocation, from the `tool.call` that created it through its
/// terminal outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub args: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub attempts: u32,
    pub started_at_ms: u64,
    pub finished_at_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate outcome counters for one session, written at finish time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationCounts {
    pub ok_json: u64,
    pub bad_json: u64,
    pub ok_result: u64,
    pub bad_result: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub total_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_latency_ms: Option<u64>,
    pub model: String,
    pub validation: ValidationCounts,
    pub degraded: bool,
}

/// A wire-level event name, used consistently across the tokenizer, emitter
/// and artifacts sink so a replay log and a live SSE stream carry the same
/// vocabulary.
pub const EVENT_JSON_BEGIN: &str = "json.begin";
pub const EVENT_JSON_DELTA: &str = "json.delta";
pub const EVENT_JSON_END: &str = "json.end";
pub const EVENT_TOOL_CALL: &str = "tool.call";
pub const EVENT_TOOL_RESULT: &str = "tool.result";
pub const EVENT_RESULT_BEGIN: &str = "result.begin";
pub const EVENT_RESULT_DELTA: &str = "result.delta";
pub const EVENT_RESULT_END: &str = "result.end";
pub const EVENT_ERROR: &str = "error";
pub const EVENT_PING: &str = "ping";
pub const EVENT_DONE: &str = "done";

/// Generate a short unique id, used for frame ids that the provider itself
/// does not originate (fallback/repair result frames).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Milliseconds since the Unix epoch, used for artifact timestamps and
/// `ToolInvocation` bookkeeping.
pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_kind_as_str() {
        assert_eq!(FrameKind::Object.as_str(), "object");
        assert_eq!(FrameKind::Tool.as_str(), "tool");
        assert_eq!(FrameKind::Result.as_str(), "result");
    }

    #[test]
    fn validation_note_constructors() {
        let ok = ValidationNote::ok("a", "AssistantReply", FrameKind::Result);
        assert!(ok.ok);
        assert!(ok.errors.is_none());

        let failed = ValidationNote::failed("b", "AssistantReply", FrameKind::Result, "missing field: answer");
        assert!(!failed.ok);
        assert_eq!(failed.errors.as_deref(), Some("missing field: answer"));
    }
}
