//! Wire-adjacent types for the provider contract: the request the
//! controller builds each round, and the events a stream yields.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// The deterministic parameters and message list for one provider round.
/// `model`/`temperature`/`seed`/`max_tokens` come straight from C8's
/// `Config` so every round in a session is reproducible.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub temperature: f64,
    pub seed: u64,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn from_config(config: &sentinel_config::Config, messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: config.model_id.clone(),
            temperature: config.temperature,
            seed: config.seed,
            max_tokens: config.max_tokens,
        }
    }
}

/// An upstream-native tool-call hint some OpenAI-compatible backends emit
/// alongside (or instead of) in-band sentinel text. The controller ignores
/// these — it drives tool orchestration off sentinel frames — but the
/// provider abstraction surfaces them so it stays honest about what the
/// wire actually carries.
#[derive(Debug, Clone)]
pub struct ToolCallHint {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// One event from a provider stream. Terminal variants (`Done`, `Error`)
/// end the stream; no further items follow.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    TextDelta(String),
    ToolCallHint(ToolCallHint),
    Done,
    Error(String),
}
