//! Provider client (C9, ambient): the concrete collaborator satisfying the
//! out-of-scope "language-model provider" contract C6 depends on.

pub mod client;
pub mod error;
pub mod mock;
pub mod types;

pub use client::{OpenAiProviderClient, OpenAiProviderClientConfig, ProviderClient, ProviderStream};
pub use error::{ProviderError, Result};
pub use mock::MockProviderClient;
pub use types::{ChatMessage, CompletionRequest, ProviderEvent, Role, ToolCallHint};
