//! The `Tool` trait and the name-keyed registry that resolves one for the
//! orchestrator.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ToolError;

/// Per-call context handed to a tool's `execute`. Mirrors the shape the
/// orchestrator knows about a `tool.call` frame.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub session_id: String,
    pub call_id: String,
    pub attempt: u32,
}

impl ToolContext {
    pub fn new(session_id: impl Into<String>, call_id: impl Into<String>, attempt: u32) -> Self {
        Self {
            session_id: session_id.into(),
            call_id: call_id.into(),
            attempt,
        }
    }
}

pub type ToolResult = Value;

/// A registered tool executor: validated arguments in, a JSON result or an
/// error out.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError>;
}

/// Name → executor map, consulted by the orchestrator in step 2 of its
/// `tool.call` handling.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.names()).finish()
    }
}
