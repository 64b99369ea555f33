//! Demonstration tools (C10, ambient): the handful of executors that let
//! C4 be exercised end to end without a caller-supplied tool set —
//! `places.search`/`bookings.create` for the happy-path scenario, plus the
//! `mode`-keyed test tools that make the orchestrator's retry and timeout
//! behavior observable over the wire.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ToolError;
use crate::tool::{Tool, ToolContext, ToolResult};

/// Searches for a place matching `query`. A query containing "closed"
/// demonstrates the no-results path the happy-path scenario's "none open"
/// answer depends on.
pub struct PlacesSearchTool;

#[async_trait]
impl Tool for PlacesSearchTool {
    fn name(&self) -> &str {
        "places.search"
    }

    fn description(&self) -> &str {
        "Search for a place by name or cuisine, returning open candidates."
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let query = args.get("query").and_then(Value::as_str).unwrap_or("").to_lowercase();
        if query.contains("closed") {
            return Ok(json!({"places": []}));
        }
        Ok(json!({
            "places": [
                {"name": "Tony's Pizzeria", "open": true, "cuisine": "pizza"},
            ]
        }))
    }
}

/// Books a table or appointment at a place previously returned by
/// `places.search`.
pub struct BookingsCreateTool;

#[async_trait]
impl Tool for BookingsCreateTool {
    fn name(&self) -> &str {
        "bookings.create"
    }

    fn description(&self) -> &str {
        "Create a booking at a place for a given time."
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let place = args.get("place").and_then(Value::as_str).unwrap_or("the venue").to_string();
        let time = args.get("time").and_then(Value::as_str).unwrap_or("7pm").to_string();
        Ok(json!({"status": "booked", "place": place, "time": time}))
    }
}

/// Fails on the first attempt and succeeds on every subsequent one,
/// echoing the retrying attempt number. Stateless: it reads the current
/// attempt index straight from [`ToolContext`] rather than keeping its own
/// counter, since the orchestrator already tracks attempts per call.
pub struct RetryTestTool;

#[async_trait]
impl Tool for RetryTestTool {
    fn name(&self) -> &str {
        "retry_test"
    }

    fn description(&self) -> &str {
        "Fails once, then succeeds, to exercise the orchestrator's retry path."
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        if ctx.attempt == 0 {
            return Err(ToolError::failed("induced failure on first attempt"));
        }
        Ok(json!({
            "attempt": ctx.attempt + 1,
            "message": format!("Retry attempts {}", ctx.attempt + 1),
        }))
    }
}

/// Always exceeds `TOOL_TIMEOUT_MS`, to exercise the orchestrator's timeout
/// path deterministically regardless of the configured timeout.
pub struct TimeoutTestTool;

#[async_trait]
impl Tool for TimeoutTestTool {
    fn name(&self) -> &str {
        "timeout_test"
    }

    fn description(&self) -> &str {
        "Never returns within the configured tool timeout."
    }

    async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(json!({}))
    }
}

/// Build a registry carrying every demonstration tool, for the server's
/// default wiring and for tests that want the full set.
pub fn demo_registry() -> crate::tool::ToolRegistry {
    let mut registry = crate::tool::ToolRegistry::new();
    registry.register(PlacesSearchTool);
    registry.register(BookingsCreateTool);
    registry.register(RetryTestTool);
    registry.register(TimeoutTestTool);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(attempt: u32) -> ToolContext {
        ToolContext::new("s1", "c1", attempt)
    }

    #[tokio::test]
    async fn places_search_returns_a_result_for_an_open_query() {
        let tool = PlacesSearchTool;
        let out = tool.execute(json!({"query": "pizza"}), &ctx(0)).await.unwrap();
        assert_eq!(out["places"][0]["open"], json!(true));
    }

    #[tokio::test]
    async fn places_search_returns_empty_for_a_closed_query() {
        let tool = PlacesSearchTool;
        let out = tool.execute(json!({"query": "closed place"}), &ctx(0)).await.unwrap();
        assert_eq!(out["places"], json!([]));
    }

    #[tokio::test]
    async fn bookings_create_echoes_place_and_time() {
        let tool = BookingsCreateTool;
        let out = tool
            .execute(json!({"place": "Tony's Pizzeria", "time": "7pm"}), &ctx(0))
            .await
            .unwrap();
        assert_eq!(out["status"], json!("booked"));
        assert_eq!(out["time"], json!("7pm"));
    }

    #[tokio::test]
    async fn retry_test_tool_fails_first_then_succeeds() {
        let tool = RetryTestTool;
        assert!(tool.execute(json!({}), &ctx(0)).await.is_err());
        let out = tool.execute(json!({}), &ctx(1)).await.unwrap();
        assert_eq!(out["attempt"], json!(2));
        assert_eq!(out["message"], json!("Retry attempts 2"));
    }

    #[test]
    fn demo_registry_has_all_four_tools() {
        let registry = demo_registry();
        let mut names = registry.names();
        names.sort();
        assert_eq!(names, vec!["bookings.create", "places.search", "retry_test", "timeout_test"]);
    }
}
