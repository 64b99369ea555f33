//! Schema registry, streaming validator (C2) and repair module (C3).

pub mod error;
pub mod registry;
pub mod repair;
pub mod validate;

pub use error::{FieldError, ValidationErrors};
pub use registry::{FieldKind, FieldSpec, Schema, SchemaRegistry, Variant};
pub use repair::repair_reply;

use sentinel_types::{FrameKind, ValidationNote};
use serde_json::Value;

/// Resolve `schema_name` in `registry`, JSON-parse `body`, and validate it,
/// producing the `ValidationNote` the controller records. Never mutates
/// the stream; only appends a note.
pub fn validate_frame(
    registry: &SchemaRegistry,
    frame_id: &str,
    schema_name: &str,
    kind: FrameKind,
    body: &str,
) -> (ValidationNote, Option<Value>) {
    let Some(schema) = registry.get(schema_name) else {
        return (
            ValidationNote::failed(frame_id, schema_name, kind, format!("unknown schema '{schema_name}'")),
            None,
        );
    };

    let parsed: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            return (
                ValidationNote::failed(frame_id, schema_name, kind, format!("invalid JSON: {e}")),
                None,
            )
        }
    };

    match validate::validate(schema, &parsed) {
        Ok(filled) => (ValidationNote::ok(frame_id, schema_name, kind), Some(filled)),
        Err(errors) => (
            ValidationNote::failed(frame_id, schema_name, kind, errors.to_string()),
            None,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_frame_reports_unknown_schema() {
        let registry = SchemaRegistry::new();
        let (note, value) = validate_frame(&registry, "r1", "NoSuchSchema", FrameKind::Result, "{}");
        assert!(!note.ok);
        assert!(value.is_none());
    }

    #[test]
    fn validate_frame_reports_invalid_json() {
        let registry = SchemaRegistry::new();
        let (note, value) = validate_frame(&registry, "r1", "AssistantReply", FrameKind::Result, "{not json");
        assert!(!note.ok);
        assert!(value.is_none());
    }

    #[test]
    fn validate_frame_succeeds_and_fills_defaults() {
        let registry = SchemaRegistry::new();
        let (note, value) = validate_frame(
            &registry,
            "r1",
            "AssistantReply",
            FrameKind::Result,
            r#"{"answer":"hi"}"#,
        );
        assert!(note.ok);
        assert_eq!(value.unwrap()["citations"], serde_json::json!([]));
    }
}
