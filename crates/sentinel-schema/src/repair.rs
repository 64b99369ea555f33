//! Repair module (C3): produces a minimal valid `AssistantReply` when the
//! terminal reply fails schema validation, attempted at most once per
//! reply frame.

use serde_json::{json, Value};

/// Build the minimal valid `AssistantReply` carrying the failed
/// validator's errors as a diagnostic, per the fixed shape the core
/// always falls back to.
pub fn repair_reply(validator_errors: &str) -> Value {
    json!({
        "answer": "",
        "citations": [],
        "diagnostics": {
            "error": "schema_repair_failed",
            "last_validator_errors": validator_errors,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repair_reply_has_fixed_shape() {
        let reply = repair_reply("missing required field 'answer'");
        assert_eq!(reply["answer"], json!(""));
        assert_eq!(reply["citations"], json!([]));
        assert_eq!(reply["diagnostics"]["error"], json!("schema_repair_failed"));
        assert_eq!(
            reply["diagnostics"]["last_validator_errors"],
            json!("missing required field 'answer'")
        );
    }
}
