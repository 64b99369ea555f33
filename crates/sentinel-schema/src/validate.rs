//! The declarative validator: interprets a [`Schema`] against a
//! `serde_json::Value`, tolerating arbitrary key order, large strings and
//! long arrays, and rejecting unknown shapes.

use serde_json::Value;

use crate::error::{FieldError, ValidationErrors};
use crate::registry::{FieldKind, FieldSpec, Schema};

/// Validate `value` against `schema`, returning the (possibly
/// default-filled) document on success.
pub fn validate(schema: &Schema, value: &Value) -> Result<Value, ValidationErrors> {
    match schema {
        Schema::Plain(fields) => validate_fields(fields, value),
        Schema::Discriminated { tag_field, variants } => {
            let Some(obj) = value.as_object() else {
                return Err(ValidationErrors::single(FieldError::NotAnObject));
            };
            let tag = obj.get(*tag_field).and_then(Value::as_str);
            let variant = tag.and_then(|t| variants.iter().find(|v| v.tag_value == t));
            match variant {
                Some(v) => validate_fields(&v.fields, value),
                None => Err(ValidationErrors::single(FieldError::UnknownVariant {
                    field: tag_field.to_string(),
                    value: tag.unwrap_or("<missing>").to_string(),
                })),
            }
        }
    }
}

fn validate_fields(fields: &[FieldSpec], value: &Value) -> Result<Value, ValidationErrors> {
    let Some(obj) = value.as_object() else {
        return Err(ValidationErrors::single(FieldError::NotAnObject));
    };

    let mut errors = Vec::new();
    let mut out = obj.clone();

    for field in fields {
        match obj.get(field.name) {
            Some(v) => {
                if let Err(e) = check_kind(field, v) {
                    errors.push(e);
                }
            }
            None => {
                if field.required {
                    errors.push(FieldError::MissingRequired(field.name.to_string()));
                } else if let Some(default) = &field.default {
                    out.insert(field.name.to_string(), default.clone());
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(Value::Object(out))
    } else {
        Err(ValidationErrors(errors))
    }
}

fn check_kind(field: &FieldSpec, v: &Value) -> Result<(), FieldError> {
    match &field.kind {
        FieldKind::String => {
            if v.is_string() {
                Ok(())
            } else {
                Err(wrong_type(field, v))
            }
        }
        FieldKind::Bool => {
            if v.is_boolean() {
                Ok(())
            } else {
                Err(wrong_type(field, v))
            }
        }
        FieldKind::Number { min, max } => {
            let Some(n) = v.as_f64() else {
                return Err(wrong_type(field, v));
            };
            if let Some(min) = min {
                if n < *min {
                    return Err(FieldError::OutOfRange {
                        field: field.name.to_string(),
                        value: n.to_string(),
                        constraint: format!(">= {min}"),
                    });
                }
            }
            if let Some(max) = max {
                if n > *max {
                    return Err(FieldError::OutOfRange {
                        field: field.name.to_string(),
                        value: n.to_string(),
                        constraint: format!("<= {max}"),
                    });
                }
            }
            Ok(())
        }
        FieldKind::Array { min_len } => {
            let Some(arr) = v.as_array() else {
                return Err(wrong_type(field, v));
            };
            if arr.len() < *min_len {
                return Err(FieldError::ArrayTooShort {
                    field: field.name.to_string(),
                    actual: arr.len(),
                    min: *min_len,
                });
            }
            Ok(())
        }
        FieldKind::Object => {
            if v.is_object() {
                Ok(())
            } else {
                Err(wrong_type(field, v))
            }
        }
        FieldKind::Enum(allowed) => {
            let Some(s) = v.as_str() else {
                return Err(wrong_type(field, v));
            };
            if allowed.contains(&s) {
                Ok(())
            } else {
                Err(FieldError::NotInEnum {
                    field: field.name.to_string(),
                    value: s.to_string(),
                })
            }
        }
    }
}

fn wrong_type(field: &FieldSpec, v: &Value) -> FieldError {
    FieldError::WrongType {
        field: field.name.to_string(),
        expected: field.kind.type_name(),
        actual: value_type_name(v),
    }
}

fn value_type_name(v: &Value) -> String {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SchemaRegistry;
    use serde_json::json;

    #[test]
    fn assistant_reply_requires_answer() {
        let registry = SchemaRegistry::new();
        let schema = registry.get("AssistantReply").unwrap();
        let err = validate(schema, &json!({})).unwrap_err();
        assert!(err.to_string().contains("answer"));
    }

    #[test]
    fn assistant_reply_fills_defaults() {
        let registry = SchemaRegistry::new();
        let schema = registry.get("AssistantReply").unwrap();
        let out = validate(schema, &json!({"answer": "hi"})).unwrap();
        assert_eq!(out["citations"], json!([]));
        assert_eq!(out["diagnostics"], json!({}));
    }

    #[test]
    fn unknown_schema_key_order_and_extra_keys_tolerated() {
        let registry = SchemaRegistry::new();
        let schema = registry.get("AssistantReply").unwrap();
        let out = validate(
            schema,
            &json!({"citations": ["a"], "extra": true, "answer": "hi"}),
        )
        .unwrap();
        assert_eq!(out["answer"], json!("hi"));
    }

    #[test]
    fn discriminated_union_resolves_by_tag() {
        let registry = SchemaRegistry::new();
        let schema = registry.get("Action").unwrap();
        assert!(validate(schema, &json!({"type": "plan", "steps": ["a"]})).is_ok());
        assert!(validate(schema, &json!({"type": "note", "text": "hi"})).is_ok());
    }

    #[test]
    fn discriminated_union_rejects_unknown_tag() {
        let registry = SchemaRegistry::new();
        let schema = registry.get("Action").unwrap();
        let err = validate(schema, &json!({"type": "unknown"})).unwrap_err();
        assert!(err.to_string().contains("discriminant"));
    }

    #[test]
    fn array_min_length_enforced() {
        let registry = SchemaRegistry::new();
        let schema = registry.get("Action").unwrap();
        let err = validate(schema, &json!({"type": "plan", "steps": []})).unwrap_err();
        assert!(err.to_string().contains("fewer than"));
    }
}
