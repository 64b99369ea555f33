//! Declarative field-table schema definitions and the named registry that
//! maps a schema name to one.

use serde_json::Value;

/// A single field's shape and requiredness within a schema (or schema
/// variant).
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Used to fill the field in when absent and not required.
    pub default: Option<Value>,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, required: true, default: None }
    }

    pub const fn optional(name: &'static str, kind: FieldKind, default: Value) -> Self {
        Self { name, kind, required: false, default: Some(default) }
    }
}

#[derive(Debug, Clone)]
pub enum FieldKind {
    String,
    Bool,
    Number { min: Option<f64>, max: Option<f64> },
    Array { min_len: usize },
    Object,
    Enum(&'static [&'static str]),
}

impl FieldKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Bool => "bool",
            FieldKind::Number { .. } => "number",
            FieldKind::Array { .. } => "array",
            FieldKind::Object => "object",
            FieldKind::Enum(_) => "enum",
        }
    }
}

/// One arm of a discriminated union, selected by the value of the schema's
/// tag field.
#[derive(Debug, Clone)]
pub struct Variant {
    pub tag_value: &'static str,
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Clone)]
pub enum Schema {
    Plain(Vec<FieldSpec>),
    Discriminated {
        tag_field: &'static str,
        variants: Vec<Variant>,
    },
}

/// A process-wide, read-only map of schema name to shape. Shared across
/// sessions; never mutated after construction.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: std::collections::HashMap<String, Schema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        let mut schemas = std::collections::HashMap::new();
        schemas.insert("AssistantReply".to_string(), assistant_reply_schema());
        schemas.insert("Action".to_string(), action_schema());
        Self { schemas }
    }

    pub fn register(&mut self, name: impl Into<String>, schema: Schema) {
        self.schemas.insert(name.into(), schema);
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The terminal reply schema: the only schema the core requires at
/// minimum.
fn assistant_reply_schema() -> Schema {
    Schema::Plain(vec![
        FieldSpec::required("answer", FieldKind::String),
        FieldSpec::optional("citations", FieldKind::Array { min_len: 0 }, Value::Array(vec![])),
        FieldSpec::optional("diagnostics", FieldKind::Object, serde_json::json!({})),
    ])
}

/// An illustrative demonstration schema exercised by the happy-path
/// scenario: a discriminated union of planning actions.
fn action_schema() -> Schema {
    Schema::Discriminated {
        tag_field: "type",
        variants: vec![
            Variant {
                tag_value: "plan",
                fields: vec![
                    FieldSpec::required("type", FieldKind::Enum(&["plan"])),
                    FieldSpec::required("steps", FieldKind::Array { min_len: 1 }),
                ],
            },
            Variant {
                tag_value: "note",
                fields: vec![
                    FieldSpec::required("type", FieldKind::Enum(&["note"])),
                    FieldSpec::required("text", FieldKind::String),
                ],
            },
        ],
    }
}
