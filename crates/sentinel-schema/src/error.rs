/// A single validation failure, aggregated into `ValidationNote.errors` via
/// a semicolon-joined `Display` so every failure on a document surfaces at
/// once instead of one at a time.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FieldError {
    #[error("missing required field '{0}'")]
    MissingRequired(String),

    #[error("field '{field}' has wrong type: expected {expected}, got {actual}")]
    WrongType {
        field: String,
        expected: &'static str,
        actual: String,
    },

    #[error("field '{field}' value '{value}' is not one of the allowed values")]
    NotInEnum { field: String, value: String },

    #[error("field '{field}' value {value} is out of range ({constraint})")]
    OutOfRange {
        field: String,
        value: String,
        constraint: String,
    },

    #[error("field '{field}' array has {actual} elements, fewer than the required minimum {min}")]
    ArrayTooShort { field: String, actual: usize, min: usize },

    #[error("unknown schema '{0}'")]
    UnknownSchema(String),

    #[error("discriminant field '{field}' missing or does not match any known variant (value: {value})")]
    UnknownVariant { field: String, value: String },

    #[error("body is not a JSON object")]
    NotAnObject,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn single(e: FieldError) -> Self {
        Self(vec![e])
    }
}
