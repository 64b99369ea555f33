//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while resolving the environment into a `Config`.
///
/// Every variant is a fail-fast startup condition: the process never serves
/// a malformed configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}' ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("{var} out of range: {value} (expected {constraint})")]
    OutOfRange {
        var: &'static str,
        value: String,
        constraint: &'static str,
    },

    #[error("{var} must not be empty")]
    Empty { var: &'static str },

    #[error("invalid bind address '{0}': {1}")]
    InvalidBindAddress(String, std::net::AddrParseError),
}
