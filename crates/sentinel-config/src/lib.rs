//! Environment-resolved configuration for the sentinel streaming gateway.
//!
//! A `Config` is resolved exactly once, at process start, from environment
//! variables. It is immutable afterwards and handed to sessions by
//! reference (`Arc`). Resolution is the one place in the core that is
//! permitted to touch the outside world.

pub mod error;

pub use error::{ConfigError, Result};

use std::net::SocketAddr;
use std::time::Duration;

/// Deterministic provider parameters and operational timeouts, resolved
/// once from the environment with typed defaults and fail-fast validation.
#[derive(Debug, Clone)]
pub struct Config {
    pub frame_timeout_ms: u64,
    pub tool_timeout_ms: u64,
    pub tool_retries: u32,
    pub repair_retries: u32,

    pub model_id: String,
    pub temperature: f64,
    pub seed: u64,
    pub max_tokens: u32,

    pub provider_base_url: String,
    pub provider_api_key: Option<String>,

    pub max_queued_chunks: usize,

    pub bind_addr: SocketAddr,
    pub artifacts_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frame_timeout_ms: 15_000,
            tool_timeout_ms: 8_000,
            tool_retries: 1,
            repair_retries: 1,
            model_id: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            seed: 42,
            max_tokens: 384,
            provider_base_url: "http://localhost:11434/v1".to_string(),
            provider_api_key: None,
            max_queued_chunks: 128,
            bind_addr: "127.0.0.1:8080".parse().expect("valid default bind address"),
            artifacts_dir: "./artifacts".to_string(),
        }
    }
}

impl Config {
    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_timeout_ms)
    }

    /// Resolve a `Config` from the process environment, applying defaults
    /// for unset variables and rejecting malformed ones.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Some(v) = env_var("FRAME_TIMEOUT_MS") {
            config.frame_timeout_ms = parse_u64("FRAME_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = env_var("TOOL_TIMEOUT_MS") {
            config.tool_timeout_ms = parse_u64("TOOL_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = env_var("TOOL_RETRIES") {
            config.tool_retries = parse_u32("TOOL_RETRIES", &v)?;
        }
        if let Some(v) = env_var("REPAIR_RETRIES") {
            config.repair_retries = parse_u32("REPAIR_RETRIES", &v)?;
        }
        if let Some(v) = env_var("MODEL_ID") {
            config.model_id = v;
        }
        if let Some(v) = env_var("TEMPERATURE") {
            config.temperature = parse_f64("TEMPERATURE", &v)?;
        }
        if let Some(v) = env_var("SEED") {
            config.seed = parse_u64("SEED", &v)?;
        }
        if let Some(v) = env_var("MAX_TOKENS") {
            config.max_tokens = parse_u32("MAX_TOKENS", &v)?;
        }
        if let Some(v) = env_var("PROVIDER_BASE_URL") {
            config.provider_base_url = v;
        }
        if let Some(v) = env_var("PROVIDER_API_KEY") {
            config.provider_api_key = Some(v);
        }
        if let Some(v) = env_var("MAX_QUEUED_CHUNKS") {
            config.max_queued_chunks = parse_u64("MAX_QUEUED_CHUNKS", &v)? as usize;
        }
        if let Some(v) = env_var("BIND_ADDR") {
            config.bind_addr = v
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddress(v.clone(), e))?;
        }
        if let Some(v) = env_var("ARTIFACTS_DIR") {
            config.artifacts_dir = v;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.model_id.trim().is_empty() {
            return Err(ConfigError::Empty { var: "MODEL_ID" });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::OutOfRange {
                var: "TEMPERATURE",
                value: self.temperature.to_string(),
                constraint: "0.0..=2.0",
            });
        }
        if self.frame_timeout_ms == 0 {
            return Err(ConfigError::OutOfRange {
                var: "FRAME_TIMEOUT_MS",
                value: "0".to_string(),
                constraint: "> 0",
            });
        }
        if self.tool_timeout_ms == 0 {
            return Err(ConfigError::OutOfRange {
                var: "TOOL_TIMEOUT_MS",
                value: "0".to_string(),
                constraint: "> 0",
            });
        }
        if self.max_queued_chunks == 0 {
            return Err(ConfigError::OutOfRange {
                var: "MAX_QUEUED_CHUNKS",
                value: "0".to_string(),
                constraint: "> 0",
            });
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_u64(var: &'static str, value: &str) -> Result<u64> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
        reason: "expected a non-negative integer",
    })
}

fn parse_u32(var: &'static str, value: &str) -> Result<u32> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
        reason: "expected a non-negative integer",
    })
}

fn parse_f64(var: &'static str, value: &str) -> Result<f64> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
        reason: "expected a decimal number",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.frame_timeout_ms, 15_000);
        assert_eq!(config.max_queued_chunks, 128);
    }

    #[test]
    fn rejects_empty_model_id() {
        let mut config = Config::default();
        config.model_id = "  ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Empty { var: "MODEL_ID" })));
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        let mut config = Config::default();
        config.temperature = 5.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { var: "TEMPERATURE", .. })
        ));
    }

    #[test]
    fn parse_helpers_reject_non_numeric() {
        assert!(parse_u64("FRAME_TIMEOUT_MS", "not-a-number").is_err());
        assert!(parse_f64("TEMPERATURE", "hot").is_err());
    }
}
