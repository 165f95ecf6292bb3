use std::time::Duration;

use crate::model::Ms;
use crate::ratelimit::RateLimitPolicy;

/// Which `CampusStore` implementation backs the engine. Resolved exactly once
/// at startup via `store::resolve`; an unrecognized name is a hard error,
/// never a silent fallback to a no-op store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    /// Bound on every store call; expiry surfaces as a retryable error.
    pub store_timeout: Duration,
    pub rate_limit: RateLimitPolicy,
    /// Prometheus exporter port; None disables the exporter.
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::Memory,
            store_timeout: Duration::from_millis(5_000),
            rate_limit: RateLimitPolicy::default(),
            metrics_port: None,
        }
    }
}

impl Config {
    /// Read configuration from `HALLPASS_*` environment variables.
    /// Unset variables fall back to defaults; an unknown store backend fails.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let store_backend = match std::env::var("HALLPASS_STORE") {
            Ok(s) => s.parse()?,
            Err(_) => defaults.store_backend,
        };
        let store_timeout = std::env::var("HALLPASS_STORE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.store_timeout);
        let window_ms = std::env::var("HALLPASS_RATE_LIMIT_WINDOW_MS")
            .ok()
            .and_then(|s| s.parse::<Ms>().ok())
            .unwrap_or(defaults.rate_limit.window_ms);
        let max_attempts = std::env::var("HALLPASS_RATE_LIMIT_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(defaults.rate_limit.max_attempts);
        let metrics_port = std::env::var("HALLPASS_METRICS_PORT")
            .ok()
            .and_then(|s| s.parse().ok());

        Ok(Self {
            store_backend,
            store_timeout,
            rate_limit: RateLimitPolicy { window_ms, max_attempts },
            metrics_port,
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    UnknownBackend(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::UnknownBackend(name) => {
                write!(f, "unknown store backend: {name:?} (expected \"memory\")")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_parses_memory() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
    }

    #[test]
    fn backend_rejects_unknown() {
        let err = "mock".parse::<StoreBackend>().unwrap_err();
        assert!(err.to_string().contains("mock"));
    }

    #[test]
    fn defaults_are_sane() {
        let c = Config::default();
        assert_eq!(c.store_backend, StoreBackend::Memory);
        assert_eq!(c.store_timeout, Duration::from_millis(5_000));
        assert_eq!(c.rate_limit.max_attempts, 5);
        assert!(c.metrics_port.is_none());
    }
}
