//! Broker client configuration loaded from environment variables.

use std::time::Duration;

use crate::request::DEFAULT_REQUEST_TIMEOUT;
use crate::retry::RetryPolicy;

/// Broker client configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `BROKER_CONNECTION`: opaque connection string (default: `"host=localhost:5672"`)
/// - `BROKER_REQUEST_TIMEOUT_SECS`: reply window per request attempt (default: `120`)
/// - `BROKER_RETRY_ATTEMPTS`: attempts per connect or request (default: `3`)
/// - `BROKER_RETRY_BASE_SECS`: backoff base; attempt `n` waits `base * 2^n` (default: `1`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub connection_string: String,
    pub request_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
}

impl BrokerConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| v.parse().ok())
                .map_or(default, Duration::from_secs)
        };

        Self {
            connection_string: lookup("BROKER_CONNECTION").unwrap_or(defaults.connection_string),
            request_timeout: secs("BROKER_REQUEST_TIMEOUT_SECS", defaults.request_timeout),
            retry_attempts: lookup("BROKER_RETRY_ATTEMPTS")
                .and_then(|v| v.parse().ok())
                .filter(|attempts| *attempts > 0)
                .unwrap_or(defaults.retry_attempts),
            retry_base_delay: secs("BROKER_RETRY_BASE_SECS", defaults.retry_base_delay),
        }
    }

    /// Returns the retry policy for connection attempts and request timeouts.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, self.retry_base_delay)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            connection_string: "host=localhost:5672".to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry_attempts: RetryPolicy::DEFAULT_MAX_ATTEMPTS,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}
