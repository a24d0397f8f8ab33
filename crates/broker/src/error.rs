use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when talking to the message broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker could not be reached after exhausting the retry policy.
    #[error("Broker unavailable after {attempts} connection attempt(s): {reason}")]
    Unavailable { attempts: u32, reason: String },

    /// No reply arrived for a request within the configured window.
    #[error(
        "Request timed out: no reply within {}s after {attempts} attempt(s)",
        window.as_secs()
    )]
    RequestTimeout { window: Duration, attempts: u32 },

    /// The connection was closed while an operation was using it.
    #[error("Broker connection closed")]
    ConnectionClosed,

    /// The transport rejected an operation.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The responder failed to handle a request and relayed its error.
    #[error("Responder failed: {0}")]
    Remote(String),

    /// A payload could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BrokerError {
    /// Returns true for failures worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BrokerError::Unavailable { .. }
                | BrokerError::ConnectionClosed
                | BrokerError::Transport(_)
        )
    }

    /// Returns true if this is a per-attempt or final request timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, BrokerError::RequestTimeout { .. })
    }
}

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_the_window() {
        let err = BrokerError::RequestTimeout {
            window: Duration::from_secs(120),
            attempts: 3,
        };
        assert_eq!(
            err.to_string(),
            "Request timed out: no reply within 120s after 3 attempt(s)"
        );
        assert!(err.is_timeout());
        assert!(!err.is_transient());
    }

    #[test]
    fn transient_classification() {
        assert!(BrokerError::ConnectionClosed.is_transient());
        assert!(BrokerError::Transport("reset".into()).is_transient());
        assert!(!BrokerError::Remote("boom".into()).is_transient());
    }
}
