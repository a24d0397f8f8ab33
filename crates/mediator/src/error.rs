//! Mediator error types.

use thiserror::Error;

/// Errors that can occur while dispatching messages.
#[derive(Debug, Error)]
pub enum MediatorError {
    /// No handler is registered for the command type.
    #[error("No handler registered for command {message_type}")]
    NoHandlerRegistered { message_type: &'static str },

    /// A second handler was registered for a command type.
    #[error("A handler for command {message_type} is already registered")]
    DuplicateRegistration { message_type: &'static str },

    /// A domain invariant was violated.
    #[error(transparent)]
    Domain(#[from] DomainException),

    /// A handler failed for a reason other than a domain invariant.
    #[error("Handler for {message_type} failed: {source}")]
    Handler {
        message_type: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl MediatorError {
    /// Wraps an arbitrary handler failure.
    pub fn handler<M: ?Sized>(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        MediatorError::Handler {
            message_type: std::any::type_name::<M>(),
            source: source.into(),
        }
    }

    /// Returns true for handler resolution failures, which are programming errors.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            MediatorError::NoHandlerRegistered { .. } | MediatorError::DuplicateRegistration { .. }
        )
    }
}

/// An illegal state transition attempted despite valid input.
///
/// Reserved for unexpected domain corruption. Anticipated rule violations
/// are reported as domain notifications instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DomainException {
    message: String,
}

impl DomainException {
    /// Creates a domain exception with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A unit-of-work commit failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Persistence failed: {0}")]
pub struct PersistenceError(pub String);

/// Result type for mediator operations.
pub type Result<T> = std::result::Result<T, MediatorError>;
