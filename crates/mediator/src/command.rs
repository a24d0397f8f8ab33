//! Commands and their results.

use common::{AggregateId, MessageHeader};

use crate::validation::ValidationResult;

/// A request to change state, dispatched to exactly one handler.
pub trait Command: Send + Sync + 'static {
    /// Payload returned on success.
    type Output: Send + 'static;

    /// Message identity and creation time.
    fn header(&self) -> &MessageHeader;

    /// The aggregate root this command targets.
    fn aggregate_id(&self) -> AggregateId;

    /// Checks the command's input. Valid by default.
    fn validate(&self) -> ValidationResult {
        ValidationResult::valid()
    }
}

/// Validation state and payload of one command dispatch.
///
/// `is_valid()` is true exactly when there are no errors, and the payload is
/// only observable on a valid result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult<T> {
    data: Option<T>,
    errors: Vec<String>,
}

impl<T> CommandResult<T> {
    /// A valid result carrying `data`.
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
        }
    }

    /// An invalid result with the given errors, in order.
    ///
    /// An empty error list still produces an invalid result.
    pub fn invalid(errors: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut errors: Vec<String> = errors.into_iter().map(Into::into).collect();
        if errors.is_empty() {
            errors.push("The command was rejected.".to_string());
        }
        Self { data: None, errors }
    }

    /// Returns true if no errors were recorded.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the payload, or `None` when invalid.
    pub fn data(&self) -> Option<&T> {
        if self.is_valid() {
            self.data.as_ref()
        } else {
            None
        }
    }

    /// Consumes the result, returning the payload when valid.
    pub fn into_data(self) -> Option<T> {
        if self.is_valid() { self.data } else { None }
    }

    /// Returns the errors in the order they were recorded.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Records an error, making the result invalid.
    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.data = None;
    }

    /// Transforms the payload of a valid result.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CommandResult<U> {
        CommandResult {
            data: self.data.map(f),
            errors: self.errors,
        }
    }
}

impl<T> From<ValidationResult> for CommandResult<T> {
    fn from(validation: ValidationResult) -> Self {
        CommandResult::invalid(validation.messages())
    }
}
