//! The `{ status, title, data, errors }` envelope returned at the boundary.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mediator::{CommandResult, DomainNotification};
use serde::Serialize;

/// Title of a successful response.
pub const SUCCESS_TITLE: &str = "Success";

/// Title of a response rejected by validation.
pub const VALIDATION_TITLE: &str = "One or more validation errors occurred.";

/// Boundary response built from a command result and the unit of work's notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub title: String,
    pub data: Option<T>,
    pub errors: Vec<String>,
}

impl<T> ApiResponse<T> {
    /// Builds the response for one dispatched command.
    ///
    /// Valid results become 200 with the payload. Otherwise 400 with the
    /// notification messages in order, or the result's own errors when no
    /// notification was recorded.
    pub fn from_command(result: CommandResult<T>, notifications: &[DomainNotification]) -> Self {
        if result.is_valid() {
            return Self {
                status: StatusCode::OK.as_u16(),
                title: SUCCESS_TITLE.to_string(),
                data: result.into_data(),
                errors: Vec::new(),
            };
        }

        let errors = if notifications.is_empty() {
            result.errors().to_vec()
        } else {
            notifications.iter().map(|n| n.value().to_string()).collect()
        };
        Self::failure(StatusCode::BAD_REQUEST, VALIDATION_TITLE, errors)
    }

    /// A response without payload.
    pub fn failure(status: StatusCode, title: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            status: status.as_u16(),
            title: title.into(),
            data: None,
            errors,
        }
    }

    /// Returns true for 2xx responses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
