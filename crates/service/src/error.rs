//! Boundary error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use broker::BrokerError;
use mediator::MediatorError;
use thiserror::Error;

use crate::response::ApiResponse;

/// Boundary-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Dispatch failed: a domain exception or a handler resolution failure.
    #[error(transparent)]
    Mediator(#[from] MediatorError),

    /// The broker could not serve a request.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),
}

impl ApiError {
    /// Returns the HTTP status this error renders as.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Mediator(MediatorError::Domain(_)) => StatusCode::BAD_REQUEST,
            ApiError::Mediator(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Broker(err) => broker_error_status(err),
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

fn broker_error_status(err: &BrokerError) -> StatusCode {
    match err {
        BrokerError::Unavailable { .. }
        | BrokerError::ConnectionClosed
        | BrokerError::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
        BrokerError::RequestTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        BrokerError::Remote(_) => StatusCode::BAD_GATEWAY,
        BrokerError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, %status, "request failed");
        }
        let title = status.canonical_reason().unwrap_or("Error");
        ApiResponse::<()>::failure(status, title, vec![self.to_string()]).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediator::DomainException;
    use std::time::Duration;

    #[test]
    fn test_domain_exception_is_bad_request() {
        let err = ApiError::from(MediatorError::from(DomainException::new("already enrolled")));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "already enrolled");
    }

    #[test]
    fn test_resolution_failure_is_internal() {
        let err = ApiError::from(MediatorError::NoHandlerRegistered { message_type: "X" });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_broker_errors() {
        let unavailable = ApiError::from(BrokerError::Unavailable {
            attempts: 3,
            reason: "refused".into(),
        });
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);

        let timeout = ApiError::from(BrokerError::RequestTimeout {
            window: Duration::from_secs(120),
            attempts: 3,
        });
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_renders_api_response_body() {
        let response = ApiError::NotFound("Student not found.".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["title"], "Not Found");
        assert_eq!(json["errors"][0], "Student not found.");
        assert!(json["data"].is_null());
    }
}
