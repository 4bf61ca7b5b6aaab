//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use dispatch::DispatchError;
use domain::{DomainError, ErrorKind};
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
///
/// Library errors keep their own [`ErrorKind`]; the status code and the
/// `kind` field of the body both derive from it.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed path, query or body.
    #[error("{0}")]
    BadRequest(String),

    /// Caller identity headers missing or unusable.
    #[error("{0}")]
    Unauthenticated(String),

    /// Authenticated, but not allowed to do this.
    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::BadRequest(_) => ErrorKind::Validation,
            ApiError::Unauthenticated(_) | ApiError::Forbidden(_) => ErrorKind::Forbidden,
            ApiError::Domain(e) => e.kind(),
            ApiError::Checkout(e) => e.kind(),
            ApiError::Dispatch(e) => e.kind(),
            ApiError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        if let ApiError::Unauthenticated(_) = self {
            return StatusCode::UNAUTHORIZED;
        }
        status_for(self.kind())
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::InvalidTransition | ErrorKind::StaleState => StatusCode::CONFLICT,
        ErrorKind::Infeasible => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::PaymentFailed => StatusCode::PAYMENT_REQUIRED,
        ErrorKind::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        metrics::counter!("http_errors_total", "kind" => kind.as_str()).increment(1);
        if status.is_server_error() {
            tracing::error!(error = %self, kind = kind.as_str(), "request failed");
        } else {
            tracing::debug!(error = %self, kind = kind.as_str(), "request refused");
        }

        let body = serde_json::json!({ "error": self.to_string(), "kind": kind });
        (status, axum::Json(body)).into_response()
    }
}
