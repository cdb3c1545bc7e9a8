//! API error types and responses.
//!
//! Every error is rendered as `{"error": {"code": "<kind>", "message": "..."}}`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use vanlink_auth::AuthError;
use vanlink_control::{ControlError, ErrorKind};
use vanlink_core::CoreError;

/// API error type that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid ID token.
    #[error("authentication required")]
    Unauthenticated,

    /// Invalid request body or parameters.
    #[error("{0}")]
    InvalidArgument(String),

    /// The requested record was not found.
    #[error("{0}")]
    NotFound(String),

    /// The record or relationship already exists.
    #[error("{0}")]
    AlreadyExists(String),

    /// The caller may not act on this record.
    #[error("{0}")]
    PermissionDenied(String),

    /// The record is not in a state that allows the operation.
    #[error("{0}")]
    FailedPrecondition(String),

    /// Internal server error.
    #[error("{0}")]
    Unknown(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

/// Error details.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::FailedPrecondition(_) => ErrorKind::FailedPrecondition,
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Get the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Get the error code string for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind().as_str()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::JwksFetchFailed(_) | AuthError::Internal(_) => {
                tracing::error!(error = %err, "Auth internal error");
                Self::Unknown("authentication service error".to_string())
            }
            other => {
                tracing::debug!(error = %other, "Rejected ID token");
                Self::Unauthenticated
            }
        }
    }
}

impl From<ControlError> for ApiError {
    fn from(err: ControlError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::Unauthenticated => Self::Unauthenticated,
            ErrorKind::InvalidArgument => Self::InvalidArgument(message),
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::AlreadyExists => Self::AlreadyExists(message),
            ErrorKind::PermissionDenied => Self::PermissionDenied(message),
            ErrorKind::FailedPrecondition => Self::FailedPrecondition(message),
            ErrorKind::Unknown => {
                tracing::error!(error = %message, "Internal error");
                Self::Unknown("internal error".to_string())
            }
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidId(_) => Self::InvalidArgument(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidArgument(rejection.body_text())
    }
}
