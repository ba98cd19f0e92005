//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use portal_core::{AuthError, PortalError};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthorized,
    #[error("{message}")]
    Auth { code: &'static str, message: String },
    #[error("already registered: {0}")]
    Conflict(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Authentication required".to_string(),
            ),
            ApiError::Auth { code, message } => (StatusCode::UNAUTHORIZED, code, message),
            ApiError::Conflict(detail) => (StatusCode::CONFLICT, "ALREADY_REGISTERED", detail),
            ApiError::Forbidden(detail) => (StatusCode::FORBIDDEN, "FORBIDDEN", detail),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail),
            ApiError::Internal(detail) => {
                tracing::error!(%detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::AlreadyRegistered => ApiError::Conflict(message),
            AuthError::WeakPassword { .. } => ApiError::BadRequest(message),
            AuthError::InvalidCredentials => ApiError::Auth {
                code: "INVALID_CREDENTIALS",
                message,
            },
            AuthError::ProfileMissing(_) => ApiError::Auth {
                code: "PROFILE_MISSING",
                message,
            },
            AuthError::NotSignedIn => ApiError::Unauthorized,
            AuthError::Provider(_) | AuthError::Provisioning(_) => ApiError::Internal(message),
        }
    }
}

impl From<PortalError> for ApiError {
    fn from(err: PortalError) -> Self {
        match err {
            PortalError::Auth(e) => e.into(),
            PortalError::Validation(_) | PortalError::InvalidText(_) => {
                ApiError::BadRequest(err.to_string())
            }
            PortalError::Forbidden(detail) => ApiError::Forbidden(detail),
            PortalError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            PortalError::Persistence(_)
            | PortalError::Fetch(_)
            | PortalError::MalformedDocument { .. }
            | PortalError::Encoding(_) => ApiError::Internal(err.to_string()),
        }
    }
}
