//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, error};
use vigil_core::auth::AuthError;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                "too_many_requests",
                "Too many failed login attempts",
            ),
            AppError::Internal(detail) => {
                error!(detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            // Which of these happened is for the log only.
            AuthError::CredentialError
            | AuthError::Unauthorized(_)
            | AuthError::MalformedToken(_) => {
                debug!(error = %e, "authentication rejected");
                AppError::Unauthorized("Unauthorized".into())
            }
            AuthError::NotFound(_) => {
                debug!(error = %e, "authenticated resource missing");
                AppError::NotFound("Resource not found".into())
            }
            AuthError::TokenError(msg)
            | AuthError::Serialization(msg)
            | AuthError::Internal(msg) => AppError::Internal(msg),
            AuthError::DbError(e) => AppError::from(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguous_auth_failures_collapse_to_one_message() {
        let variants = [
            AuthError::CredentialError,
            AuthError::Unauthorized("session row missing".into()),
            AuthError::MalformedToken("bad signature".into()),
        ];
        for variant in variants {
            match AppError::from(variant) {
                AppError::Unauthorized(m) => assert_eq!(m, "Unauthorized"),
                other => panic!("unexpected mapping: {other:?}"),
            }
        }
    }

    #[test]
    fn not_found_hides_detail() {
        match AppError::from(AuthError::NotFound("user 42".into())) {
            AppError::NotFound(m) => assert_eq!(m, "Resource not found"),
            other => panic!("unexpected mapping: {other:?}"),
        }
    }

    #[test]
    fn internal_errors_render_generic_body() {
        let response = AppError::Internal("db exploded".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let response = AppError::TooManyRequests.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
