use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use clipstream_core::error::CoreError;
use clipstream_db::store::StoreError;
use serde_json::json;

use crate::auth::error::{AuthError, HashingError};

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`AuthError`] for the
/// authentication subsystem, and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `clipstream_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An authentication or session failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A credential-store failure outside the auth pipeline.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<HashingError> for AppError {
    fn from(err: HashingError) -> Self {
        AppError::Auth(AuthError::Hashing(err))
    }
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

const INTERNAL_MESSAGE: &str = "An internal error occurred";

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        INTERNAL_MESSAGE.to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, key } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} '{key}' not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
            },

            // --- Auth errors ---
            AppError::Auth(auth) => classify_auth_error(auth),

            // --- Store errors ---
            AppError::Store(store) => classify_store_error(store),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Map an [`AuthError`] to its outward response.
///
/// Unknown-user and wrong-password logins share one message so the response
/// does not reveal which usernames exist; the distinction survives in logs.
fn classify_auth_error(err: &AuthError) -> (StatusCode, &'static str, String) {
    match err {
        AuthError::MissingToken => (
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "Authentication required".to_string(),
        ),
        AuthError::InvalidToken | AuthError::UserNotFound => (
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "Invalid or expired token".to_string(),
        ),
        AuthError::BadCredentials | AuthError::NotFound => {
            tracing::info!(reason = err.reason(), "Login failed");
            (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Invalid username or password".to_string(),
            )
        }
        AuthError::TokenReused => (
            StatusCode::UNAUTHORIZED,
            "SESSION_INVALID",
            "Session is no longer valid, please log in again".to_string(),
        ),
        AuthError::Store(store) => classify_store_error(store),
        AuthError::Hashing(_) | AuthError::Signing(_) => {
            tracing::error!(error = %err, "Authentication internal error");
            internal()
        }
    }
}

/// Classify a store error into an HTTP status, error code, and message.
///
/// - Duplicate username/email maps to 409.
/// - `RowNotFound` maps to 404.
/// - Everything else maps to 500 with a sanitized message.
fn classify_store_error(err: &StoreError) -> (StatusCode, &'static str, String) {
    match err {
        StoreError::Duplicate(field) => (
            StatusCode::CONFLICT,
            "CONFLICT",
            format!("That {field} is already taken"),
        ),
        StoreError::Database(sqlx::Error::RowNotFound) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        StoreError::Database(other) => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}
