//! Error taxonomy for the authentication subsystem.
//!
//! Codec and hasher errors are translated into [`AuthError`] one level up;
//! only [`AuthError`] ever reaches the HTTP layer.

use clipstream_db::store::StoreError;

/// Internal failure inside the password hasher. Never carries user input.
#[derive(Debug, thiserror::Error)]
#[error("Password hashing failed: {0}")]
pub struct HashingError(pub String);

/// Why a token failed verification in the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("Token is malformed")]
    Malformed,

    #[error("Token signature does not match")]
    BadSignature,

    #[error("Token has expired")]
    Expired,
}

/// Subsystem-level authentication failure.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("No credential supplied")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Password does not match")]
    BadCredentials,

    #[error("No user matches the login identifier")]
    NotFound,

    #[error("Token subject no longer exists")]
    UserNotFound,

    #[error("Refresh token is no longer the active session")]
    TokenReused,

    #[error(transparent)]
    Hashing(#[from] HashingError),

    #[error("Token signing failed: {0}")]
    Signing(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Stable, log-friendly label for the failure.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidToken => "invalid_token",
            AuthError::BadCredentials => "bad_credentials",
            AuthError::NotFound => "not_found",
            AuthError::UserNotFound => "user_not_found",
            AuthError::TokenReused => "token_reused",
            AuthError::Hashing(_) => "hashing_error",
            AuthError::Signing(_) => "signing_error",
            AuthError::Store(_) => "store_error",
        }
    }

    /// `true` for failures caused by the server rather than the credential.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AuthError::Hashing(_) | AuthError::Signing(_) | AuthError::Store(_)
        )
    }
}
