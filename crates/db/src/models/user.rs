//! User identity record and DTOs.

use clipstream_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Full user row from the `users` table.
///
/// Contains the password hash and the active refresh-token hash -- NEVER
/// serialize this to API responses directly. Use [`Identity`] for anything
/// that crosses the authentication boundary.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DbId,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub password_hash: String,
    /// SHA-256 hex digest of the single active refresh token, if any.
    pub refresh_token_hash: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// The identity an authentication gate attaches to a request.
///
/// This is the only user representation downstream handlers ever see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: DbId,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: Option<String>,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            avatar: user.avatar_url.clone(),
        }
    }
}

impl From<User> for Identity {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            avatar: user.avatar_url,
        }
    }
}

/// DTO for creating a new user. Username and email must already be normalized.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub password_hash: String,
}
