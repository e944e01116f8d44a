//! The credential-store boundary.
//!
//! The authentication subsystem never talks to SQL directly; it goes through
//! [`CredentialStore`], which keeps the password hash and the single active
//! refresh-token hash per user. Two backends are provided:
//!
//! - [`PgCredentialStore`] -- PostgreSQL via [`crate::repositories::UserRepo`].
//! - [`InMemoryCredentialStore`] -- process-local map for tests and local runs.

use async_trait::async_trait;
use clipstream_core::types::DbId;

use crate::models::user::{CreateUser, User};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryCredentialStore;
pub use postgres::PgCredentialStore;

/// Errors surfaced by a [`CredentialStore`] backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique field (`"username"` or `"email"`) is already taken.
    #[error("Duplicate {0}")]
    Duplicate(&'static str),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Persistence operations required by the authentication subsystem.
///
/// Every method is a single-record operation. The only conditional write is
/// [`CredentialStore::update_refresh_hash`], which must be atomic so that two
/// racing rotations of the same refresh token cannot both succeed.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new identity record with no active session.
    async fn create_user(&self, input: &CreateUser) -> Result<User, StoreError>;

    /// Look up a user by normalized username or email.
    async fn find_by_username_or_email(
        &self,
        identifier: &str,
    ) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: DbId) -> Result<Option<User>, StoreError>;

    /// Replace the password hash. Returns `false` if the user does not exist.
    async fn update_password_hash(&self, id: DbId, password_hash: &str)
        -> Result<bool, StoreError>;

    /// Overwrite the refresh-token hash regardless of its current value.
    ///
    /// Used at login, where any prior session is replaced.
    async fn set_refresh_hash(&self, id: DbId, new_hash: &str) -> Result<bool, StoreError>;

    /// Atomically replace the refresh-token hash only if it still equals
    /// `expected_old_hash`. Returns `true` if the swap happened.
    async fn update_refresh_hash(
        &self,
        id: DbId,
        expected_old_hash: &str,
        new_hash: &str,
    ) -> Result<bool, StoreError>;

    /// Clear the refresh-token hash. Idempotent.
    async fn clear_refresh_hash(&self, id: DbId) -> Result<(), StoreError>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}
