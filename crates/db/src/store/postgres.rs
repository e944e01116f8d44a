use async_trait::async_trait;
use clipstream_core::types::DbId;

use super::{CredentialStore, StoreError};
use crate::models::user::{CreateUser, User};
use crate::repositories::UserRepo;
use crate::DbPool;

/// PostgreSQL error code for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

/// [`CredentialStore`] backed by the `users` table.
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: DbPool,
}

impl PgCredentialStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Translate unique violations on `uq_users_*` into [`StoreError::Duplicate`].
fn classify_insert_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            match db_err.constraint() {
                Some("uq_users_username") => return StoreError::Duplicate("username"),
                Some("uq_users_email") => return StoreError::Duplicate("email"),
                _ => {}
            }
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create_user(&self, input: &CreateUser) -> Result<User, StoreError> {
        UserRepo::create(&self.pool, input)
            .await
            .map_err(classify_insert_error)
    }

    async fn find_by_username_or_email(
        &self,
        identifier: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(UserRepo::find_by_username_or_email(&self.pool, identifier).await?)
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<User>, StoreError> {
        Ok(UserRepo::find_by_id(&self.pool, id).await?)
    }

    async fn update_password_hash(
        &self,
        id: DbId,
        password_hash: &str,
    ) -> Result<bool, StoreError> {
        Ok(UserRepo::update_password(&self.pool, id, password_hash).await?)
    }

    async fn set_refresh_hash(&self, id: DbId, new_hash: &str) -> Result<bool, StoreError> {
        Ok(UserRepo::set_refresh_hash(&self.pool, id, new_hash).await?)
    }

    async fn update_refresh_hash(
        &self,
        id: DbId,
        expected_old_hash: &str,
        new_hash: &str,
    ) -> Result<bool, StoreError> {
        Ok(UserRepo::swap_refresh_hash(&self.pool, id, Some(expected_old_hash), new_hash).await?)
    }

    async fn clear_refresh_hash(&self, id: DbId) -> Result<(), StoreError> {
        Ok(UserRepo::clear_refresh_hash(&self.pool, id).await?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(crate::health_check(&self.pool).await?)
    }
}
