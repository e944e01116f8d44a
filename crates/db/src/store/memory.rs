use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use clipstream_core::types::DbId;

use super::{CredentialStore, StoreError};
use crate::models::user::{CreateUser, User};

#[derive(Debug, Default)]
struct Inner {
    next_id: DbId,
    users: HashMap<DbId, User>,
}

/// Process-local [`CredentialStore`].
///
/// A single mutex guards the whole map, so every operation (including the
/// refresh-hash compare-and-set) is atomic with respect to the others.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    inner: Mutex<Inner>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove a user outright. Returns `true` if the user existed.
    pub fn remove(&self, id: DbId) -> bool {
        self.lock().users.remove(&id).is_some()
    }

    /// Current refresh-token hash for `id`, if the user exists and has one.
    pub fn refresh_hash_of(&self, id: DbId) -> Option<String> {
        self.lock()
            .users
            .get(&id)
            .and_then(|u| u.refresh_token_hash.clone())
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn create_user(&self, input: &CreateUser) -> Result<User, StoreError> {
        let mut inner = self.lock();
        if inner.users.values().any(|u| u.username == input.username) {
            return Err(StoreError::Duplicate("username"));
        }
        if inner.users.values().any(|u| u.email == input.email) {
            return Err(StoreError::Duplicate("email"));
        }

        inner.next_id += 1;
        let now = Utc::now();
        let user = User {
            id: inner.next_id,
            username: input.username.clone(),
            email: input.email.clone(),
            full_name: input.full_name.clone(),
            avatar_url: input.avatar_url.clone(),
            password_hash: input.password_hash.clone(),
            refresh_token_hash: None,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_username_or_email(
        &self,
        identifier: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|u| u.username == identifier || u.email == identifier)
            .cloned())
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn update_password_hash(
        &self,
        id: DbId,
        password_hash: &str,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let Some(user) = inner.users.get_mut(&id) else {
            return Ok(false);
        };
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_refresh_hash(&self, id: DbId, new_hash: &str) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let Some(user) = inner.users.get_mut(&id) else {
            return Ok(false);
        };
        user.refresh_token_hash = Some(new_hash.to_string());
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn update_refresh_hash(
        &self,
        id: DbId,
        expected_old_hash: &str,
        new_hash: &str,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let Some(user) = inner.users.get_mut(&id) else {
            return Ok(false);
        };
        if user.refresh_token_hash.as_deref() != Some(expected_old_hash) {
            return Ok(false);
        }
        user.refresh_token_hash = Some(new_hash.to_string());
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn clear_refresh_hash(&self, id: DbId) -> Result<(), StoreError> {
        if let Some(user) = self.lock().users.get_mut(&id) {
            user.refresh_token_hash = None;
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
