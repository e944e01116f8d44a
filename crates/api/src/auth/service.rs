//! Session issuance, rotation, and access-token resolution.
//!
//! [`AuthService`] owns the password hasher and both token codecs and talks to
//! persistence only through [`CredentialStore`]. Each user has a single session
//! slot: the SHA-256 hash of the one refresh token currently accepted.

use std::sync::Arc;

use clipstream_core::error::CoreError;
use clipstream_core::identity::{is_email_like, normalize_identifier};
use clipstream_core::types::DbId;
use clipstream_db::models::user::{CreateUser, Identity, User};
use clipstream_db::store::CredentialStore;
use serde::Serialize;
use tokio::sync::OnceCell;
use validator::Validate;

use super::error::{AuthError, HashingError};
use super::jwt::{
    hash_refresh_token, AccessPayload, JwtConfig, RefreshClaims, RefreshPayload, TokenCodec,
};
use super::password::{validate_password_strength, PasswordHasher};
use crate::error::{AppError, AppResult};

/// Default minimum password length for registration and password changes.
pub const DEFAULT_PASSWORD_MIN_LENGTH: usize = 8;

/// Verified against on unknown-user logins so both failures cost one Argon2 run.
const DUMMY_PASSWORD: &str = "clipstream-dummy-password";

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Result of a successful login or refresh.
#[derive(Debug, Clone)]
pub struct Session {
    pub tokens: TokenPair,
    pub identity: Identity,
}

/// Input for [`AuthService::register`].
#[derive(Debug, Clone, Validate)]
pub struct NewAccount {
    #[validate(length(min = 3, max = 32, message = "Username must be 3-32 characters"))]
    pub username: String,
    #[validate(email(message = "Email address is not valid"))]
    pub email: String,
    #[validate(length(min = 1, max = 128, message = "Full name must not be empty"))]
    pub full_name: String,
    #[validate(url(message = "Avatar must be a URL"))]
    pub avatar_url: Option<String>,
    pub password: String,
}

/// Authentication and session-lifecycle operations.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    access: TokenCodec,
    refresh: TokenCodec,
    password_min_length: usize,
    dummy_hash: OnceCell<String>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        jwt: &JwtConfig,
        password_min_length: usize,
    ) -> Self {
        Self {
            store,
            hasher,
            access: jwt.access_codec(),
            refresh: jwt.refresh_codec(),
            password_min_length,
            dummy_hash: OnceCell::new(),
        }
    }

    pub fn store(&self) -> &dyn CredentialStore {
        self.store.as_ref()
    }

    /// Access token lifetime in seconds.
    pub fn access_ttl_secs(&self) -> i64 {
        self.access.ttl().num_seconds()
    }

    pub fn access_ttl(&self) -> chrono::Duration {
        self.access.ttl()
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        self.refresh.ttl()
    }

    // -----------------------------------------------------------------------
    // Session lifecycle
    // -----------------------------------------------------------------------

    /// Authenticate by username or email and open a new session.
    ///
    /// Any previously active refresh token for the user stops working.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<Session, AuthError> {
        let identifier = normalize_identifier(identifier);
        let Some(user) = self.store.find_by_username_or_email(&identifier).await? else {
            let dummy = self.dummy_hash().await?;
            self.verify_password(password, dummy).await?;
            tracing::info!(reason = "not_found", "Login rejected");
            return Err(AuthError::NotFound);
        };

        if !self.verify_password(password, &user.password_hash).await? {
            tracing::info!(user_id = user.id, reason = "bad_credentials", "Login rejected");
            return Err(AuthError::BadCredentials);
        }

        let session = self.open_session(&user, None).await?;
        tracing::info!(user_id = user.id, "User logged in");
        Ok(session)
    }

    /// Exchange a refresh token for a new pair, invalidating the presented one.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let claims: RefreshClaims = self.refresh.verify(refresh_token).map_err(|e| {
            tracing::debug!(error = %e, "Refresh token failed verification");
            AuthError::InvalidToken
        })?;

        let user = self
            .store
            .find_by_id(claims.data.sub)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let presented_hash = hash_refresh_token(refresh_token);
        if user.refresh_token_hash.as_deref() != Some(presented_hash.as_str()) {
            tracing::warn!(user_id = user.id, reason = "token_reused", "Refresh rejected");
            return Err(AuthError::TokenReused);
        }

        let session = self.open_session(&user, Some(&presented_hash)).await?;
        tracing::info!(user_id = user.id, "Session rotated");
        Ok(session)
    }

    /// Close the user's session. Logging out twice is a no-op.
    pub async fn logout(&self, user_id: DbId) -> Result<(), AuthError> {
        self.store.clear_refresh_hash(user_id).await?;
        tracing::info!(user_id, "User logged out");
        Ok(())
    }

    /// Resolve an access token to the identity it names.
    pub async fn authenticate(&self, access_token: &str) -> Result<Identity, AuthError> {
        let claims = self
            .access
            .verify::<AccessPayload>(access_token)
            .map_err(|e| {
                tracing::debug!(error = %e, "Access token failed verification");
                AuthError::InvalidToken
            })?;

        let user = self
            .store
            .find_by_id(claims.data.sub)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        Ok(Identity::from(user))
    }

    /// Issue a new pair for `user` and record the refresh hash.
    ///
    /// With `rotating_from = None` (login) the stored hash is overwritten
    /// unconditionally. With `Some(old)` (refresh) the write is a
    /// compare-and-set against `old`; losing that race means another request
    /// already rotated this token, which is reported as [`AuthError::TokenReused`].
    async fn open_session(
        &self,
        user: &User,
        rotating_from: Option<&str>,
    ) -> Result<Session, AuthError> {
        let access_token = self
            .access
            .issue(AccessPayload {
                sub: user.id,
                username: user.username.clone(),
                email: user.email.clone(),
            })
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        let refresh_token = self
            .refresh
            .issue(RefreshPayload { sub: user.id })
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        let new_hash = hash_refresh_token(&refresh_token);

        let written = match rotating_from {
            None => self.store.set_refresh_hash(user.id, &new_hash).await?,
            Some(old_hash) => {
                let swapped = self
                    .store
                    .update_refresh_hash(user.id, old_hash, &new_hash)
                    .await?;
                if !swapped {
                    tracing::warn!(
                        user_id = user.id,
                        reason = "token_reused",
                        "Concurrent refresh lost the rotation race"
                    );
                    return Err(AuthError::TokenReused);
                }
                true
            }
        };
        if !written {
            return Err(AuthError::UserNotFound);
        }

        Ok(Session {
            tokens: TokenPair {
                access_token,
                refresh_token,
            },
            identity: Identity::from(user),
        })
    }

    // -----------------------------------------------------------------------
    // Account management
    // -----------------------------------------------------------------------

    /// Create a new account. The password is hashed exactly once, here.
    pub async fn register(&self, account: NewAccount) -> AppResult<Identity> {
        let account = NewAccount {
            username: normalize_identifier(&account.username),
            email: normalize_identifier(&account.email),
            full_name: account.full_name.trim().to_string(),
            ..account
        };
        account
            .validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;
        if is_email_like(&account.username) {
            return Err(CoreError::Validation("Username must not contain '@'".into()).into());
        }
        validate_password_strength(&account.password, self.password_min_length)
            .map_err(CoreError::Validation)?;

        let password_hash = self.hash_password(&account.password).await?;
        let user = self
            .store
            .create_user(&CreateUser {
                username: account.username,
                email: account.email,
                full_name: account.full_name,
                avatar_url: account.avatar_url,
                password_hash,
            })
            .await?;

        tracing::info!(user_id = user.id, "User registered");
        Ok(Identity::from(user))
    }

    /// Replace the password after checking the current one.
    pub async fn change_password(
        &self,
        user_id: DbId,
        old_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !self.verify_password(old_password, &user.password_hash).await? {
            tracing::info!(user_id, reason = "bad_credentials", "Password change rejected");
            return Err(AuthError::BadCredentials.into());
        }
        validate_password_strength(new_password, self.password_min_length)
            .map_err(CoreError::Validation)?;

        let password_hash = self.hash_password(new_password).await?;
        if !self.store.update_password_hash(user_id, &password_hash).await? {
            return Err(AppError::Auth(AuthError::UserNotFound));
        }
        tracing::info!(user_id, "Password changed");
        Ok(())
    }

    /// Look up the public profile for `username`.
    pub async fn find_profile(&self, username: &str) -> Result<Option<Identity>, AuthError> {
        let user = self
            .store
            .find_by_username_or_email(&normalize_identifier(username))
            .await?;
        Ok(user.map(Identity::from))
    }

    // -----------------------------------------------------------------------
    // Hashing off the async executor
    // -----------------------------------------------------------------------

    async fn hash_password(&self, password: &str) -> Result<String, HashingError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| HashingError(e.to_string()))?
    }

    async fn dummy_hash(&self) -> Result<&str, HashingError> {
        let hash = self
            .dummy_hash
            .get_or_try_init(|| self.hash_password(DUMMY_PASSWORD))
            .await?;
        Ok(hash.as_str())
    }

    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, HashingError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| HashingError(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::HasherConfig;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use clipstream_db::store::{InMemoryCredentialStore, StoreError};

    const PASSWORD: &str = "wonderland-42";

    fn jwt_config(access_ttl: Duration) -> JwtConfig {
        JwtConfig {
            access_secret: "test-access-secret".to_string(),
            access_ttl,
            refresh_secret: "test-refresh-secret".to_string(),
            refresh_ttl: Duration::days(10),
        }
    }

    fn fast_hasher() -> PasswordHasher {
        PasswordHasher::new(HasherConfig {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    async fn service_with(access_ttl: Duration) -> (AuthService, Arc<InMemoryCredentialStore>) {
        let store = Arc::new(InMemoryCredentialStore::new());
        let service = AuthService::new(
            store.clone(),
            fast_hasher(),
            &jwt_config(access_ttl),
            DEFAULT_PASSWORD_MIN_LENGTH,
        );
        service
            .register(NewAccount {
                username: "Alice".to_string(),
                email: "Alice@Example.com".to_string(),
                full_name: "Alice Liddell".to_string(),
                avatar_url: None,
                password: PASSWORD.to_string(),
            })
            .await
            .expect("registration should succeed");
        (service, store)
    }

    async fn service() -> (AuthService, Arc<InMemoryCredentialStore>) {
        service_with(Duration::minutes(15)).await
    }

    #[tokio::test]
    async fn test_login_by_username_or_email_case_insensitive() {
        let (service, store) = service().await;

        let by_name = service.login("  ALICE ", PASSWORD).await.unwrap();
        assert_eq!(by_name.identity.username, "alice");

        let by_email = service.login("alice@example.com", PASSWORD).await.unwrap();
        assert_eq!(by_email.identity.id, by_name.identity.id);

        // Only the latest login's refresh token is stored.
        assert_eq!(
            store.refresh_hash_of(by_email.identity.id),
            Some(hash_refresh_token(&by_email.tokens.refresh_token))
        );
    }

    #[tokio::test]
    async fn test_login_failures_are_distinguishable() {
        let (service, _) = service().await;
        assert_matches!(
            service.login("ghost", PASSWORD).await,
            Err(AuthError::NotFound)
        );
        assert_matches!(
            service.login("alice", "wrong-password").await,
            Err(AuthError::BadCredentials)
        );
    }

    #[tokio::test]
    async fn test_unknown_user_login_still_verifies_a_hash() {
        let (service, _) = service().await;
        assert!(service.dummy_hash.get().is_none());

        assert_matches!(
            service.login("ghost", PASSWORD).await,
            Err(AuthError::NotFound)
        );
        let dummy = service.dummy_hash.get().expect("dummy hash computed");
        assert!(dummy.starts_with("$argon2id$"));

        // Reused on later misses.
        service.login("nobody", PASSWORD).await.unwrap_err();
        assert_eq!(service.dummy_hash.get(), Some(dummy));
    }

    #[tokio::test]
    async fn test_authenticate_resolves_identity() {
        let (service, _) = service().await;
        let session = service.login("alice", PASSWORD).await.unwrap();

        let identity = service
            .authenticate(&session.tokens.access_token)
            .await
            .unwrap();
        assert_eq!(identity, session.identity);
        assert_eq!(identity.full_name, "Alice Liddell");
    }

    #[tokio::test]
    async fn test_refresh_token_is_not_an_access_token() {
        let (service, _) = service().await;
        let session = service.login("alice", PASSWORD).await.unwrap();

        assert_matches!(
            service.authenticate(&session.tokens.refresh_token).await,
            Err(AuthError::InvalidToken)
        );
        assert_matches!(
            service.refresh(&session.tokens.access_token).await,
            Err(AuthError::InvalidToken)
        );
    }

    #[tokio::test]
    async fn test_deleted_user_token_is_user_not_found() {
        let (service, store) = service().await;
        let session = service.login("alice", PASSWORD).await.unwrap();
        assert!(store.remove(session.identity.id));

        assert_matches!(
            service.authenticate(&session.tokens.access_token).await,
            Err(AuthError::UserNotFound)
        );
        assert_matches!(
            service.refresh(&session.tokens.refresh_token).await,
            Err(AuthError::UserNotFound)
        );
    }

    #[tokio::test]
    async fn test_rotation_invalidates_previous_refresh_token() {
        let (service, _) = service().await;
        let first = service.login("alice", PASSWORD).await.unwrap();

        let second = service.refresh(&first.tokens.refresh_token).await.unwrap();
        assert_ne!(second.tokens.refresh_token, first.tokens.refresh_token);

        assert_matches!(
            service.refresh(&first.tokens.refresh_token).await,
            Err(AuthError::TokenReused)
        );
        let third = service.refresh(&second.tokens.refresh_token).await;
        assert!(third.is_ok(), "the rotated token must remain usable");
    }

    #[tokio::test]
    async fn test_new_login_invalidates_previous_session() {
        let (service, _) = service().await;
        let first = service.login("alice", PASSWORD).await.unwrap();
        let _second = service.login("alice", PASSWORD).await.unwrap();

        assert_matches!(
            service.refresh(&first.tokens.refresh_token).await,
            Err(AuthError::TokenReused)
        );
    }

    #[tokio::test]
    async fn test_logout_invalidates_refresh_token_and_is_idempotent() {
        let (service, store) = service().await;
        let session = service.login("alice", PASSWORD).await.unwrap();

        service.logout(session.identity.id).await.unwrap();
        service.logout(session.identity.id).await.unwrap();
        assert!(store.refresh_hash_of(session.identity.id).is_none());

        assert_matches!(
            service.refresh(&session.tokens.refresh_token).await,
            Err(AuthError::TokenReused)
        );
    }

    /// Delegating store that lets a rival rotation land between the
    /// refresh flow's read of the user and its compare-and-set.
    struct InterleavingStore {
        inner: Arc<InMemoryCredentialStore>,
        rival_hash: std::sync::Mutex<Option<String>>,
    }

    #[async_trait::async_trait]
    impl CredentialStore for InterleavingStore {
        async fn create_user(&self, input: &CreateUser) -> Result<User, StoreError> {
            self.inner.create_user(input).await
        }

        async fn find_by_username_or_email(
            &self,
            identifier: &str,
        ) -> Result<Option<User>, StoreError> {
            self.inner.find_by_username_or_email(identifier).await
        }

        async fn find_by_id(&self, id: DbId) -> Result<Option<User>, StoreError> {
            let user = self.inner.find_by_id(id).await?;
            let rival = self.rival_hash.lock().unwrap().take();
            if let Some(hash) = rival {
                self.inner.set_refresh_hash(id, &hash).await?;
            }
            Ok(user)
        }

        async fn update_password_hash(
            &self,
            id: DbId,
            password_hash: &str,
        ) -> Result<bool, StoreError> {
            self.inner.update_password_hash(id, password_hash).await
        }

        async fn set_refresh_hash(&self, id: DbId, new_hash: &str) -> Result<bool, StoreError> {
            self.inner.set_refresh_hash(id, new_hash).await
        }

        async fn update_refresh_hash(
            &self,
            id: DbId,
            expected_old_hash: &str,
            new_hash: &str,
        ) -> Result<bool, StoreError> {
            self.inner
                .update_refresh_hash(id, expected_old_hash, new_hash)
                .await
        }

        async fn clear_refresh_hash(&self, id: DbId) -> Result<(), StoreError> {
            self.inner.clear_refresh_hash(id).await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            self.inner.ping().await
        }
    }

    #[tokio::test]
    async fn test_refresh_loses_rotation_race() {
        let inner = Arc::new(InMemoryCredentialStore::new());
        let store = Arc::new(InterleavingStore {
            inner: inner.clone(),
            rival_hash: std::sync::Mutex::new(None),
        });
        let service = AuthService::new(
            store.clone(),
            fast_hasher(),
            &jwt_config(Duration::minutes(15)),
            DEFAULT_PASSWORD_MIN_LENGTH,
        );
        service
            .register(NewAccount {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                full_name: "Alice Liddell".to_string(),
                avatar_url: None,
                password: PASSWORD.to_string(),
            })
            .await
            .unwrap();
        let session = service.login("alice", PASSWORD).await.unwrap();
        let id = session.identity.id;

        // The stale read still carries the presented hash, so only the
        // compare-and-set can notice the rival rotation.
        *store.rival_hash.lock().unwrap() = Some("rival-hash".to_string());
        assert_matches!(
            service.refresh(&session.tokens.refresh_token).await,
            Err(AuthError::TokenReused)
        );
        assert_eq!(inner.refresh_hash_of(id).as_deref(), Some("rival-hash"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_refresh_has_one_winner() {
        let (service, _) = service().await;
        let service = Arc::new(service);
        let session = service.login("alice", PASSWORD).await.unwrap();
        let token = session.tokens.refresh_token;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                let token = token.clone();
                tokio::spawn(async move { service.refresh(&token).await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(e) => assert_matches!(e, AuthError::TokenReused),
            }
        }
        assert_eq!(winners, 1, "exactly one racing rotation may succeed");
    }

    #[tokio::test]
    async fn test_expired_access_token_is_invalid() {
        let (service, _) = service_with(Duration::seconds(1)).await;
        let session = service.login("alice", PASSWORD).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        assert_matches!(
            service.authenticate(&session.tokens.access_token).await,
            Err(AuthError::InvalidToken)
        );
        // The refresh token outlives the access token.
        assert!(service.refresh(&session.tokens.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_bad_input() {
        let (service, _) = service().await;
        let account = |username: &str, email: &str, password: &str| NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            full_name: "Someone".to_string(),
            avatar_url: None,
            password: password.to_string(),
        };

        assert_matches!(
            service
                .register(account("alice", "other@example.com", PASSWORD))
                .await,
            Err(AppError::Store(_))
        );
        assert_matches!(
            service
                .register(account("bob", "not-an-email", PASSWORD))
                .await,
            Err(AppError::Core(CoreError::Validation(_)))
        );
        assert_matches!(
            service
                .register(account("bob", "bob@example.com", "short"))
                .await,
            Err(AppError::Core(CoreError::Validation(_)))
        );
        assert_matches!(
            service
                .register(account("bob@x", "bob@example.com", PASSWORD))
                .await,
            Err(AppError::Core(CoreError::Validation(_)))
        );
    }

    #[tokio::test]
    async fn test_change_password_requires_current_password() {
        let (service, _) = service().await;
        let id = service.login("alice", PASSWORD).await.unwrap().identity.id;

        assert_matches!(
            service.change_password(id, "nope-nope", "brand-new-pass").await,
            Err(AppError::Auth(AuthError::BadCredentials))
        );

        service
            .change_password(id, PASSWORD, "brand-new-pass")
            .await
            .unwrap();
        assert_matches!(
            service.login("alice", PASSWORD).await,
            Err(AuthError::BadCredentials)
        );
        assert!(service.login("alice", "brand-new-pass").await.is_ok());
    }
}
