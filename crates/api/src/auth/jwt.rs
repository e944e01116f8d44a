//! Purpose-bound JWT codec plus refresh-token hashing.
//!
//! Access and refresh tokens are both HS256-signed JWTs, produced by two
//! independent [`TokenCodec`] instances with their own secret and lifetime.
//! A token signed by one codec never verifies under the other.
//!
//! Refresh tokens are additionally tracked server-side: only their SHA-256
//! hash is stored, so a database leak does not compromise active sessions.

use chrono::{DateTime, Duration, Utc};
use clipstream_core::types::DbId;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::error::VerificationError;

/// Which half of a session a codec signs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    Access,
    Refresh,
}

impl TokenPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenPurpose::Access => "access",
            TokenPurpose::Refresh => "refresh",
        }
    }
}

/// Registered claims wrapped around a purpose-specific payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims<P> {
    #[serde(flatten)]
    pub data: P,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Expiration time (UTC Unix timestamp). Invalid at and after this instant.
    pub exp: i64,
    /// Unique token identifier (UUID v4). Keeps same-second tokens distinct.
    pub jti: String,
}

/// Payload of an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPayload {
    /// Subject -- the user's internal database id.
    pub sub: DbId,
    pub username: String,
    pub email: String,
}

/// Payload of a refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshPayload {
    /// Subject -- the user's internal database id.
    pub sub: DbId,
}

pub type AccessClaims = Claims<AccessPayload>;
pub type RefreshClaims = Claims<RefreshPayload>;

/// Configuration for both token codecs.
///
/// Built once at startup (see [`crate::config::ServerConfig`]) and handed to
/// the codecs, which never read the environment themselves.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub access_secret: String,
    pub access_ttl: Duration,
    pub refresh_secret: String,
    pub refresh_ttl: Duration,
}

impl JwtConfig {
    pub fn access_codec(&self) -> TokenCodec {
        TokenCodec::new(TokenPurpose::Access, &self.access_secret, self.access_ttl)
    }

    pub fn refresh_codec(&self) -> TokenCodec {
        TokenCodec::new(TokenPurpose::Refresh, &self.refresh_secret, self.refresh_ttl)
    }
}

/// Signs and verifies time-bounded tokens for a single [`TokenPurpose`].
#[derive(Clone)]
pub struct TokenCodec {
    purpose: TokenPurpose,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("purpose", &self.purpose)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(purpose: TokenPurpose, secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked in `verify_at` so that `now == exp` already counts
        // as expired and no leeway applies.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            purpose,
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn purpose(&self) -> TokenPurpose {
        self.purpose
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign `data` with `iat = now` and `exp = now + ttl`.
    pub fn issue<P: Serialize>(&self, data: P) -> Result<String, jsonwebtoken::errors::Error> {
        self.issue_at(data, Utc::now())
    }

    /// Sign `data` as if issued at `now`.
    pub fn issue_at<P: Serialize>(
        &self,
        data: P,
        now: DateTime<Utc>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let iat = now.timestamp();
        let claims = Claims {
            data,
            iat,
            exp: iat + self.ttl.num_seconds(),
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// Verify signature and expiry, returning the embedded claims unchanged.
    pub fn verify<P: DeserializeOwned>(&self, token: &str) -> Result<Claims<P>, VerificationError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify as of `now`.
    ///
    /// The signature is checked before expiry, so a tampered token reports
    /// [`VerificationError::BadSignature`] even if it is also stale.
    pub fn verify_at<P: DeserializeOwned>(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Claims<P>, VerificationError> {
        let data = decode::<Claims<P>>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => VerificationError::BadSignature,
                ErrorKind::ExpiredSignature => VerificationError::Expired,
                _ => VerificationError::Malformed,
            }
        })?;

        if now.timestamp() >= data.claims.exp {
            return Err(VerificationError::Expired);
        }
        Ok(data.claims)
    }
}

/// Compute the SHA-256 hex digest of a refresh token.
///
/// Use this both when persisting a freshly issued token and when comparing an
/// incoming token against the stored hash.
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
