//! Authentication gates as Axum extractors.
//!
//! Both gates run the same pipeline: extract the access token (cookie first,
//! then `Authorization: Bearer`), verify it, and resolve the subject against the
//! credential store. They differ only in how a failure is handled, which
//! [`GatePolicy::decide`] captures as a three-way [`GateDecision`].

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;
use clipstream_db::models::user::Identity;

use crate::auth::cookies::ACCESS_TOKEN_COOKIE;
use crate::auth::error::AuthError;
use crate::auth::service::AuthService;
use crate::error::AppError;
use crate::state::AppState;

/// How a gate treats a request that fails authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePolicy {
    /// Halt the request with an unauthorized response.
    Required,
    /// Continue without an identity.
    Optional,
}

/// Outcome of running a gate.
#[derive(Debug)]
pub enum GateDecision {
    /// Continue with this identity attached.
    Attach(Identity),
    /// Continue with no identity attached.
    Proceed,
    /// Stop processing; no downstream handler runs.
    Halt(AuthError),
}

impl GatePolicy {
    pub fn decide(self, outcome: Result<Identity, AuthError>) -> GateDecision {
        match (self, outcome) {
            (_, Ok(identity)) => GateDecision::Attach(identity),
            (GatePolicy::Required, Err(err)) => {
                if err.is_internal() {
                    tracing::error!(error = %err, "Authentication failed internally");
                } else {
                    tracing::debug!(reason = err.reason(), "Request rejected by auth gate");
                }
                GateDecision::Halt(err)
            }
            (GatePolicy::Optional, Err(err)) => {
                if err.is_internal() {
                    tracing::warn!(error = %err, "Optional auth degraded to anonymous");
                } else {
                    tracing::trace!(reason = err.reason(), "Proceeding without identity");
                }
                GateDecision::Proceed
            }
        }
    }
}

/// Pull the access token from the request, preferring the cookie.
pub fn extract_access_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(ACCESS_TOKEN_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
}

/// Shared gate pipeline: extract, verify, resolve.
pub async fn resolve_identity(headers: &HeaderMap, auth: &AuthService) -> Result<Identity, AuthError> {
    let token = extract_access_token(headers).ok_or(AuthError::MissingToken)?;
    auth.authenticate(&token).await
}

/// Run `policy` against the request and attach any resolved identity to the
/// request extensions for later layers.
pub async fn run_gate(parts: &mut Parts, auth: &AuthService, policy: GatePolicy) -> GateDecision {
    let decision = policy.decide(resolve_identity(&parts.headers, auth).await);
    if let GateDecision::Attach(identity) = &decision {
        parts.extensions.insert(identity.clone());
    }
    decision
}

/// Authenticated user resolved from a valid access token.
///
/// Use this as an extractor parameter in any handler that requires authentication:
///
/// ```ignore
/// async fn my_handler(AuthUser(user): AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = user.id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match run_gate(parts, &state.auth, GatePolicy::Required).await {
            GateDecision::Attach(identity) => Ok(AuthUser(identity)),
            GateDecision::Halt(err) => Err(AppError::Auth(err)),
            GateDecision::Proceed => Err(AppError::Auth(AuthError::MissingToken)),
        }
    }
}

/// Identity if the request carried a valid access token, `None` otherwise.
///
/// Never rejects: missing, expired, tampered, or orphaned tokens and store
/// failures all yield `MaybeAuthUser(None)`.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<Identity>);

impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match run_gate(parts, &state.auth, GatePolicy::Optional).await {
            GateDecision::Attach(identity) => Ok(MaybeAuthUser(Some(identity))),
            GateDecision::Proceed | GateDecision::Halt(_) => Ok(MaybeAuthUser(None)),
        }
    }
}
