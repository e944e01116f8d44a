//! Handlers for the `/auth` resource (register, login, refresh, logout, password).

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use clipstream_db::models::user::Identity;
use serde::{Deserialize, Serialize};

use crate::auth::cookies::{with_session_cookies, without_session_cookies, REFRESH_TOKEN_COOKIE};
use crate::auth::error::AuthError;
use crate::auth::service::{NewAccount, Session};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/register`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub password: String,
}

/// Request body for `POST /auth/login`. `identifier` may be a username or email.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "username", alias = "email")]
    pub identifier: String,
    pub password: String,
}

/// Optional request body for `POST /auth/refresh`; the cookie wins if both are sent.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// Request body for `POST /auth/change-password`.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Successful authentication response returned by login and refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: Identity,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/register
///
/// Create an account. Does not log the new user in.
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<Identity>>)> {
    let identity = state
        .auth
        .register(NewAccount {
            username: input.username,
            email: input.email,
            full_name: input.full_name,
            avatar_url: input.avatar_url,
            password: input.password,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: identity })))
}

/// POST /api/v1/auth/login
///
/// Authenticate with username or email + password. Sets both session cookies
/// and also returns the tokens in the body.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(input): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let session = state.auth.login(&input.identifier, &input.password).await?;
    Ok(session_response(&state, jar, session))
}

/// POST /api/v1/auth/refresh
///
/// Exchange the refresh token (from the `refreshToken` cookie, or the
/// `refresh_token` body field) for a new pair. The presented token is
/// invalidated.
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let from_cookie = jar
        .get(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());

    let token = match from_cookie {
        Some(token) => token,
        None => refresh_token_from_body(&body)?.ok_or(AuthError::MissingToken)?,
    };

    let session = state.auth.refresh(&token).await?;
    Ok(session_response(&state, jar, session))
}

/// POST /api/v1/auth/logout
///
/// Clear the stored session and both cookies. Returns 204 No Content.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    AuthUser(user): AuthUser,
) -> AppResult<(CookieJar, StatusCode)> {
    state.auth.logout(user.id).await?;
    let jar = without_session_cookies(jar, state.cookie_settings());
    Ok((jar, StatusCode::NO_CONTENT))
}

/// POST /api/v1/auth/change-password
///
/// Replace the caller's password after checking the current one.
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(input): Json<ChangePasswordRequest>,
) -> AppResult<StatusCode> {
    state
        .auth
        .change_password(user.id, &input.old_password, &input.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn session_response(
    state: &AppState,
    jar: CookieJar,
    session: Session,
) -> (CookieJar, Json<AuthResponse>) {
    let jar = with_session_cookies(jar, &session.tokens, state.cookie_settings());
    let response = AuthResponse {
        access_token: session.tokens.access_token,
        refresh_token: session.tokens.refresh_token,
        expires_in: state.auth.access_ttl_secs(),
        user: session.identity,
    };
    (jar, Json(response))
}

/// An empty body is allowed; a non-empty one must be a valid [`RefreshRequest`].
fn refresh_token_from_body(body: &Bytes) -> AppResult<Option<String>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let request: RefreshRequest = serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid refresh request body: {e}")))?;
    Ok(request.refresh_token.filter(|t| !t.is_empty()))
}
