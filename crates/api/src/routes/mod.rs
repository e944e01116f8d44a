pub mod auth;
pub mod health;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/register                                   register (public)
/// /auth/login                                      login (public)
/// /auth/refresh                                    refresh (public, refresh token)
/// /auth/logout                                     logout (requires auth)
/// /auth/change-password                            change password (requires auth)
///
/// /users/me                                        current identity (requires auth)
/// /users/{username}                                channel profile (optional auth)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Authentication and session lifecycle.
        .nest("/auth", auth::router())
        // User identity and public channel profiles.
        .nest("/users", users::router())
}
