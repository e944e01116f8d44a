//! Handlers for the `/users` resource.

use axum::extract::{Path, State};
use axum::Json;
use clipstream_core::error::CoreError;
use clipstream_core::identity::normalize_identifier;
use clipstream_core::types::DbId;
use clipstream_db::models::user::Identity;
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::auth::{AuthUser, MaybeAuthUser};
use crate::response::DataResponse;
use crate::state::AppState;

/// Public channel view of a user.
#[derive(Debug, Serialize)]
pub struct ChannelProfile {
    pub id: DbId,
    pub username: String,
    pub full_name: String,
    pub avatar: Option<String>,
    /// `true` when the caller is looking at their own channel.
    pub is_self: bool,
}

/// GET /api/v1/users/me
pub async fn me(AuthUser(user): AuthUser) -> Json<DataResponse<Identity>> {
    Json(DataResponse { data: user })
}

/// GET /api/v1/users/{username}
///
/// Accessible anonymously; the response differs only in `is_self`.
pub async fn channel_profile(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(username): Path<String>,
) -> AppResult<Json<DataResponse<ChannelProfile>>> {
    let username = normalize_identifier(&username);
    // The store matches emails too; channels are addressed by username only.
    let owner = state
        .auth
        .find_profile(&username)
        .await?
        .filter(|u| u.username == username)
        .ok_or_else(|| CoreError::NotFound {
            entity: "Channel",
            key: username.clone(),
        })?;

    let is_self = viewer.is_some_and(|v| v.id == owner.id);
    Ok(Json(DataResponse {
        data: ChannelProfile {
            id: owner.id,
            username: owner.username,
            full_name: owner.full_name,
            avatar: owner.avatar,
            is_self,
        },
    }))
}
