// User handlers: profiles, profile images, follow edges, user search.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::response::IntoResponse;
use axum::{Extension, Json};

use super::{json_body, read_form, ApiResult};
use crate::db::models::UserImage;
use crate::social::ProfileChanges;
use crate::web::{AppState, AuthUser};

/// GET /api/users/{username}: profile with post and follow counts.
pub async fn get_profile(State(state): State<AppState>, Path(username): Path<String>) -> ApiResult {
    let profile = state.social.profile(&username).await?;
    Ok(Json(profile).into_response())
}

/// PUT /api/users/profile: change display name and/or bio.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    body: Result<Json<ProfileChanges>, JsonRejection>,
) -> ApiResult {
    let changes = json_body(body)?;
    let user = state.social.update_profile(&auth.user_id, changes).await?;
    Ok(Json(user).into_response())
}

/// POST /api/users/avatar: multipart field `avatar`.
pub async fn upload_avatar(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult {
    let mut form = read_form(multipart).await?;
    let upload = form.take_files("avatar").into_iter().next();
    let (url, user) = state
        .social
        .set_profile_image(&auth.user_id, UserImage::Avatar, upload)
        .await?;
    Ok(Json(serde_json::json!({ "avatar": url, "user": user })).into_response())
}

/// POST /api/users/cover: multipart field `cover`.
pub async fn upload_cover(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult {
    let mut form = read_form(multipart).await?;
    let upload = form.take_files("cover").into_iter().next();
    let (url, user) = state
        .social
        .set_profile_image(&auth.user_id, UserImage::Cover, upload)
        .await?;
    Ok(Json(serde_json::json!({ "coverImage": url, "user": user })).into_response())
}

/// POST /api/users/{userId}/follow: follow or unfollow.
pub async fn toggle_follow(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(target_id): Path<String>,
) -> ApiResult {
    let following = state.social.toggle_follow(&auth.user_id, &target_id).await?;
    let message = if following {
        "Followed successfully"
    } else {
        "Unfollowed successfully"
    };
    Ok(Json(serde_json::json!({ "message": message, "isFollowing": following })).into_response())
}

/// GET /api/users/{userId}/followers
pub async fn followers(State(state): State<AppState>, Path(user_id): Path<String>) -> ApiResult {
    let users = state.social.followers(&user_id).await?;
    Ok(Json(users).into_response())
}

/// GET /api/users/{userId}/following
pub async fn following(State(state): State<AppState>, Path(user_id): Path<String>) -> ApiResult {
    let users = state.social.following(&user_id).await?;
    Ok(Json(users).into_response())
}

/// GET /api/users/search/{query}
pub async fn search(State(state): State<AppState>, Path(query): Path<String>) -> ApiResult {
    let users = state.social.search_users(&query).await?;
    Ok(Json(users).into_response())
}
