// Post handlers: create, timelines, threads, likes, delete, search.
//
// Timelines take `?page=N` (1-based, 20 per page). Anything unparseable
// falls back to page 1 rather than failing the request.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Deserialize;

use super::{read_form, ApiResult};
use crate::social::{Page, PostDraft};
use crate::web::{AppState, AuthUser};

#[derive(Deserialize, Default)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    fn page(&self) -> Page {
        Page::from_param(self.page.as_deref())
    }
}

/// POST /api/posts: multipart `content`, optional `replyTo`, up to four
/// `images`.
pub async fn create_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult {
    let mut form = read_form(multipart).await?;
    let draft = PostDraft {
        content: form.text("content").unwrap_or_default().to_string(),
        reply_to: form.text("replyTo").map(str::to_string),
        images: form.take_files("images"),
    };

    let post = state.social.create_post(&auth.user_id, draft).await?;
    Ok((StatusCode::CREATED, Json(post)).into_response())
}

/// GET /api/posts/feed: the caller's home timeline.
pub async fn feed(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<PageQuery>,
) -> ApiResult {
    let posts = state.social.feed(&auth.user_id, params.page()).await?;
    Ok(Json(posts).into_response())
}

/// GET /api/posts/explore: every top-level post, newest first.
pub async fn explore(State(state): State<AppState>, Query(params): Query<PageQuery>) -> ApiResult {
    let posts = state.social.explore(params.page()).await?;
    Ok(Json(posts).into_response())
}

/// GET /api/posts/user/{username}
pub async fn user_posts(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(params): Query<PageQuery>,
) -> ApiResult {
    let posts = state.social.user_posts(&username, params.page()).await?;
    Ok(Json(posts).into_response())
}

/// GET /api/posts/{postId}
pub async fn get_post(State(state): State<AppState>, Path(post_id): Path<String>) -> ApiResult {
    let post = state.social.post(&post_id).await?;
    Ok(Json(post).into_response())
}

/// GET /api/posts/{postId}/replies
pub async fn replies(State(state): State<AppState>, Path(post_id): Path<String>) -> ApiResult {
    let posts = state.social.replies(&post_id).await?;
    Ok(Json(posts).into_response())
}

/// POST /api/posts/{postId}/like: like or unlike.
pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(post_id): Path<String>,
) -> ApiResult {
    let toggle = state.social.toggle_like(&post_id, &auth.user_id).await?;
    let message = if toggle.liked { "Post liked" } else { "Post unliked" };
    Ok(Json(serde_json::json!({
        "message": message,
        "isLiked": toggle.liked,
        "likesCount": toggle.likes_count,
    }))
    .into_response())
}

/// DELETE /api/posts/{postId}: author only.
pub async fn delete_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(post_id): Path<String>,
) -> ApiResult {
    state.social.delete_post(&post_id, &auth.user_id).await?;
    Ok(Json(serde_json::json!({ "message": "Post deleted successfully" })).into_response())
}

/// GET /api/posts/search/{query}
pub async fn search(State(state): State<AppState>, Path(query): Path<String>) -> ApiResult {
    let posts = state.social.search_posts(&query).await?;
    Ok(Json(posts).into_response())
}
