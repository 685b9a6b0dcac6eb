// Auth handlers: register, login, me, logout.
//
// Register and login both answer with `{token, user}` and also set the
// session cookie, so browser clients can skip the Authorization header.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;

use super::{json_body, ApiResult};
use crate::db::models::User;
use crate::social::validation::{FieldError, FieldErrors};
use crate::social::Registration;
use crate::web::auth::{clear_cookie_header, create_token, set_cookie_header};
use crate::web::{AppState, AuthUser};

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

/// POST /api/auth/register: create an account and sign it in.
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<Registration>, JsonRejection>,
) -> ApiResult {
    let form = json_body(body)?;
    let user = state.social.register(form).await?;
    Ok(session_response(&state, StatusCode::CREATED, user))
}

/// POST /api/auth/login: exchange email + password for a token.
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult {
    let body = json_body(body)?;

    let mut errors = FieldErrors::new();
    errors.check(required("email", &body.email));
    errors.check(required("password", &body.password));
    if !errors.is_empty() {
        return Err(errors.into());
    }

    let user = state.social.login(&body.email, &body.password).await?;
    Ok(session_response(&state, StatusCode::OK, user))
}

/// GET /api/auth/me: the signed-in user.
pub async fn me(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> ApiResult {
    let user = state.social.user(&auth.user_id).await?;
    Ok(Json(user).into_response())
}

/// POST /api/auth/logout: clear the session cookie.
pub async fn logout() -> Response {
    (
        StatusCode::OK,
        [(header::SET_COOKIE, clear_cookie_header())],
        Json(serde_json::json!({ "message": "Logged out" })),
    )
        .into_response()
}

fn session_response(state: &AppState, status: StatusCode, user: User) -> Response {
    let token = create_token(&state.config.session_secret, &user.id);
    // TLS terminates at the proxy in front of us, so the cookie is never
    // marked Secure here.
    let cookie = set_cookie_header(&token, false);
    (
        status,
        [(header::SET_COOKIE, cookie)],
        Json(serde_json::json!({ "token": token, "user": user })),
    )
        .into_response()
}

fn required(field: &'static str, value: &str) -> Result<(), FieldError> {
    if value.trim().is_empty() {
        return Err(FieldError {
            field,
            message: format!("{} is required", capitalize(field)),
        });
    }
    Ok(())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
