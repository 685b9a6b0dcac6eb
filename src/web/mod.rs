// Web server: Axum-based JSON API for the web client.
//
// All /api/* routes serve JSON. Uploaded images are served as static files
// under /uploads, and GET /api/events is a server-sent event stream of
// feed activity.
//
// Auth: stateless HMAC-SHA256 tokens. No session table in the DB.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::db::Database;
use crate::events::EventHub;
use crate::media::{LocalMediaStore, MAX_IMAGE_BYTES, MAX_POST_IMAGES, PUBLIC_PREFIX};
use crate::social::{Social, SocialError};

pub mod auth;
pub mod handlers;

/// Room for multipart framing and text fields around the files.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared application state threaded through all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub social: Social,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire the social service to local image storage and a fresh event hub.
    pub fn new(config: Config, db: Arc<dyn Database>) -> Self {
        let media = Arc::new(LocalMediaStore::new(config.upload_dir.clone()));
        let social = Social::new(db, media, EventHub::default());
        Self {
            social,
            config: Arc::new(config),
        }
    }
}

/// Start the Axum web server and block until it exits.
pub async fn run_server(config: Config, db: Arc<dyn Database>, port: u16, bind: &str) -> Result<()> {
    tokio::fs::create_dir_all(&config.upload_dir).await?;
    let state = AppState::new(config, db);
    let app = build_router(state);

    let addr = format!("{bind}:{port}");
    info!("Binaried API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let image_limit = DefaultBodyLimit::max(MAX_IMAGE_BYTES + FORM_OVERHEAD_BYTES);
    let post_limit = DefaultBodyLimit::max(MAX_POST_IMAGES * MAX_IMAGE_BYTES + FORM_OVERHEAD_BYTES);

    // Authenticated API routes (require a valid token)
    let protected_api = Router::new()
        .route("/api/auth/me", get(handlers::auth::me))
        .route("/api/users/profile", put(handlers::users::update_profile))
        .route(
            "/api/users/avatar",
            post(handlers::users::upload_avatar).layer(image_limit),
        )
        .route(
            "/api/users/cover",
            post(handlers::users::upload_cover).layer(image_limit),
        )
        .route("/api/users/{user}/follow", post(handlers::users::toggle_follow))
        .route(
            "/api/posts",
            post(handlers::posts::create_post).layer(post_limit),
        )
        .route("/api/posts/feed", get(handlers::posts::feed))
        .route("/api/posts/{post}/like", post(handlers::posts::toggle_like))
        .route("/api/posts/{post}", axum::routing::delete(handlers::posts::delete_post))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    // EventSource can't set headers, so the stream also takes ?token=
    let stream_api = Router::new()
        .route("/api/events", get(handlers::stream::events))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::require_stream_auth,
        ));

    // Public routes (no auth)
    let public_api = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/users/search/{query}", get(handlers::users::search))
        .route("/api/users/{user}", get(handlers::users::get_profile))
        .route("/api/users/{user}/followers", get(handlers::users::followers))
        .route("/api/users/{user}/following", get(handlers::users::following))
        .route("/api/posts/explore", get(handlers::posts::explore))
        .route("/api/posts/search/{query}", get(handlers::posts::search))
        .route("/api/posts/user/{user}", get(handlers::posts::user_posts))
        .route("/api/posts/{post}", get(handlers::posts::get_post))
        .route("/api/posts/{post}/replies", get(handlers::posts::replies));

    let uploads = ServeDir::new(&state.config.upload_dir);

    Router::new()
        .merge(protected_api)
        .merge(stream_api)
        .merge(public_api)
        .nest_service(PUBLIC_PREFIX, uploads)
        .layer(cors_layer(&state.config.frontend_url))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the web client: its origin only, with credentials so the
/// session cookie is sent along.
fn cors_layer(frontend_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    match HeaderValue::from_str(frontend_url.trim_end_matches('/')) {
        Ok(origin) => layer.allow_origin(origin).allow_credentials(true),
        Err(_) => {
            warn!(frontend_url, "FRONTEND_URL is not a valid origin; cross-origin requests disabled");
            layer
        }
    }
}

/// Liveness check: always returns 200 OK.
async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ok", "message": "Server is running" })),
    )
}

/// Typed JSON error response helper.
pub fn api_error(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "message": message }))).into_response()
}

impl IntoResponse for SocialError {
    fn into_response(self) -> Response {
        match self {
            SocialError::NotFound(_) => api_error(StatusCode::NOT_FOUND, &self.to_string()),
            SocialError::BadRequest(message) => api_error(StatusCode::BAD_REQUEST, &message),
            SocialError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "errors": errors })),
            )
                .into_response(),
            SocialError::Unauthorized(message) => api_error(StatusCode::UNAUTHORIZED, message),
            SocialError::Forbidden(message) => api_error(StatusCode::FORBIDDEN, message),
            SocialError::Internal(e) => {
                error!(error = %e, "request failed");
                api_error(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
            }
        }
    }
}

/// The authenticated caller. Inserted into request extensions by the
/// auth middleware.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}
