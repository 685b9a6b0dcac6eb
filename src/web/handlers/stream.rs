// GET /api/events: server-sent feed events.
//
// Each connection subscribes to the shared EventHub. The first event is
// `connected` (carrying the caller's user ID), then every `newPost` and
// `postLiked` as they happen. A subscriber that falls behind skips what it
// missed instead of being disconnected.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use futures::stream::{self, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::web::{AppState, AuthUser};

const KEEPALIVE_SECS: u64 = 15;

pub async fn events(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> Response {
    let rx = state.social.events().subscribe();
    info!(user_id = %auth.user_id, "event stream connected");

    let hello = serde_json::json!({ "userId": auth.user_id }).to_string();
    let connected = stream::once(async move {
        Ok::<Event, Infallible>(Event::default().event("connected").data(hello))
    });

    let user_id = auth.user_id;
    let feed = stream::unfold(rx, move |mut rx| {
        let user_id = user_id.clone();
        async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => {
                        let data = serde_json::to_string(&ev).unwrap_or_else(|_| "{}".to_string());
                        let evt = Event::default().event(ev.name()).data(data);
                        return Some((Ok::<Event, Infallible>(evt), rx));
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(%user_id, skipped, "event stream lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        }
    });

    Sse::new(connected.chain(feed))
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(KEEPALIVE_SECS))
                .text("keepalive"),
        )
        .into_response()
}
