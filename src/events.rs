// Live feed events: broadcast to every connected client.
//
// A single tokio broadcast channel fans events out to all subscribers
// (one per open /api/events stream). There is no per-user targeting and
// no replay: a client that connects late or lags simply misses events.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::db::models::Post;

/// Buffered events per subscriber before it starts lagging.
pub const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum FeedEvent {
    /// A post was created; carries the populated post.
    NewPost(Post),
    /// A post gained a like. Unlikes are not broadcast.
    #[serde(rename_all = "camelCase")]
    PostLiked { post_id: String, user_id: String },
}

impl FeedEvent {
    /// Event name on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            FeedEvent::NewPost(_) => "newPost",
            FeedEvent::PostLiked { .. } => "postLiked",
        }
    }
}

#[derive(Clone)]
pub struct EventHub {
    tx: broadcast::Sender<FeedEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Send to all current subscribers; returns how many there were.
    pub fn publish(&self, event: FeedEvent) -> usize {
        let name = event.name();
        // Err only means nobody is listening.
        let receivers = self.tx.send(event).unwrap_or(0);
        debug!(event = name, receivers, "published feed event");
        receivers
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(EVENT_BUFFER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let hub = EventHub::default();
        let sent = hub.publish(FeedEvent::PostLiked {
            post_id: "p".to_string(),
            user_id: "u".to_string(),
        });
        assert_eq!(sent, 0);
    }

    #[tokio::test]
    async fn test_every_subscriber_gets_the_event() {
        let hub = EventHub::default();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        let sent = hub.publish(FeedEvent::PostLiked {
            post_id: "p1".to_string(),
            user_id: "u1".to_string(),
        });
        assert_eq!(sent, 2);

        for rx in [&mut a, &mut b] {
            match rx.recv().await.unwrap() {
                FeedEvent::PostLiked { post_id, user_id } => {
                    assert_eq!(post_id, "p1");
                    assert_eq!(user_id, "u1");
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[test]
    fn test_post_liked_payload_shape() {
        let event = FeedEvent::PostLiked {
            post_id: "p1".to_string(),
            user_id: "u1".to_string(),
        };
        assert_eq!(event.name(), "postLiked");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json, serde_json::json!({ "postId": "p1", "userId": "u1" }));
    }
}
