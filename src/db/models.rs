// Data models: Rust structs that map to database rows.
//
// These are the types that flow through the application and out over the
// API. Field names serialize in the shape the web client already expects:
// camelCase, with `_id` as the identifier.

use serde::{Deserialize, Serialize};

/// A user account. The password hash is never part of this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    /// IDs of users following this user
    pub followers: Vec<String>,
    /// IDs of users this user follows
    pub following: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A user with profile counters, as returned by the profile endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    /// All posts by the user, replies included
    pub post_count: i64,
    pub followers_count: usize,
    pub following_count: usize,
}

/// The slice of a user embedded in posts and follower lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// A post with its author populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: String,
    pub author: AuthorSummary,
    pub content: String,
    pub images: Vec<String>,
    /// IDs of users who liked the post, oldest like first
    pub likes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    pub reply_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields needed to create an account. `email` is expected normalized.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
}

/// A stored account together with its password hash, for login.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: User,
    pub password_hash: String,
}

/// Profile fields to change; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
}

/// Which profile image a stored upload replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserImage {
    Avatar,
    Cover,
}

impl UserImage {
    pub fn column(&self) -> &'static str {
        match self {
            UserImage::Avatar => "avatar",
            UserImage::Cover => "cover_image",
        }
    }
}

/// Fields needed to create a post. `content` is expected validated.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: String,
    pub content: String,
    pub images: Vec<String>,
    pub reply_to: Option<String>,
}

/// Result of flipping a like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeToggle {
    pub liked: bool,
    pub likes_count: i64,
}
