// Database trait: backend-agnostic async interface for all DB operations.
//
// Implementor: SqliteDatabase (wraps rusqlite behind a mutex). All methods
// are async so a native async backend could sit behind the same interface.
//
// The trait mirrors the queries.rs function signatures one-to-one.

use anyhow::Result;
use async_trait::async_trait;

use super::models::{
    AuthorSummary, Credentials, LikeToggle, NewPost, NewUser, Post, ProfileUpdate, User,
    UserImage,
};
use crate::social::pagination::Page;

#[async_trait]
pub trait Database: Send + Sync {
    // --- Lifecycle ---

    /// Count the number of user-created tables in the database.
    async fn table_count(&self) -> Result<i64>;

    /// Remove all accounts and everything hanging off them.
    async fn clear_all(&self) -> Result<()>;

    // --- Users ---

    async fn create_user(&self, new_user: &NewUser) -> Result<User>;

    async fn get_user(&self, id: &str) -> Result<Option<User>>;

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Account plus password hash, by normalized email.
    async fn get_credentials(&self, email: &str) -> Result<Option<Credentials>>;

    async fn is_username_or_email_taken(&self, username: &str, email: &str) -> Result<bool>;

    /// Returns `None` if the user doesn't exist.
    async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Result<Option<User>>;

    /// Returns `None` if the user doesn't exist.
    async fn set_user_image(&self, id: &str, image: UserImage, url: &str)
        -> Result<Option<User>>;

    async fn search_users(&self, query: &str, limit: u32) -> Result<Vec<User>>;

    async fn count_users(&self) -> Result<i64>;

    // --- Follow edges ---

    /// Flip the edge; returns whether the follower follows afterwards.
    async fn toggle_follow(&self, follower_id: &str, followee_id: &str) -> Result<bool>;

    async fn get_followers(&self, user_id: &str) -> Result<Vec<AuthorSummary>>;

    async fn get_following(&self, user_id: &str) -> Result<Vec<AuthorSummary>>;

    // --- Posts ---

    async fn insert_post(&self, new_post: &NewPost) -> Result<Post>;

    async fn get_post(&self, id: &str) -> Result<Option<Post>>;

    /// Returns the deleted post, or `None` if it didn't exist.
    async fn delete_post(&self, id: &str) -> Result<Option<Post>>;

    async fn get_feed(&self, user_id: &str, page: Page) -> Result<Vec<Post>>;

    async fn get_explore(&self, page: Page) -> Result<Vec<Post>>;

    async fn get_user_posts(&self, author_id: &str, page: Page) -> Result<Vec<Post>>;

    async fn get_replies(&self, post_id: &str) -> Result<Vec<Post>>;

    async fn search_posts(&self, query: &str, limit: u32) -> Result<Vec<Post>>;

    async fn count_posts_by_author(&self, author_id: &str) -> Result<i64>;

    async fn count_posts(&self) -> Result<i64>;

    // --- Likes ---

    /// Flip the like; returns `None` if the post doesn't exist.
    async fn toggle_like(&self, post_id: &str, user_id: &str) -> Result<Option<LikeToggle>>;
}
