// SqliteDatabase: rusqlite backend implementing the Database trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Sync.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// Holding the lock for a whole toggle makes each toggle atomic with respect
// to other requests.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::{
    AuthorSummary, Credentials, LikeToggle, NewPost, NewUser, Post, ProfileUpdate, User,
    UserImage,
};
use super::queries;
use super::traits::Database;
use crate::social::pagination::Page;

pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    async fn clear_all(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::clear_all(&conn)
    }

    async fn create_user(&self, new_user: &NewUser) -> Result<User> {
        let conn = self.conn.lock().await;
        queries::create_user(&conn, new_user)
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().await;
        queries::get_user(&conn, id)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().await;
        queries::get_user_by_username(&conn, username)
    }

    async fn get_credentials(&self, email: &str) -> Result<Option<Credentials>> {
        let conn = self.conn.lock().await;
        queries::get_credentials(&conn, email)
    }

    async fn is_username_or_email_taken(&self, username: &str, email: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        queries::is_username_or_email_taken(&conn, username, email)
    }

    async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Result<Option<User>> {
        let conn = self.conn.lock().await;
        queries::update_profile(&conn, id, update)
    }

    async fn set_user_image(
        &self,
        id: &str,
        image: UserImage,
        url: &str,
    ) -> Result<Option<User>> {
        let conn = self.conn.lock().await;
        queries::set_user_image(&conn, id, image, url)
    }

    async fn search_users(&self, query: &str, limit: u32) -> Result<Vec<User>> {
        let conn = self.conn.lock().await;
        queries::search_users(&conn, query, limit)
    }

    async fn count_users(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        queries::count_users(&conn)
    }

    async fn toggle_follow(&self, follower_id: &str, followee_id: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        queries::toggle_follow(&conn, follower_id, followee_id)
    }

    async fn get_followers(&self, user_id: &str) -> Result<Vec<AuthorSummary>> {
        let conn = self.conn.lock().await;
        queries::get_followers(&conn, user_id)
    }

    async fn get_following(&self, user_id: &str) -> Result<Vec<AuthorSummary>> {
        let conn = self.conn.lock().await;
        queries::get_following(&conn, user_id)
    }

    async fn insert_post(&self, new_post: &NewPost) -> Result<Post> {
        let conn = self.conn.lock().await;
        queries::insert_post(&conn, new_post)
    }

    async fn get_post(&self, id: &str) -> Result<Option<Post>> {
        let conn = self.conn.lock().await;
        queries::get_post(&conn, id)
    }

    async fn delete_post(&self, id: &str) -> Result<Option<Post>> {
        let conn = self.conn.lock().await;
        queries::delete_post(&conn, id)
    }

    async fn get_feed(&self, user_id: &str, page: Page) -> Result<Vec<Post>> {
        let conn = self.conn.lock().await;
        queries::get_feed(&conn, user_id, page)
    }

    async fn get_explore(&self, page: Page) -> Result<Vec<Post>> {
        let conn = self.conn.lock().await;
        queries::get_explore(&conn, page)
    }

    async fn get_user_posts(&self, author_id: &str, page: Page) -> Result<Vec<Post>> {
        let conn = self.conn.lock().await;
        queries::get_user_posts(&conn, author_id, page)
    }

    async fn get_replies(&self, post_id: &str) -> Result<Vec<Post>> {
        let conn = self.conn.lock().await;
        queries::get_replies(&conn, post_id)
    }

    async fn search_posts(&self, query: &str, limit: u32) -> Result<Vec<Post>> {
        let conn = self.conn.lock().await;
        queries::search_posts(&conn, query, limit)
    }

    async fn count_posts_by_author(&self, author_id: &str) -> Result<i64> {
        let conn = self.conn.lock().await;
        queries::count_posts_by_author(&conn, author_id)
    }

    async fn count_posts(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        queries::count_posts(&conn)
    }

    async fn toggle_like(&self, post_id: &str, user_id: &str) -> Result<Option<LikeToggle>> {
        let conn = self.conn.lock().await;
        queries::toggle_like(&conn, post_id, user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::create_tables;

    async fn test_db() -> SqliteDatabase {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        SqliteDatabase::new(conn)
    }

    async fn add_user(db: &SqliteDatabase, username: &str) -> User {
        db.create_user(&NewUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: "not-a-real-hash".to_string(),
            display_name: username.to_uppercase(),
        })
        .await
        .unwrap()
    }

    async fn add_post(db: &SqliteDatabase, author: &User, content: &str) -> Post {
        db.insert_post(&NewPost {
            author_id: author.id.clone(),
            content: content.to_string(),
            images: vec![],
            reply_to: None,
        })
        .await
        .unwrap()
    }

    async fn add_reply(db: &SqliteDatabase, author: &User, parent: &Post, content: &str) -> Post {
        db.insert_post(&NewPost {
            author_id: author.id.clone(),
            content: content.to_string(),
            images: vec![],
            reply_to: Some(parent.id.clone()),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_trait_table_count() {
        let db = test_db().await;
        assert_eq!(db.table_count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_trait_user_roundtrip() {
        let db = test_db().await;
        let alice = add_user(&db, "alice").await;
        assert_eq!(alice.id.len(), 24);
        assert_eq!(alice.display_name, "ALICE");
        assert!(alice.followers.is_empty());

        let by_id = db.get_user(&alice.id).await.unwrap().unwrap();
        assert_eq!(by_id, alice);
        let by_name = db.get_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_name.id, alice.id);
        assert!(db.get_user_by_username("ALICE").await.unwrap().is_none());
        assert!(db.get_user("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_trait_credentials_and_taken() {
        let db = test_db().await;
        let alice = add_user(&db, "alice").await;

        let creds = db
            .get_credentials("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(creds.user.id, alice.id);
        assert_eq!(creds.password_hash, "not-a-real-hash");
        assert!(db.get_credentials("bob@example.com").await.unwrap().is_none());

        assert!(db
            .is_username_or_email_taken("alice", "other@example.com")
            .await
            .unwrap());
        assert!(db
            .is_username_or_email_taken("other", "alice@example.com")
            .await
            .unwrap());
        assert!(!db
            .is_username_or_email_taken("other", "other@example.com")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_trait_update_profile_only_touches_provided_fields() {
        let db = test_db().await;
        let alice = add_user(&db, "alice").await;

        let updated = db
            .update_profile(
                &alice.id,
                &ProfileUpdate {
                    display_name: None,
                    bio: Some("hello there".to_string()),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.display_name, "ALICE");
        assert_eq!(updated.bio.as_deref(), Some("hello there"));

        let missing = db
            .update_profile("nope", &ProfileUpdate::default())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_trait_set_user_image() {
        let db = test_db().await;
        let alice = add_user(&db, "alice").await;
        let user = db
            .set_user_image(&alice.id, UserImage::Cover, "/uploads/c.png")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.cover_image.as_deref(), Some("/uploads/c.png"));
        assert!(user.avatar.is_none());
    }

    #[tokio::test]
    async fn test_trait_search_users_matches_name_or_display_name() {
        let db = test_db().await;
        add_user(&db, "jane_doe").await;
        add_user(&db, "john_smith").await;
        add_user(&db, "jonas").await;

        let found = db.search_users("jo", 20).await.unwrap();
        let names: Vec<&str> = found.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["john_smith", "jonas"]);

        // Display names are upper-cased by add_user; LIKE ignores ASCII case.
        assert_eq!(db.search_users("DOE", 20).await.unwrap().len(), 1);
        // '_' is literal, not a wildcard.
        assert_eq!(db.search_users("e_d", 20).await.unwrap().len(), 1);
        assert_eq!(db.search_users("o", 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_trait_follow_toggle_keeps_both_sides_in_step() {
        let db = test_db().await;
        let alice = add_user(&db, "alice").await;
        let bob = add_user(&db, "bob").await;

        assert!(db.toggle_follow(&alice.id, &bob.id).await.unwrap());
        let alice_now = db.get_user(&alice.id).await.unwrap().unwrap();
        let bob_now = db.get_user(&bob.id).await.unwrap().unwrap();
        assert_eq!(alice_now.following, vec![bob.id.clone()]);
        assert_eq!(bob_now.followers, vec![alice.id.clone()]);

        let followers = db.get_followers(&bob.id).await.unwrap();
        assert_eq!(followers.len(), 1);
        assert_eq!(followers[0].username, "alice");
        let following = db.get_following(&alice.id).await.unwrap();
        assert_eq!(following[0].username, "bob");

        assert!(!db.toggle_follow(&alice.id, &bob.id).await.unwrap());
        let bob_now = db.get_user(&bob.id).await.unwrap().unwrap();
        assert!(bob_now.followers.is_empty());
        assert!(db.get_following(&alice.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_trait_reply_count_follows_inserts_and_deletes() {
        let db = test_db().await;
        let alice = add_user(&db, "alice").await;
        let parent = add_post(&db, &alice, "parent").await;
        let r1 = add_reply(&db, &alice, &parent, "first").await;
        add_reply(&db, &alice, &parent, "second").await;

        let parent_now = db.get_post(&parent.id).await.unwrap().unwrap();
        assert_eq!(parent_now.reply_count, 2);

        let deleted = db.delete_post(&r1.id).await.unwrap().unwrap();
        assert_eq!(deleted.content, "first");
        let parent_now = db.get_post(&parent.id).await.unwrap().unwrap();
        assert_eq!(parent_now.reply_count, 1);

        assert!(db.delete_post(&r1.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_trait_replies_newest_first_and_excluded_from_lists() {
        let db = test_db().await;
        let alice = add_user(&db, "alice").await;
        let parent = add_post(&db, &alice, "parent").await;
        add_reply(&db, &alice, &parent, "older").await;
        add_reply(&db, &alice, &parent, "newer").await;

        let replies = db.get_replies(&parent.id).await.unwrap();
        let contents: Vec<&str> = replies.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(contents, vec!["newer", "older"]);

        let explore = db.get_explore(Page::first()).await.unwrap();
        assert_eq!(explore.len(), 1);
        let own = db.get_user_posts(&alice.id, Page::first()).await.unwrap();
        assert_eq!(own.len(), 1);
        // Replies still count towards the author's post total.
        assert_eq!(db.count_posts_by_author(&alice.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_trait_feed_includes_self_and_followed_only() {
        let db = test_db().await;
        let alice = add_user(&db, "alice").await;
        let bob = add_user(&db, "bob").await;
        let carol = add_user(&db, "carol").await;
        add_post(&db, &alice, "from alice").await;
        add_post(&db, &bob, "from bob").await;
        add_post(&db, &carol, "from carol").await;

        let feed = db.get_feed(&alice.id, Page::first()).await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].author.username, "alice");

        db.toggle_follow(&alice.id, &bob.id).await.unwrap();
        let feed = db.get_feed(&alice.id, Page::first()).await.unwrap();
        let contents: Vec<&str> = feed.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(contents, vec!["from bob", "from alice"]);
    }

    #[tokio::test]
    async fn test_trait_explore_paginates_newest_first() {
        let db = test_db().await;
        let alice = add_user(&db, "alice").await;
        for i in 0..25 {
            add_post(&db, &alice, &format!("post {i}")).await;
        }

        let first = db.get_explore(Page::first()).await.unwrap();
        assert_eq!(first.len(), 20);
        assert_eq!(first[0].content, "post 24");
        let second = db.get_explore(Page::new(2)).await.unwrap();
        assert_eq!(second.len(), 5);
        assert_eq!(second[4].content, "post 0");
        assert!(db.get_explore(Page::new(3)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_trait_like_toggle() {
        let db = test_db().await;
        let alice = add_user(&db, "alice").await;
        let bob = add_user(&db, "bob").await;
        let post = add_post(&db, &alice, "like me").await;

        let first = db.toggle_like(&post.id, &bob.id).await.unwrap().unwrap();
        assert_eq!(
            first,
            LikeToggle {
                liked: true,
                likes_count: 1
            }
        );
        db.toggle_like(&post.id, &alice.id).await.unwrap();
        let post_now = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(post_now.likes, vec![bob.id.clone(), alice.id.clone()]);

        let undo = db.toggle_like(&post.id, &bob.id).await.unwrap().unwrap();
        assert!(!undo.liked);
        assert_eq!(undo.likes_count, 1);

        assert!(db.toggle_like("missing", &bob.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_trait_search_posts_top_level_only() {
        let db = test_db().await;
        let alice = add_user(&db, "alice").await;
        let parent = add_post(&db, &alice, "I love Rust").await;
        add_reply(&db, &alice, &parent, "rust is great").await;
        add_post(&db, &alice, "TypeScript too").await;

        let found = db.search_posts("RUST", 50).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, parent.id);
    }

    #[tokio::test]
    async fn test_trait_images_roundtrip() {
        let db = test_db().await;
        let alice = add_user(&db, "alice").await;
        let post = db
            .insert_post(&NewPost {
                author_id: alice.id.clone(),
                content: "pics".to_string(),
                images: vec!["/uploads/posts/a.png".to_string()],
                reply_to: None,
            })
            .await
            .unwrap();
        assert_eq!(post.images, vec!["/uploads/posts/a.png".to_string()]);
        assert_eq!(post.author.username, "alice");
    }

    #[tokio::test]
    async fn test_trait_clear_all() {
        let db = test_db().await;
        let alice = add_user(&db, "alice").await;
        add_post(&db, &alice, "bye").await;
        assert_eq!(db.count_users().await.unwrap(), 1);
        assert_eq!(db.count_posts().await.unwrap(), 1);

        db.clear_all().await.unwrap();
        assert_eq!(db.count_users().await.unwrap(), 0);
        assert_eq!(db.count_posts().await.unwrap(), 0);
    }
}
