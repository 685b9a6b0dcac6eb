// Social: the operations behind every API endpoint.
//
// Written against the Database, MediaStore and EventHub seams so the rules
// (who may delete what, what a valid post is, which events fire) can be
// exercised without HTTP.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use super::error::SocialError;
use super::pagination::Page;
use super::password;
use super::validation::{self, FieldErrors};
use crate::db::models::{
    AuthorSummary, LikeToggle, NewPost, NewUser, Post, ProfileUpdate, User, UserImage,
    UserProfile,
};
use crate::db::queries::is_unique_violation;
use crate::db::Database;
use crate::events::{EventHub, FeedEvent};
use crate::media::{self, MediaKind, MediaStore, Upload};

/// Most users returned by a user search.
pub const USER_SEARCH_LIMIT: u32 = 20;

/// Most posts returned by a post search.
pub const POST_SEARCH_LIMIT: u32 = 50;

pub type SocialResult<T> = Result<T, SocialError>;

/// Sign-up form.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
}

/// Profile edit form; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileChanges {
    pub display_name: Option<String>,
    pub bio: Option<String>,
}

/// A post as submitted, before validation.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub content: String,
    pub reply_to: Option<String>,
    pub images: Vec<Upload>,
}

#[derive(Clone)]
pub struct Social {
    db: Arc<dyn Database>,
    media: Arc<dyn MediaStore>,
    events: EventHub,
}

impl Social {
    pub fn new(db: Arc<dyn Database>, media: Arc<dyn MediaStore>, events: EventHub) -> Self {
        Self { db, media, events }
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    // --- Accounts ---

    pub async fn register(&self, form: Registration) -> SocialResult<User> {
        let mut errors = FieldErrors::new();
        let username = errors.check(validation::username(&form.username));
        let email = errors.check(validation::email(&form.email));
        let display_name = errors.check(validation::display_name(&form.display_name));
        let password_ok = errors.check(validation::password(&form.password));
        let (Some(username), Some(email), Some(display_name), Some(())) =
            (username, email, display_name, password_ok)
        else {
            return Err(errors.into());
        };

        if self.db.is_username_or_email_taken(&username, &email).await? {
            return Err(SocialError::BadRequest("User already exists".to_string()));
        }

        let password_hash = password::hash_password_blocking(form.password).await?;
        let user = self
            .db
            .create_user(&NewUser {
                username,
                email,
                password_hash,
                display_name,
            })
            .await
            .map_err(|e| {
                // lost a race with a concurrent sign-up for the same name
                if is_unique_violation(&e) {
                    SocialError::BadRequest("User already exists".to_string())
                } else {
                    e.into()
                }
            })?;

        info!(user_id = %user.id, username = %user.username, "account registered");
        Ok(user)
    }

    /// Check an email/password pair. Unknown email and wrong password are
    /// indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &str) -> SocialResult<User> {
        const INVALID: SocialError = SocialError::Unauthorized("Invalid credentials");

        let email = email.trim().to_lowercase();
        let Some(creds) = self.db.get_credentials(&email).await? else {
            return Err(INVALID);
        };
        let ok =
            password::verify_password_blocking(password.to_string(), creds.password_hash).await?;
        if !ok {
            return Err(INVALID);
        }
        Ok(creds.user)
    }

    pub async fn user(&self, user_id: &str) -> SocialResult<User> {
        self.db
            .get_user(user_id)
            .await?
            .ok_or(SocialError::NotFound("User"))
    }

    pub async fn profile(&self, username: &str) -> SocialResult<UserProfile> {
        let user = self
            .db
            .get_user_by_username(username)
            .await?
            .ok_or(SocialError::NotFound("User"))?;
        let post_count = self.db.count_posts_by_author(&user.id).await?;
        Ok(UserProfile {
            post_count,
            followers_count: user.followers.len(),
            following_count: user.following.len(),
            user,
        })
    }

    pub async fn update_profile(&self, user_id: &str, changes: ProfileChanges) -> SocialResult<User> {
        let mut errors = FieldErrors::new();
        let display_name = changes
            .display_name
            .as_deref()
            .map(|raw| errors.check(validation::display_name(raw)));
        let bio = changes
            .bio
            .as_deref()
            .map(|raw| errors.check(validation::bio(raw)));
        if !errors.is_empty() {
            return Err(errors.into());
        }

        let update = ProfileUpdate {
            display_name: display_name.flatten(),
            bio: bio.flatten(),
        };
        self.db
            .update_profile(user_id, &update)
            .await?
            .ok_or(SocialError::NotFound("User"))
    }

    /// Store a new avatar or cover image; returns its URL and the updated user.
    pub async fn set_profile_image(
        &self,
        user_id: &str,
        image: UserImage,
        upload: Option<Upload>,
    ) -> SocialResult<(String, User)> {
        let Some(upload) = upload else {
            return Err(SocialError::BadRequest("No file uploaded".to_string()));
        };
        media::validate_image(&upload)?;

        let kind = match image {
            UserImage::Avatar => MediaKind::Avatar,
            UserImage::Cover => MediaKind::Cover,
        };
        let url = self.media.save(kind, &upload).await?;

        match self.db.set_user_image(user_id, image, &url).await {
            Ok(Some(user)) => Ok((url, user)),
            Ok(None) => {
                self.discard(&url).await;
                Err(SocialError::NotFound("User"))
            }
            Err(e) => {
                self.discard(&url).await;
                Err(e.into())
            }
        }
    }

    pub async fn search_users(&self, query: &str) -> SocialResult<Vec<User>> {
        Ok(self.db.search_users(query, USER_SEARCH_LIMIT).await?)
    }

    // --- Follow edges ---

    /// Follow or unfollow `target_id`; returns whether the user now follows it.
    pub async fn toggle_follow(&self, user_id: &str, target_id: &str) -> SocialResult<bool> {
        if user_id == target_id {
            return Err(SocialError::BadRequest("Cannot follow yourself".to_string()));
        }
        self.user(user_id).await?;
        if self.db.get_user(target_id).await?.is_none() {
            return Err(SocialError::NotFound("User"));
        }
        let following = self.db.toggle_follow(user_id, target_id).await?;
        info!(user_id, target_id, following, "follow toggled");
        Ok(following)
    }

    pub async fn followers(&self, user_id: &str) -> SocialResult<Vec<AuthorSummary>> {
        self.user(user_id).await?;
        Ok(self.db.get_followers(user_id).await?)
    }

    pub async fn following(&self, user_id: &str) -> SocialResult<Vec<AuthorSummary>> {
        self.user(user_id).await?;
        Ok(self.db.get_following(user_id).await?)
    }

    // --- Posts ---

    /// Validate, store images, insert, then broadcast `newPost`.
    pub async fn create_post(&self, author_id: &str, draft: PostDraft) -> SocialResult<Post> {
        self.user(author_id).await?;
        let mut errors = FieldErrors::new();
        let Some(content) = errors.check(validation::post_content(&draft.content)) else {
            return Err(errors.into());
        };
        media::validate_post_images(&draft.images)?;

        let reply_to = draft
            .reply_to
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        if let Some(ref parent) = reply_to {
            if self.db.get_post(parent).await?.is_none() {
                return Err(SocialError::NotFound("Post"));
            }
        }

        let mut images = Vec::with_capacity(draft.images.len());
        for upload in &draft.images {
            match self.media.save(MediaKind::PostImage, upload).await {
                Ok(url) => images.push(url),
                Err(e) => {
                    self.discard_all(&images).await;
                    return Err(e.into());
                }
            }
        }

        let new_post = NewPost {
            author_id: author_id.to_string(),
            content,
            images,
            reply_to,
        };
        let post = match self.db.insert_post(&new_post).await {
            Ok(post) => post,
            Err(e) => {
                self.discard_all(&new_post.images).await;
                return Err(e.into());
            }
        };

        info!(
            post_id = %post.id,
            author_id,
            reply_to = ?post.reply_to,
            images = post.images.len(),
            "post created"
        );
        self.events.publish(FeedEvent::NewPost(post.clone()));
        Ok(post)
    }

    /// Top-level posts from the user and everyone they follow.
    pub async fn feed(&self, user_id: &str, page: Page) -> SocialResult<Vec<Post>> {
        self.user(user_id).await?;
        Ok(self.db.get_feed(user_id, page).await?)
    }

    pub async fn explore(&self, page: Page) -> SocialResult<Vec<Post>> {
        Ok(self.db.get_explore(page).await?)
    }

    pub async fn user_posts(&self, username: &str, page: Page) -> SocialResult<Vec<Post>> {
        let user = self
            .db
            .get_user_by_username(username)
            .await?
            .ok_or(SocialError::NotFound("User"))?;
        Ok(self.db.get_user_posts(&user.id, page).await?)
    }

    pub async fn post(&self, post_id: &str) -> SocialResult<Post> {
        self.db
            .get_post(post_id)
            .await?
            .ok_or(SocialError::NotFound("Post"))
    }

    pub async fn replies(&self, post_id: &str) -> SocialResult<Vec<Post>> {
        Ok(self.db.get_replies(post_id).await?)
    }

    pub async fn search_posts(&self, query: &str) -> SocialResult<Vec<Post>> {
        Ok(self.db.search_posts(query, POST_SEARCH_LIMIT).await?)
    }

    /// Like or unlike; only a like is broadcast.
    pub async fn toggle_like(&self, post_id: &str, user_id: &str) -> SocialResult<LikeToggle> {
        self.user(user_id).await?;
        let toggle = self
            .db
            .toggle_like(post_id, user_id)
            .await?
            .ok_or(SocialError::NotFound("Post"))?;
        if toggle.liked {
            self.events.publish(FeedEvent::PostLiked {
                post_id: post_id.to_string(),
                user_id: user_id.to_string(),
            });
        }
        Ok(toggle)
    }

    /// Delete a post the user authored, along with its image files.
    pub async fn delete_post(&self, post_id: &str, user_id: &str) -> SocialResult<()> {
        let post = self.post(post_id).await?;
        if post.author.id != user_id {
            return Err(SocialError::Forbidden("Not authorized to delete this post"));
        }

        let Some(deleted) = self.db.delete_post(post_id).await? else {
            return Err(SocialError::NotFound("Post"));
        };
        self.discard_all(&deleted.images).await;

        info!(post_id, user_id, "post deleted");
        Ok(())
    }

    // --- Helpers ---

    async fn discard(&self, url: &str) {
        if let Err(e) = self.media.remove(url).await {
            warn!(error = %e, url, "failed to remove stored upload");
        }
    }

    async fn discard_all(&self, urls: &[String]) {
        for url in urls {
            self.discard(url).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::media::LocalMediaStore;
    use tokio::sync::broadcast::error::TryRecvError;

    fn test_social(uploads: &tempfile::TempDir) -> Social {
        let db = db::in_memory().unwrap();
        let media = Arc::new(LocalMediaStore::new(uploads.path()));
        Social::new(db, media, EventHub::default())
    }

    fn registration(username: &str) -> Registration {
        Registration {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password: "password123".to_string(),
            display_name: username.to_string(),
        }
    }

    fn draft(content: &str) -> PostDraft {
        PostDraft {
            content: content.to_string(),
            ..PostDraft::default()
        }
    }

    #[tokio::test]
    async fn test_like_broadcasts_but_unlike_does_not() {
        let uploads = tempfile::tempdir().unwrap();
        let social = test_social(&uploads);
        let alice = social.register(registration("alice")).await.unwrap();
        let bob = social.register(registration("bob")).await.unwrap();
        let post = social.create_post(&alice.id, draft("hello")).await.unwrap();

        let mut rx = social.events().subscribe();

        let liked = social.toggle_like(&post.id, &bob.id).await.unwrap();
        assert!(liked.liked);
        match rx.try_recv().unwrap() {
            FeedEvent::PostLiked { post_id, user_id } => {
                assert_eq!(post_id, post.id);
                assert_eq!(user_id, bob.id);
            }
            other => panic!("expected postLiked, got {other:?}"),
        }

        let unliked = social.toggle_like(&post.id, &bob.id).await.unwrap();
        assert!(!unliked.liked);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_missing_caller_is_not_found() {
        let uploads = tempfile::tempdir().unwrap();
        let social = test_social(&uploads);
        let alice = social.register(registration("alice")).await.unwrap();
        let post = social.create_post(&alice.id, draft("hello")).await.unwrap();
        let ghost = "0123456789abcdef01234567";

        let err = social.create_post(ghost, draft("boo")).await.unwrap_err();
        assert!(matches!(err, SocialError::NotFound("User")));
        let err = social.toggle_like(&post.id, ghost).await.unwrap_err();
        assert!(matches!(err, SocialError::NotFound("User")));
        let err = social.toggle_follow(ghost, &alice.id).await.unwrap_err();
        assert!(matches!(err, SocialError::NotFound("User")));
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_signup_is_bad_request() {
        let uploads = tempfile::tempdir().unwrap();
        let social = test_social(&uploads);

        let (first, second) = tokio::join!(
            social.register(registration("alice")),
            social.register(registration("alice")),
        );
        let (ok, err) = match (first, second) {
            (Ok(user), Err(e)) | (Err(e), Ok(user)) => (user, e),
            (a, b) => panic!("expected one success, got {a:?} and {b:?}"),
        };
        assert_eq!(ok.username, "alice");
        match err {
            SocialError::BadRequest(msg) => assert_eq!(msg, "User already exists"),
            other => panic!("expected BadRequest, got {other:?}"),
        }
    }
}
