// Database queries: CRUD operations for all tables.
//
// Every database interaction goes through this module. This keeps SQL
// contained in one place and gives the rest of the app clean Rust interfaces.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use rand::RngCore;
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Params, Row};

use super::models::{
    AuthorSummary, Credentials, LikeToggle, NewPost, NewUser, Post, ProfileUpdate, User,
    UserImage,
};
use crate::social::pagination::Page;

/// A fresh 24-hex-char identifier (96 random bits).
pub fn new_id() -> String {
    let mut bytes = [0u8; 12];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Current time as RFC 3339 UTC with millisecond precision.
///
/// Fixed width, so string order is chronological order.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Build a LIKE pattern matching `query` as a literal substring.
///
/// Use with `ESCAPE '\'`. SQLite's LIKE is case-insensitive for ASCII.
pub fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

// --- Users ---

const USER_COLUMNS: &str =
    "id, username, email, display_name, bio, avatar, cover_image, created_at, updated_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        display_name: row.get(3)?,
        bio: row.get(4)?,
        avatar: row.get(5)?,
        cover_image: row.get(6)?,
        followers: Vec::new(),
        following: Vec::new(),
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Fill in the follower/following ID arrays for a user.
fn with_edges(conn: &Connection, mut user: User) -> Result<User> {
    user.followers = id_list(
        conn,
        "SELECT follower_id FROM follows WHERE followee_id = ?1 ORDER BY created_at, rowid",
        &user.id,
    )?;
    user.following = id_list(
        conn,
        "SELECT followee_id FROM follows WHERE follower_id = ?1 ORDER BY created_at, rowid",
        &user.id,
    )?;
    Ok(user)
}

fn id_list(conn: &Connection, sql: &str, id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![id], |row| row.get(0))?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

/// Whether `err` is a UNIQUE constraint failure, e.g. a username or email
/// that was taken between the availability check and the insert.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _))
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Insert a new account and return it.
pub fn create_user(conn: &Connection, new_user: &NewUser) -> Result<User> {
    let id = new_id();
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO users (id, username, email, password_hash, display_name, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            id,
            new_user.username,
            new_user.email,
            new_user.password_hash,
            new_user.display_name,
            now,
        ],
    )?;
    get_user(conn, &id)?.context("user missing right after insert")
}

pub fn get_user(conn: &Connection, id: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            user_from_row,
        )
        .optional()?;
    user.map(|u| with_edges(conn, u)).transpose()
}

/// Exact (case-sensitive) username lookup.
pub fn get_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
            params![username],
            user_from_row,
        )
        .optional()?;
    user.map(|u| with_edges(conn, u)).transpose()
}

/// Look up an account and its password hash by (normalized) email.
pub fn get_credentials(conn: &Connection, email: &str) -> Result<Option<Credentials>> {
    let found = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?1"),
            params![email],
            |row| Ok((user_from_row(row)?, row.get::<_, String>(9)?)),
        )
        .optional()?;
    match found {
        Some((user, password_hash)) => Ok(Some(Credentials {
            user: with_edges(conn, user)?,
            password_hash,
        })),
        None => Ok(None),
    }
}

pub fn is_username_or_email_taken(conn: &Connection, username: &str, email: &str) -> Result<bool> {
    let taken: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE username = ?1 OR email = ?2",
        params![username, email],
        |row| row.get(0),
    )?;
    Ok(taken)
}

/// Apply the provided profile fields. Returns `None` if the user doesn't exist.
pub fn update_profile(conn: &Connection, id: &str, update: &ProfileUpdate) -> Result<Option<User>> {
    let changed = conn.execute(
        "UPDATE users SET
            display_name = COALESCE(?2, display_name),
            bio = COALESCE(?3, bio),
            updated_at = ?4
         WHERE id = ?1",
        params![id, update.display_name, update.bio, now_timestamp()],
    )?;
    if changed == 0 {
        return Ok(None);
    }
    get_user(conn, id)
}

/// Point the avatar or cover image at `url`. Returns `None` if the user doesn't exist.
pub fn set_user_image(
    conn: &Connection,
    id: &str,
    image: UserImage,
    url: &str,
) -> Result<Option<User>> {
    let changed = conn.execute(
        &format!(
            "UPDATE users SET {} = ?2, updated_at = ?3 WHERE id = ?1",
            image.column()
        ),
        params![id, url, now_timestamp()],
    )?;
    if changed == 0 {
        return Ok(None);
    }
    get_user(conn, id)
}

/// Case-insensitive substring match on username or display name.
pub fn search_users(conn: &Connection, query: &str, limit: u32) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users
         WHERE username LIKE ?1 ESCAPE '\\' OR display_name LIKE ?1 ESCAPE '\\'
         ORDER BY username
         LIMIT ?2"
    ))?;
    let rows = stmt.query_map(params![like_pattern(query), limit], user_from_row)?;
    let mut users = Vec::new();
    for row in rows {
        users.push(with_edges(conn, row?)?);
    }
    Ok(users)
}

pub fn count_users(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(count)
}

// --- Follow edges ---

/// Follow `followee_id` if not already following, otherwise unfollow.
/// Returns whether `follower_id` follows `followee_id` afterwards.
pub fn toggle_follow(conn: &Connection, follower_id: &str, followee_id: &str) -> Result<bool> {
    let tx = conn.unchecked_transaction()?;
    let removed = tx.execute(
        "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
        params![follower_id, followee_id],
    )?;
    let following = if removed == 0 {
        tx.execute(
            "INSERT INTO follows (follower_id, followee_id, created_at) VALUES (?1, ?2, ?3)",
            params![follower_id, followee_id, now_timestamp()],
        )?;
        true
    } else {
        false
    };
    tx.commit()?;
    Ok(following)
}

fn summaries(conn: &Connection, sql: &str, id: &str) -> Result<Vec<AuthorSummary>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![id], |row| {
        Ok(AuthorSummary {
            id: row.get(0)?,
            username: row.get(1)?,
            display_name: row.get(2)?,
            avatar: row.get(3)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Users following `user_id`, in the order they followed.
pub fn get_followers(conn: &Connection, user_id: &str) -> Result<Vec<AuthorSummary>> {
    summaries(
        conn,
        "SELECT u.id, u.username, u.display_name, u.avatar
         FROM follows f JOIN users u ON u.id = f.follower_id
         WHERE f.followee_id = ?1
         ORDER BY f.created_at, f.rowid",
        user_id,
    )
}

/// Users `user_id` follows, in the order they were followed.
pub fn get_following(conn: &Connection, user_id: &str) -> Result<Vec<AuthorSummary>> {
    summaries(
        conn,
        "SELECT u.id, u.username, u.display_name, u.avatar
         FROM follows f JOIN users u ON u.id = f.followee_id
         WHERE f.follower_id = ?1
         ORDER BY f.created_at, f.rowid",
        user_id,
    )
}

// --- Posts ---

const POST_SELECT: &str = "SELECT p.id, p.content, p.images, p.reply_to, p.reply_count,
        p.created_at, p.updated_at, u.id, u.username, u.display_name, u.avatar
     FROM posts p JOIN users u ON u.id = p.author_id";

const NEWEST_FIRST: &str = "ORDER BY p.created_at DESC, p.rowid DESC";

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    let images_json: String = row.get(2)?;
    let images: Vec<String> = serde_json::from_str(&images_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    Ok(Post {
        id: row.get(0)?,
        content: row.get(1)?,
        images,
        likes: Vec::new(),
        reply_to: row.get(3)?,
        reply_count: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        author: AuthorSummary {
            id: row.get(7)?,
            username: row.get(8)?,
            display_name: row.get(9)?,
            avatar: row.get(10)?,
        },
    })
}

/// Run a post query and attach each post's likes.
fn query_posts<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Post>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, post_from_row)?;
    let mut posts = Vec::new();
    for row in rows {
        let mut post = row?;
        post.likes = id_list(
            conn,
            "SELECT user_id FROM post_likes WHERE post_id = ?1 ORDER BY liked_at, rowid",
            &post.id,
        )?;
        posts.push(post);
    }
    Ok(posts)
}

fn page_bounds(page: Page) -> (i64, i64) {
    (
        i64::from(page.limit()),
        i64::try_from(page.offset()).unwrap_or(i64::MAX),
    )
}

/// Insert a post; a reply bumps its parent's reply count in the same transaction.
pub fn insert_post(conn: &Connection, new_post: &NewPost) -> Result<Post> {
    let id = new_id();
    let now = now_timestamp();
    let images_json = serde_json::to_string(&new_post.images)?;

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO posts (id, author_id, content, images, reply_to, reply_count, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)",
        params![
            id,
            new_post.author_id,
            new_post.content,
            images_json,
            new_post.reply_to,
            now,
        ],
    )?;
    if let Some(ref parent) = new_post.reply_to {
        tx.execute(
            "UPDATE posts SET reply_count = reply_count + 1 WHERE id = ?1",
            params![parent],
        )?;
    }
    tx.commit()?;

    get_post(conn, &id)?.context("post missing right after insert")
}

pub fn get_post(conn: &Connection, id: &str) -> Result<Option<Post>> {
    let mut posts = query_posts(conn, &format!("{POST_SELECT} WHERE p.id = ?1"), params![id])?;
    Ok(posts.pop())
}

/// Delete a post and return it as it was. A reply decrements its parent's
/// reply count in the same transaction; likes go with the post.
pub fn delete_post(conn: &Connection, id: &str) -> Result<Option<Post>> {
    let Some(post) = get_post(conn, id)? else {
        return Ok(None);
    };

    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
    if let Some(ref parent) = post.reply_to {
        tx.execute(
            "UPDATE posts SET reply_count = MAX(reply_count - 1, 0) WHERE id = ?1",
            params![parent],
        )?;
    }
    tx.commit()?;

    Ok(Some(post))
}

/// Top-level posts by `user_id` and everyone they follow, newest first.
pub fn get_feed(conn: &Connection, user_id: &str, page: Page) -> Result<Vec<Post>> {
    let (limit, offset) = page_bounds(page);
    query_posts(
        conn,
        &format!(
            "{POST_SELECT}
             WHERE p.reply_to IS NULL
               AND (p.author_id = ?1
                    OR p.author_id IN (SELECT followee_id FROM follows WHERE follower_id = ?1))
             {NEWEST_FIRST}
             LIMIT ?2 OFFSET ?3"
        ),
        params![user_id, limit, offset],
    )
}

/// All top-level posts, newest first.
pub fn get_explore(conn: &Connection, page: Page) -> Result<Vec<Post>> {
    let (limit, offset) = page_bounds(page);
    query_posts(
        conn,
        &format!("{POST_SELECT} WHERE p.reply_to IS NULL {NEWEST_FIRST} LIMIT ?1 OFFSET ?2"),
        params![limit, offset],
    )
}

/// Top-level posts by one author, newest first.
pub fn get_user_posts(conn: &Connection, author_id: &str, page: Page) -> Result<Vec<Post>> {
    let (limit, offset) = page_bounds(page);
    query_posts(
        conn,
        &format!(
            "{POST_SELECT} WHERE p.author_id = ?1 AND p.reply_to IS NULL
             {NEWEST_FIRST} LIMIT ?2 OFFSET ?3"
        ),
        params![author_id, limit, offset],
    )
}

/// Direct replies to a post, newest first.
pub fn get_replies(conn: &Connection, post_id: &str) -> Result<Vec<Post>> {
    query_posts(
        conn,
        &format!("{POST_SELECT} WHERE p.reply_to = ?1 {NEWEST_FIRST}"),
        params![post_id],
    )
}

/// Case-insensitive substring match on top-level post content, newest first.
pub fn search_posts(conn: &Connection, query: &str, limit: u32) -> Result<Vec<Post>> {
    query_posts(
        conn,
        &format!(
            "{POST_SELECT} WHERE p.reply_to IS NULL AND p.content LIKE ?1 ESCAPE '\\'
             {NEWEST_FIRST} LIMIT ?2"
        ),
        params![like_pattern(query), limit],
    )
}

/// All posts by an author, replies included.
pub fn count_posts_by_author(conn: &Connection, author_id: &str) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM posts WHERE author_id = ?1",
        params![author_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn count_posts(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
    Ok(count)
}

// --- Likes ---

/// Like the post if `user_id` hasn't yet, otherwise unlike it.
/// Returns `None` if the post doesn't exist.
pub fn toggle_like(conn: &Connection, post_id: &str, user_id: &str) -> Result<Option<LikeToggle>> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM posts WHERE id = ?1",
        params![post_id],
        |row| row.get(0),
    )?;
    if !exists {
        return Ok(None);
    }

    let tx = conn.unchecked_transaction()?;
    let removed = tx.execute(
        "DELETE FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
        params![post_id, user_id],
    )?;
    let liked = if removed == 0 {
        tx.execute(
            "INSERT INTO post_likes (post_id, user_id, liked_at) VALUES (?1, ?2, ?3)",
            params![post_id, user_id, now_timestamp()],
        )?;
        true
    } else {
        false
    };
    let likes_count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM post_likes WHERE post_id = ?1",
        params![post_id],
        |row| row.get(0),
    )?;
    tx.commit()?;

    Ok(Some(LikeToggle { liked, likes_count }))
}

// --- Maintenance ---

/// Remove every account, post, like and follow edge.
pub fn clear_all(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "DELETE FROM post_likes;
         DELETE FROM follows;
         DELETE FROM posts;
         DELETE FROM users;",
    )?;
    Ok(())
}
