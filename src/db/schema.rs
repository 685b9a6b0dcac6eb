// Database schema: table creation.
//
// A `schema_version` table tracks which schema revisions have been applied
// so later changes can be layered on as numbered migrations.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Current schema revision.
pub const SCHEMA_VERSION: i64 = 1;

/// Create all tables if they don't exist yet.
///
/// Idempotent: safe to call on every startup. Also turns on foreign key
/// enforcement for this connection, which the like/follow cascades rely on.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", true)?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,               -- 24 hex chars
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,        -- stored lowercased
            password_hash TEXT NOT NULL,       -- Argon2 PHC string
            display_name TEXT NOT NULL,
            bio TEXT,
            avatar TEXT,                       -- public /uploads/ URL
            cover_image TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        -- reply_to has no foreign key: replies outlive a deleted parent
        CREATE TABLE IF NOT EXISTS posts (
            id TEXT PRIMARY KEY,
            author_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            images TEXT NOT NULL DEFAULT '[]', -- JSON array of /uploads/ URLs
            reply_to TEXT,
            reply_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS post_likes (
            post_id TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            liked_at TEXT NOT NULL,
            PRIMARY KEY (post_id, user_id)
        );

        -- One row per edge; followers/following are both read from here
        CREATE TABLE IF NOT EXISTS follows (
            follower_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            followee_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            PRIMARY KEY (follower_id, followee_id),
            CHECK (follower_id <> followee_id)
        );

        CREATE INDEX IF NOT EXISTS idx_posts_author_created
            ON posts(author_id, created_at DESC);

        CREATE INDEX IF NOT EXISTS idx_posts_reply_to
            ON posts(reply_to);

        CREATE INDEX IF NOT EXISTS idx_posts_created
            ON posts(created_at DESC);

        CREATE INDEX IF NOT EXISTS idx_follows_followee
            ON follows(followee_id);
        ",
    )
    .context("Failed to create database tables")?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [SCHEMA_VERSION],
    )?;

    Ok(())
}

/// Count the number of tables in the database (useful for init confirmation).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}
