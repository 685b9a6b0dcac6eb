// System status display: DB file size, row counts, latest posts.

use anyhow::Result;
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;

use crate::db::Database;
use crate::social::Page;

const RECENT_POSTS: usize = 5;
const PREVIEW_CHARS: usize = 60;

/// Display system status to the terminal.
pub async fn show(db: &Arc<dyn Database>, db_path: &str) -> Result<()> {
    // Database file size
    let file_size = std::fs::metadata(db_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", db_path, file_size);

    let users = db.count_users().await?;
    let posts = db.count_posts().await?;
    println!("Users: {users}");
    println!("Posts: {posts} (replies included)");

    let recent = db.get_explore(Page::first()).await?;
    if recent.is_empty() {
        println!("Recent posts: none yet");
        println!("  Run `binaried seed` to load demo data");
        return Ok(());
    }

    println!("Recent posts:");
    for post in recent.iter().take(RECENT_POSTS) {
        println!(
            "  {} {} ({}, {} likes, {} replies)",
            format!("@{}", post.author.username).bold(),
            preview(&post.content),
            post.created_at,
            post.likes.len(),
            post.reply_count
        );
    }

    Ok(())
}

/// Whether the database file exists yet.
pub fn is_initialized(db_path: &str) -> bool {
    Path::new(db_path).exists()
}

fn preview(content: &str) -> String {
    let flat = content.replace('\n', " ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(PREVIEW_CHARS - 1).collect();
    format!("{cut}…")
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_preview_truncates_long_posts() {
        assert_eq!(preview("short\npost"), "short post");
        let long = "x".repeat(200);
        let shown = preview(&long);
        assert_eq!(shown.chars().count(), PREVIEW_CHARS);
        assert!(shown.ends_with('…'));
    }
}
