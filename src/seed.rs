// Demo data: three accounts, a handful of liked posts, two follow edges.
//
// Seeding goes through the Database trait like everything else, so the
// demo data obeys the same constraints as real traffic.

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::info;

use crate::db::models::{NewPost, NewUser, ProfileUpdate};
use crate::db::Database;
use crate::social::password;

/// Password shared by every demo account.
pub const DEMO_PASSWORD: &str = "password123";

struct DemoUser {
    username: &'static str,
    email: &'static str,
    display_name: &'static str,
    bio: &'static str,
}

const DEMO_USERS: [DemoUser; 3] = [
    DemoUser {
        username: "demo_user",
        email: "demo@example.com",
        display_name: "Demo User",
        bio: "Welcome to my profile! This is a demo account.",
    },
    DemoUser {
        username: "jane_doe",
        email: "jane@example.com",
        display_name: "Jane Doe",
        bio: "Software Engineer | React Enthusiast | Coffee Lover ☕",
    },
    DemoUser {
        username: "john_smith",
        email: "john@example.com",
        display_name: "John Smith",
        bio: "Full-stack developer building cool stuff 🚀",
    },
];

/// (author index, content, indexes of users who like it)
const DEMO_POSTS: [(usize, &str, &[usize]); 5] = [
    (0, "Welcome to Binaried! This is my first post. 🎉", &[]),
    (
        1,
        "Just deployed a new feature and it's blazing fast! ⚡",
        &[0],
    ),
    (
        2,
        "Working on some performance optimizations. Reduced bundle size by 57%! 📦",
        &[0, 1],
    ),
    (
        1,
        "Who else loves strong typing? The safety is a game changer! 💙",
        &[2],
    ),
    (
        0,
        "Just implemented virtual scrolling and it handles 10,000+ items smoothly! 🎯",
        &[1, 2],
    ),
];

/// (follower index, followee index)
const DEMO_FOLLOWS: [(usize, usize); 2] = [(0, 1), (0, 2)];

/// What `seed` created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: usize,
    pub posts: usize,
    pub follows: usize,
}

/// Fill the database with demo data.
///
/// Refuses to touch a database that already has users unless `force` is
/// set, in which case every row and every file under `upload_dir` is
/// wiped first.
pub async fn seed(db: &Arc<dyn Database>, upload_dir: &Path, force: bool) -> Result<SeedSummary> {
    let existing = db.count_users().await?;
    if existing > 0 {
        if !force {
            anyhow::bail!(
                "Database already has {existing} user(s). Re-run with --force to wipe it and reseed."
            );
        }
        db.clear_all().await?;
        let removed = clear_uploads(upload_dir).await?;
        println!(
            "{} Cleared existing data ({removed} upload(s) removed)",
            "✓".green()
        );
    }

    let password_hash = password::hash_password_blocking(DEMO_PASSWORD.to_string()).await?;

    let mut ids = Vec::with_capacity(DEMO_USERS.len());
    for demo in &DEMO_USERS {
        let user = db
            .create_user(&NewUser {
                username: demo.username.to_string(),
                email: demo.email.to_string(),
                password_hash: password_hash.clone(),
                display_name: demo.display_name.to_string(),
            })
            .await?;
        db.update_profile(
            &user.id,
            &ProfileUpdate {
                bio: Some(demo.bio.to_string()),
                ..ProfileUpdate::default()
            },
        )
        .await?;
        ids.push(user.id);
    }
    println!("{} Created {} demo users", "✓".green(), ids.len());

    for (author, content, likers) in DEMO_POSTS {
        let post = db
            .insert_post(&NewPost {
                author_id: ids[author].clone(),
                content: content.to_string(),
                images: Vec::new(),
                reply_to: None,
            })
            .await?;
        for &liker in likers {
            db.toggle_like(&post.id, &ids[liker]).await?;
        }
    }
    println!("{} Created {} demo posts", "✓".green(), DEMO_POSTS.len());

    for (follower, followee) in DEMO_FOLLOWS {
        db.toggle_follow(&ids[follower], &ids[followee]).await?;
    }
    println!("{} Set up follow relationships", "✓".green());

    let summary = SeedSummary {
        users: ids.len(),
        posts: DEMO_POSTS.len(),
        follows: DEMO_FOLLOWS.len(),
    };
    info!(?summary, "database seeded");
    Ok(summary)
}

/// Empty `dir` without removing it. A missing directory counts as empty.
async fn clear_uploads(dir: &Path) -> Result<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", dir.display()));
        }
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let result = if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        result.with_context(|| format!("Failed to remove {}", path.display()))?;
        removed += 1;
    }
    info!(dir = %dir.display(), removed, "cleared uploads");
    Ok(removed)
}
