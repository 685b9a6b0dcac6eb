// LocalMediaStore: uploads written to a directory on disk.
//
// Layout: post images under {root}/posts/, avatars and covers directly
// under {root}/. Stored names are `{unix_millis}-{random}.{ext}`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use tracing::debug;

use super::{image_extension, MediaKind, MediaStore, Upload, PUBLIC_PREFIX};

pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a public URL back to a path under the root.
    /// Returns `None` for URLs outside `/uploads/` or with `..` segments.
    fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        let rel = url.strip_prefix(PUBLIC_PREFIX)?.strip_prefix('/')?;
        if rel.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
            return None;
        }
        Some(self.root.join(rel))
    }
}

fn stored_name(ext: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::rng().random_range(0..1_000_000_000);
    format!("{millis}-{suffix}.{ext}")
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn save(&self, kind: MediaKind, upload: &Upload) -> Result<String> {
        let ext = image_extension(&upload.file_name)
            .with_context(|| format!("unsupported file name: {}", upload.file_name))?;

        let (dir, url_dir) = match kind.subdir() {
            Some(sub) => (self.root.join(sub), format!("{PUBLIC_PREFIX}/{sub}")),
            None => (self.root.clone(), PUBLIC_PREFIX.to_string()),
        };
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create upload directory {}", dir.display()))?;

        let name = stored_name(&ext);
        let path = dir.join(&name);
        tokio::fs::write(&path, &upload.bytes)
            .await
            .with_context(|| format!("Failed to write upload {}", path.display()))?;

        debug!(path = %path.display(), bytes = upload.bytes.len(), "stored upload");
        Ok(format!("{url_dir}/{name}"))
    }

    async fn remove(&self, url: &str) -> Result<()> {
        let Some(path) = self.path_for_url(url) else {
            anyhow::bail!("refusing to remove {url}: not a stored upload");
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(name: &str) -> Upload {
        Upload {
            file_name: name.to_string(),
            content_type: Some("image/png".to_string()),
            bytes: b"\x89PNG fake".to_vec(),
        }
    }

    #[tokio::test]
    async fn test_post_images_go_under_posts() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path());

        let url = store.save(MediaKind::PostImage, &png("cat.PNG")).await.unwrap();
        assert!(url.starts_with("/uploads/posts/"));
        assert!(url.ends_with(".png"));

        let on_disk = dir.path().join(url.trim_start_matches("/uploads/"));
        assert_eq!(std::fs::read(&on_disk).unwrap(), b"\x89PNG fake");
    }

    #[tokio::test]
    async fn test_avatar_goes_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path());
        let url = store.save(MediaKind::Avatar, &png("me.png")).await.unwrap();
        assert!(url.starts_with("/uploads/"));
        assert!(!url.starts_with("/uploads/posts/"));
    }

    #[tokio::test]
    async fn test_remove_deletes_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path());
        let url = store.save(MediaKind::PostImage, &png("a.png")).await.unwrap();
        let on_disk = dir.path().join(url.trim_start_matches("/uploads/"));
        assert!(on_disk.exists());

        store.remove(&url).await.unwrap();
        assert!(!on_disk.exists());
        store.remove(&url).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_rejects_paths_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path());
        assert!(store.remove("/uploads/../secret.png").await.is_err());
        assert!(store.remove("/etc/passwd").await.is_err());
    }
}
