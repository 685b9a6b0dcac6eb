// Image uploads: validation rules and the storage seam.
//
// Only images are accepted: the file extension and the declared MIME type
// must both name one of jpeg/jpg/png/gif/webp. Stored files are addressed by
// a public `/uploads/...` URL which the web server serves statically.

pub mod local;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

pub use local::LocalMediaStore;

/// Largest accepted file.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Most images attached to one post.
pub const MAX_POST_IMAGES: usize = 4;

/// URL prefix every stored file is served under.
pub const PUBLIC_PREFIX: &str = "/uploads";

const IMAGE_TYPES: [&str; 5] = ["jpeg", "jpg", "png", "gif", "webp"];

/// A file received from a multipart form.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaRejection {
    #[error("Only image files are allowed")]
    NotAnImage,

    #[error("File too large (max 5 MB)")]
    TooLarge,

    #[error("Too many images (max 4)")]
    TooMany,
}

/// What an upload is for; decides where it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    PostImage,
    Avatar,
    Cover,
}

impl MediaKind {
    /// Subdirectory under the upload root, if any.
    pub fn subdir(&self) -> Option<&'static str> {
        match self {
            MediaKind::PostImage => Some("posts"),
            MediaKind::Avatar | MediaKind::Cover => None,
        }
    }
}

/// Lowercased file extension, if it names an accepted image type.
pub fn image_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|s| s.to_str())?
        .to_ascii_lowercase();
    IMAGE_TYPES.contains(&ext.as_str()).then_some(ext)
}

/// Check that an upload is an acceptable image.
pub fn validate_image(upload: &Upload) -> Result<(), MediaRejection> {
    let mime_ok = upload
        .content_type
        .as_deref()
        .map(str::to_ascii_lowercase)
        .is_some_and(|ct| IMAGE_TYPES.iter().any(|t| ct.contains(t)));

    if !mime_ok || image_extension(&upload.file_name).is_none() {
        return Err(MediaRejection::NotAnImage);
    }
    if upload.bytes.len() > MAX_IMAGE_BYTES {
        return Err(MediaRejection::TooLarge);
    }
    Ok(())
}

/// Check a post's attachments as a batch.
pub fn validate_post_images(uploads: &[Upload]) -> Result<(), MediaRejection> {
    if uploads.len() > MAX_POST_IMAGES {
        return Err(MediaRejection::TooMany);
    }
    uploads.iter().try_for_each(validate_image)
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Persist a validated upload and return its public URL.
    async fn save(&self, kind: MediaKind, upload: &Upload) -> Result<String>;

    /// Remove a stored file by public URL. Missing files are not an error.
    async fn remove(&self, url: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str, content_type: Option<&str>, len: usize) -> Upload {
        Upload {
            file_name: name.to_string(),
            content_type: content_type.map(str::to_string),
            bytes: vec![0u8; len],
        }
    }

    #[test]
    fn test_accepts_common_images() {
        assert!(validate_image(&upload("a.png", Some("image/png"), 10)).is_ok());
        assert!(validate_image(&upload("b.JPG", Some("image/jpeg"), 10)).is_ok());
        assert!(validate_image(&upload("c.webp", Some("image/webp"), 10)).is_ok());
    }

    #[test]
    fn test_rejects_mismatched_or_missing_type() {
        assert_eq!(
            validate_image(&upload("a.png", Some("application/pdf"), 10)),
            Err(MediaRejection::NotAnImage)
        );
        assert_eq!(
            validate_image(&upload("a.exe", Some("image/png"), 10)),
            Err(MediaRejection::NotAnImage)
        );
        assert_eq!(
            validate_image(&upload("noext", Some("image/png"), 10)),
            Err(MediaRejection::NotAnImage)
        );
        assert_eq!(
            validate_image(&upload("a.png", None, 10)),
            Err(MediaRejection::NotAnImage)
        );
    }

    #[test]
    fn test_size_limit() {
        assert!(validate_image(&upload("a.gif", Some("image/gif"), MAX_IMAGE_BYTES)).is_ok());
        assert_eq!(
            validate_image(&upload("a.gif", Some("image/gif"), MAX_IMAGE_BYTES + 1)),
            Err(MediaRejection::TooLarge)
        );
    }

    #[test]
    fn test_post_image_count() {
        let four: Vec<Upload> = (0..4)
            .map(|i| upload(&format!("{i}.png"), Some("image/png"), 1))
            .collect();
        assert!(validate_post_images(&four).is_ok());
        let mut five = four.clone();
        five.push(upload("5.png", Some("image/png"), 1));
        assert_eq!(validate_post_images(&five), Err(MediaRejection::TooMany));
    }

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("photo.JPEG").as_deref(), Some("jpeg"));
        assert_eq!(image_extension("archive.tar.gz"), None);
    }
}
