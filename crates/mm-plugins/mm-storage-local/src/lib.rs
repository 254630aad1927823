//! # mm-storage-local
//!
//! Local filesystem implementation of `ObjectStore`.
//! Objects live under a root directory at their logical path; image uploads
//! also get a 250px WebP thumbnail next to them.

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, ImageReader};
use mime::Mime;
use mm_core::traits::{ObjectHandle, ObjectStore};
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

const THUMBNAIL_EDGE: u32 = 250;

pub struct LocalObjectStore {
    /// Root directory for all uploads (e.g., "./data/uploads")
    root_path: PathBuf,
    /// Public URL prefix (e.g., "/static/uploads")
    url_prefix: String,
}

impl LocalObjectStore {
    pub fn new(root: PathBuf, url_prefix: String) -> Self {
        Self {
            root_path: root,
            url_prefix,
        }
    }

    /// Maps a logical object path onto the filesystem, refusing escapes from the root.
    fn resolve(&self, path: &str) -> anyhow::Result<PathBuf> {
        let relative = Path::new(path);
        if path.is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            anyhow::bail!("invalid object path: {path:?}");
        }
        Ok(self.root_path.join(relative))
    }

    /// Thumbnail location for an object stored at `target`.
    fn thumbnail_path(target: &Path) -> PathBuf {
        let stem = target
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        target.with_file_name(format!("thumb_{stem}.webp"))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    /// Saves the bytes at `path`, overwriting any previous upload.
    async fn upload(
        &self,
        path: &str,
        data: Bytes,
        content_type: &Mime,
    ) -> anyhow::Result<ObjectHandle> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        if content_type.type_() == mime::IMAGE {
            let thumb = Self::thumbnail_path(&target);
            let source = data.clone();
            tokio::task::spawn_blocking(move || generate_thumbnail(&source, &thumb)).await??;
        }

        fs::write(&target, &data).await?;
        tracing::debug!(path, bytes = data.len(), "object stored");
        Ok(ObjectHandle {
            path: path.to_string(),
        })
    }

    async fn find(&self, path: &str) -> anyhow::Result<Option<ObjectHandle>> {
        let target = self.resolve(path)?;
        if fs::try_exists(&target).await? {
            Ok(Some(ObjectHandle {
                path: path.to_string(),
            }))
        } else {
            Ok(None)
        }
    }

    async fn public_url(&self, handle: &ObjectHandle) -> anyhow::Result<String> {
        Ok(format!(
            "{}/{}",
            self.url_prefix.trim_end_matches('/'),
            handle.path
        ))
    }
}

/// Decodes the upload and writes a WebP thumbnail. Fails for bytes that are not an image.
fn generate_thumbnail(data: &[u8], thumb_path: &Path) -> anyhow::Result<()> {
    let img = ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .decode()?;

    let thumb = img.thumbnail(THUMBNAIL_EDGE, THUMBNAIL_EDGE);
    DynamicImage::ImageRgba8(thumb.to_rgba8()).save_with_format(thumb_path, ImageFormat::WebP)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes() -> Bytes {
        let img = image::RgbImage::from_pixel(400, 300, image::Rgb([200, 40, 90]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        Bytes::from(buf.into_inner())
    }

    #[tokio::test]
    async fn upload_writes_object_and_thumbnail() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().to_path_buf(), "/static/uploads/".into());

        let handle = store
            .upload("avatars/u1/avatar.jpg", png_bytes(), &mime::IMAGE_JPEG)
            .await
            .unwrap();

        assert!(dir.path().join("avatars/u1/avatar.jpg").exists());
        assert!(dir.path().join("avatars/u1/thumb_avatar.webp").exists());
        assert_eq!(
            store.public_url(&handle).await.unwrap(),
            "/static/uploads/avatars/u1/avatar.jpg"
        );
        assert!(store.find("avatars/u1/avatar.jpg").await.unwrap().is_some());
        assert!(store.find("avatars/u2/avatar.jpg").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_undecodable_images() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().to_path_buf(), "/u".into());
        let result = store
            .upload("avatars/u1/avatar.jpg", Bytes::from_static(b"not an image"), &mime::IMAGE_JPEG)
            .await;
        assert!(result.is_err());
        assert!(!dir.path().join("avatars/u1/avatar.jpg").exists());
    }

    #[tokio::test]
    async fn rejects_paths_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().to_path_buf(), "/u".into());
        for bad in ["../escape.txt", "/etc/passwd", ""] {
            let result = store
                .upload(bad, Bytes::from_static(b"x"), &mime::TEXT_PLAIN)
                .await;
            assert!(result.is_err(), "{bad} should be rejected");
        }
    }
}
