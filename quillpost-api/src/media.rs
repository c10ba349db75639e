//! Local image storage behind `POST /upload`.
//!
//! Files land flat in one directory under a random id that keeps the image's
//! extension. The id is all a client ever gets to name a file by.

use quillpost_common::model::ImageRef;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Only jpg, jpeg and png images are accepted, got {0:?}")]
    UnsupportedType(String),
    #[error("The image is larger than {max_bytes} bytes")]
    TooLarge { max_bytes: usize },
    #[error("The image was empty")]
    Empty,
    #[error("Image {0:?} does not exist")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
        }
    }

    #[must_use]
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
            "image/png" => Some(ImageFormat::Png),
            _ => None,
        }
    }

    #[must_use]
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let (_, extension) = file_name.rsplit_once('.')?;
        match extension.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            _ => None,
        }
    }

    /// Content type wins; the file name is the fallback for generic uploads.
    pub fn detect(content_type: Option<&str>, file_name: Option<&str>) -> Result<Self, MediaError> {
        content_type
            .and_then(Self::from_content_type)
            .or_else(|| file_name.and_then(Self::from_file_name))
            .ok_or_else(|| {
                MediaError::UnsupportedType(
                    content_type.or(file_name).unwrap_or_default().to_owned(),
                )
            })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct MediaStore {
    dir: PathBuf,
    base_url: String,
    max_bytes: usize,
}

impl MediaStore {
    #[must_use]
    pub fn new(dir: PathBuf, base_url: &str, max_bytes: usize) -> Self {
        Self {
            dir,
            base_url: base_url.trim_end_matches('/').to_owned(),
            max_bytes,
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the files are served from, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub async fn prepare(&self) -> Result<(), MediaError> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    pub async fn save(&self, format: ImageFormat, bytes: &[u8]) -> Result<ImageRef, MediaError> {
        if bytes.is_empty() {
            return Err(MediaError::Empty);
        }
        if bytes.len() > self.max_bytes {
            return Err(MediaError::TooLarge {
                max_bytes: self.max_bytes,
            });
        }

        let img_id = format!("{:032x}.{}", rand::random::<u128>(), format.extension());
        fs::write(self.dir.join(&img_id), bytes).await?;
        debug!(%img_id, len = bytes.len(), "Stored image");

        Ok(ImageRef {
            url: format!("{}/{img_id}", self.base_url),
            img_id,
        })
    }

    pub async fn delete(&self, img_id: &str) -> Result<(), MediaError> {
        let path = self
            .path_of(img_id)
            .ok_or_else(|| MediaError::NotFound(img_id.to_owned()))?;

        match fs::remove_file(path).await {
            Ok(()) => {
                debug!(%img_id, "Deleted image");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(MediaError::NotFound(img_id.to_owned()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// `None` for ids that could point outside the media directory.
    fn path_of(&self, img_id: &str) -> Option<PathBuf> {
        let is_plain = !img_id.is_empty()
            && !img_id.contains("..")
            && !img_id.contains(['/', '\\', '\0']);

        is_plain.then(|| self.dir.join(img_id))
    }
}

#[cfg(test)]
mod tests {
    use crate::media::{ImageFormat, MediaError, MediaStore};
    use std::path::PathBuf;

    fn store(max_bytes: usize) -> MediaStore {
        let dir: PathBuf =
            std::env::temp_dir().join(format!("quillpost-media-{:016x}", rand::random::<u64>()));
        MediaStore::new(dir, "/uploads/", max_bytes)
    }

    #[test]
    fn detects_formats() {
        assert_eq!(
            ImageFormat::detect(Some("image/png"), Some("cat.jpg")).unwrap(),
            ImageFormat::Png
        );
        assert_eq!(
            ImageFormat::detect(Some("application/octet-stream"), Some("cat.JPEG")).unwrap(),
            ImageFormat::Jpeg
        );
        assert!(matches!(
            ImageFormat::detect(Some("image/gif"), Some("cat.gif")),
            Err(MediaError::UnsupportedType(_))
        ));
        assert!(ImageFormat::detect(None, None).is_err());
    }

    #[tokio::test]
    async fn save_and_delete() {
        let store = store(16);
        store.prepare().await.unwrap();

        let image = store.save(ImageFormat::Png, b"not really a png").await.unwrap();
        assert!(image.img_id.ends_with(".png"));
        assert_eq!(image.url, format!("/uploads/{}", image.img_id));
        assert!(store.dir().join(&image.img_id).exists());

        store.delete(&image.img_id).await.unwrap();
        assert!(matches!(
            store.delete(&image.img_id).await,
            Err(MediaError::NotFound(_))
        ));

        tokio::fs::remove_dir_all(store.dir()).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_oversized_and_escaping() {
        let store = store(4);
        store.prepare().await.unwrap();

        assert!(matches!(
            store.save(ImageFormat::Jpeg, b"12345").await,
            Err(MediaError::TooLarge { max_bytes: 4 })
        ));
        assert!(matches!(
            store.save(ImageFormat::Jpeg, b"").await,
            Err(MediaError::Empty)
        ));

        for img_id in ["", "..", "../secret", "a/b.png", "a\\b.png"] {
            assert!(
                matches!(store.delete(img_id).await, Err(MediaError::NotFound(_))),
                "{img_id}"
            );
        }

        tokio::fs::remove_dir_all(store.dir()).await.unwrap();
    }
}
