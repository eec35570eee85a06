use std::io::Write;
use std::path::Path;

use actix_multipart::{Multipart, MultipartError};
use futures::{StreamExt, TryStreamExt};
use shared::Coordinates;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Multipart field that carries the leaf photographs.
pub const IMAGES_FIELD: &str = "images";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("multipart stream failed: {0}")]
    Multipart(#[from] MultipartError),
    #[error("could not spool upload: {0}")]
    Io(#[from] std::io::Error),
}

/// One uploaded photograph. The spooled copy is deleted when the image drops.
#[derive(Debug)]
pub struct LeafImage {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub coordinates: Option<Coordinates>,
    _spool: Option<NamedTempFile>,
}

impl LeafImage {
    pub fn from_bytes(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
            coordinates: None,
            _spool: None,
        }
    }

    pub fn spooled(filename: String, bytes: Vec<u8>, upload_dir: &Path) -> Result<Self, UploadError> {
        std::fs::create_dir_all(upload_dir)?;
        let mut spool = tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(upload_dir)?;
        spool.write_all(&bytes)?;
        spool.flush()?;
        log::debug!("Spooled {} to {}", filename, spool.path().display());

        Ok(Self {
            filename,
            bytes,
            coordinates: None,
            _spool: Some(spool),
        })
    }
}

/// Reads every non-empty `images` part of the upload, in arrival order.
pub async fn collect_images(mut payload: Multipart, upload_dir: &Path) -> Result<Vec<LeafImage>, UploadError> {
    let mut images = Vec::new();

    while let Some(mut field) = payload.try_next().await? {
        let is_image = field.name() == Some(IMAGES_FIELD);
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        if !is_image {
            log::debug!("Ignoring multipart field {:?}", field.name());
            while let Some(chunk) = field.next().await {
                chunk?;
            }
            continue;
        }

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            data.extend_from_slice(&chunk?);
        }
        if data.is_empty() {
            continue;
        }
        let filename = filename.unwrap_or_else(|| format!("image-{}.jpg", images.len() + 1));
        images.push(LeafImage::spooled(filename, data, upload_dir)?);
    }

    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spooled_copy_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        let image = LeafImage::spooled("leaf.jpg".into(), b"\xFF\xD8\xFF\xD9".to_vec(), &uploads).unwrap();

        let path = image._spool.as_ref().unwrap().path().to_path_buf();
        assert!(path.starts_with(&uploads));
        assert_eq!(std::fs::read(&path).unwrap(), b"\xFF\xD8\xFF\xD9");

        drop(image);
        assert!(!path.exists());
    }

    #[test]
    fn in_memory_image_has_no_spool() {
        let image = LeafImage::from_bytes("leaf.jpg", vec![1, 2, 3]);
        assert!(image._spool.is_none());
        assert!(image.coordinates.is_none());
    }
}
