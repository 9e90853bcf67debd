//! Photo storage in a local directory
//!
//! Each upload is written under a fresh UUID file name, keeping the
//! extension of the original file name (or one derived from the content
//! type). The returned URL is a `file://` URL to the stored copy.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use lendr_core::ports::{IBlobStore, PhotoUpload};

use crate::OutboundError;

/// `IBlobStore` writing to a directory on disk
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    dir: PathBuf,
}

impl LocalBlobStore {
    /// Creates a store writing into `dir`; the directory is created on the
    /// first upload
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `photo` and returns the `file://` URL of the stored file
    pub async fn store(&self, photo: &PhotoUpload) -> Result<String, OutboundError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let name = match extension_for(photo) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };
        let path = self.dir.join(name);
        tokio::fs::write(&path, &photo.bytes).await?;

        let absolute = tokio::fs::canonicalize(&path).await?;
        debug!(path = %absolute.display(), bytes = photo.bytes.len(), "Photo stored");
        Ok(format!("file://{}", absolute.display()))
    }
}

/// Short alphanumeric extension from the file name, else from the MIME type
fn extension_for(photo: &PhotoUpload) -> Option<String> {
    let from_name = photo
        .file_name
        .as_deref()
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    let from_type = || {
        let ext = match photo.content_type.as_deref()? {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => return None,
        };
        Some(ext.to_string())
    };

    from_name
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .or_else(from_type)
}

#[async_trait]
impl IBlobStore for LocalBlobStore {
    async fn upload(&self, photo: &PhotoUpload) -> anyhow::Result<String> {
        Ok(self.store(photo).await?)
    }
}
