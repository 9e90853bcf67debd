//! Blob store port (driven/secondary port)
//!
//! Durable storage for listing photos and profile pictures. The store
//! returns a URL that is persisted on the owning entity.

/// Raw photo bytes plus content hints
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    /// Raw image bytes
    pub bytes: Vec<u8>,
    /// Original file name, if known
    pub file_name: Option<String>,
    /// MIME type hint, if known
    pub content_type: Option<String>,
}

impl PhotoUpload {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            file_name: None,
            content_type: None,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Port trait for photo uploads
#[async_trait::async_trait]
pub trait IBlobStore: Send + Sync {
    /// Stores the photo and returns its durable URL
    async fn upload(&self, photo: &PhotoUpload) -> anyhow::Result<String>;
}
