//! Photo uploads to an HTTP image host
//!
//! [`HttpBlobUploader`] posts each photo as `multipart/form-data` with a
//! `file` part and, when configured, an unsigned `upload_preset` field. The
//! host answers with JSON carrying the public URL (`secure_url`, falling
//! back to `url`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use serde::Deserialize;
use tracing::{debug, warn};

use lendr_core::ports::{IBlobStore, PhotoUpload};

use crate::OutboundError;

/// Request timeout for one upload
const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Longest error body kept in [`OutboundError::Rejected`]
const MAX_ERROR_BODY: usize = 512;

/// Upload response from the image host
#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    url: Option<String>,
}

/// `IBlobStore` that uploads to an HTTP image host
pub struct HttpBlobUploader {
    client: Client,
    endpoint: String,
    upload_preset: Option<String>,
    timeout: Duration,
}

impl HttpBlobUploader {
    /// Creates an uploader posting to `endpoint`
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            upload_preset: None,
            timeout: DEFAULT_UPLOAD_TIMEOUT,
        }
    }

    pub fn with_upload_preset(mut self, preset: impl Into<String>) -> Self {
        self.upload_preset = Some(preset.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Uploads one photo and returns its public URL
    ///
    /// # Errors
    ///
    /// - `NetworkError` if the request cannot be sent or times out
    /// - `Rejected` for a non-success status
    /// - `InvalidResponse` if the body carries no URL
    pub async fn upload_photo(&self, photo: &PhotoUpload) -> Result<String, OutboundError> {
        let mut part = Part::bytes(photo.bytes.clone())
            .file_name(photo.file_name.clone().unwrap_or_else(|| "photo".to_string()));
        if let Some(ref content_type) = photo.content_type {
            part = part.mime_str(content_type)?;
        }

        let mut form = Form::new().part("file", part);
        if let Some(ref preset) = self.upload_preset {
            form = form.text("upload_preset", preset.clone());
        }

        debug!(endpoint = %self.endpoint, bytes = photo.bytes.len(), "Uploading photo");

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(
                body.char_indices()
                    .nth(MAX_ERROR_BODY)
                    .map_or(body.len(), |(i, _)| i),
            );
            warn!(status = status.as_u16(), "Image host rejected upload");
            return Err(OutboundError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(|e| OutboundError::InvalidResponse(e.to_string()))?;

        let url = parsed.secure_url.or(parsed.url).ok_or_else(|| {
            OutboundError::InvalidResponse("upload response has no URL".to_string())
        })?;

        debug!(url = %url, "Photo uploaded");
        Ok(url)
    }
}

#[async_trait]
impl IBlobStore for HttpBlobUploader {
    async fn upload(&self, photo: &PhotoUpload) -> anyhow::Result<String> {
        Ok(self.upload_photo(photo).await?)
    }
}
