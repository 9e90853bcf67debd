//! Adapter selection from configuration
//!
//! Maps the `notify` and `uploads` configuration sections onto concrete
//! port implementations, so callers only deal with trait objects.

use std::sync::Arc;

use tracing::info;

use lendr_core::{
    config::{NotifyConfig, UploadMode, UploadsConfig},
    ports::{IBlobStore, INotifier},
};

use crate::{HttpBlobUploader, LocalBlobStore, LogNotifier, OutboundError, SmtpNotifier};

/// SMTP when a relay is configured, log-only otherwise
pub fn build_notifier(
    config: &NotifyConfig,
) -> Result<Arc<dyn INotifier + Send + Sync>, OutboundError> {
    match config.smtp {
        Some(ref smtp) => {
            info!(host = %smtp.host, "Using SMTP notifier");
            Ok(Arc::new(SmtpNotifier::from_config(smtp)?))
        }
        None => {
            info!("No SMTP relay configured, notifications are logged only");
            Ok(Arc::new(LogNotifier::new()))
        }
    }
}

/// Local directory or HTTP image host, per `uploads.mode`
pub fn build_blob_store(
    config: &UploadsConfig,
) -> Result<Arc<dyn IBlobStore + Send + Sync>, OutboundError> {
    match config.mode {
        UploadMode::Local => {
            info!(dir = %config.local_dir.display(), "Storing photos locally");
            Ok(Arc::new(LocalBlobStore::new(config.local_dir.clone())))
        }
        UploadMode::Http => {
            let endpoint = config.endpoint.as_deref().ok_or_else(|| {
                OutboundError::InvalidConfig("uploads.endpoint is required in http mode".into())
            })?;

            let mut uploader = HttpBlobUploader::new(endpoint);
            if let Some(ref preset) = config.upload_preset {
                uploader = uploader.with_upload_preset(preset.clone());
            }

            info!(endpoint = %endpoint, "Uploading photos over HTTP");
            Ok(Arc::new(uploader))
        }
    }
}
