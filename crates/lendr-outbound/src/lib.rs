//! Lendr Outbound - adapters for the notification and blob ports
//!
//! Provides:
//! - SMTP delivery of user notifications (and a log-only fallback)
//! - Photo uploads to an HTTP image host or a local directory
//!
//! ## Modules
//!
//! - [`mail`] - [`SmtpNotifier`] and [`LogNotifier`] (`INotifier`)
//! - [`upload`] - [`HttpBlobUploader`] (`IBlobStore`, multipart POST)
//! - [`local`] - [`LocalBlobStore`] (`IBlobStore`, filesystem)
//! - [`provider`] - picks adapters from configuration

pub mod local;
pub mod mail;
pub mod provider;
pub mod upload;

pub use local::LocalBlobStore;
pub use mail::{LogNotifier, SmtpNotifier};
pub use provider::{build_blob_store, build_notifier};
pub use upload::HttpBlobUploader;

use thiserror::Error;

/// Errors raised by the outbound adapters
#[derive(Debug, Error)]
pub enum OutboundError {
    /// Configuration cannot produce a working adapter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An email address could not be parsed
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The message could not be assembled
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// The SMTP relay refused or failed the delivery
    #[error("SMTP error: {0}")]
    Smtp(String),

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The image host answered with a non-success status
    #[error("Upload rejected with status {status}: {body}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// The response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Local filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
