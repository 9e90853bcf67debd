//! Notification port (driven/secondary port)
//!
//! Outbound best-effort messages to users. Delivery may fail; callers log
//! the failure and carry on.

use serde::{Deserialize, Serialize};

use crate::domain::newtypes::Email;

/// A message addressed to one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Recipient address
    pub recipient: Email,
    /// Subject line
    pub subject: String,
    /// Plain-text body
    pub body: String,
}

impl Notification {
    pub fn new(recipient: Email, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            recipient,
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// Port trait for sending notifications
#[async_trait::async_trait]
pub trait INotifier: Send + Sync {
    /// Delivers a notification
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()>;
}
