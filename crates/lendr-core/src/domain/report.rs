//! Moderation report entity
//!
//! A report is a frozen snapshot: the target's contact details are copied
//! at submission time so later profile edits do not rewrite history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{errors::DomainError, newtypes::UserId, user::User, views::ContactInfo};

/// Longest accepted report reason, in characters
pub const MAX_REASON_LEN: usize = 1000;

/// A report filed against a community member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationReport {
    target: ContactInfo,
    reason: String,
    reporter_name: String,
    reported_at: DateTime<Utc>,
}

impl ModerationReport {
    /// Builds a report snapshot of `target` filed by `reporter`
    ///
    /// # Errors
    /// Returns `DomainError::ValidationFailed` when the reason is blank or
    /// too long, or when a user reports themselves.
    pub fn new(reporter: &User, target: &User, reason: &str) -> Result<Self, DomainError> {
        if reporter.id() == target.id() {
            return Err(DomainError::ValidationFailed(
                "users cannot report themselves".to_string(),
            ));
        }

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DomainError::ValidationFailed(
                "report reason cannot be empty".to_string(),
            ));
        }
        if reason.chars().count() > MAX_REASON_LEN {
            return Err(DomainError::ValidationFailed(format!(
                "report reason exceeds {MAX_REASON_LEN} characters"
            )));
        }

        Ok(Self {
            target: ContactInfo::from(target),
            reason: reason.to_string(),
            reporter_name: reporter.name().to_string(),
            reported_at: Utc::now(),
        })
    }

    /// Rebuilds a stored report
    pub fn restore(
        target: ContactInfo,
        reason: String,
        reporter_name: String,
        reported_at: DateTime<Utc>,
    ) -> Self {
        Self {
            target,
            reason,
            reporter_name,
            reported_at,
        }
    }

    /// Id of the reported user
    pub fn target_id(&self) -> &UserId {
        &self.target.user_id
    }

    /// Contact snapshot of the reported user
    pub fn target(&self) -> &ContactInfo {
        &self.target
    }

    /// Why the user was reported
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Name of the reporting user at submission time
    pub fn reporter_name(&self) -> &str {
        &self.reporter_name
    }

    /// When the report was filed
    pub fn reported_at(&self) -> DateTime<Utc> {
        self.reported_at
    }
}
