//! Audit log port (driven/secondary port)
//!
//! Read access to the append-only loan log. Entries are written only as
//! part of a grant commit (see
//! [`Transition::Grant`](super::Transition::Grant)); this port deliberately
//! exposes no update or delete.

use chrono::{DateTime, Utc};

use crate::domain::{
    newtypes::{ListingId, UserId},
    LoanRecord,
};

/// Port trait for querying loan records
#[async_trait::async_trait]
pub trait IAuditLog: Send + Sync {
    /// All loans where `user` was lender or borrower, newest first
    async fn loans_for_user(&self, user: &UserId) -> anyhow::Result<Vec<LoanRecord>>;

    /// All loans of `listing`, newest first
    async fn loans_for_listing(&self, listing: &ListingId) -> anyhow::Result<Vec<LoanRecord>>;

    /// Loans granted at or after `since`, newest first, at most `limit`
    async fn loans_since(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> anyhow::Result<Vec<LoanRecord>>;
}
