//! LoanLedger - read-side service over the loan log
//!
//! Wraps `IAuditLog` with per-user views: each record is tagged with the
//! role the user played and the other party, and a user's history can be
//! folded into a [`LoanSummary`]. Records are written only by the grant
//! commit in the listing store; this crate never writes.

use std::{collections::BTreeSet, sync::Arc};

use anyhow::Context;
use chrono::{DateTime, Utc};
use lendr_core::{
    domain::{ListingId, LoanRecord, UserId},
    ports::IAuditLog,
};
use serde::Serialize;

use crate::role::LoanRole;

/// Default cap on [`LoanLedger::recent`] results
pub const DEFAULT_RECENT_LIMIT: u32 = 50;

/// A loan record seen from one user's side
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub record: LoanRecord,
    pub role: LoanRole,
    /// The other party of the loan
    pub counterparty: UserId,
}

/// Totals over a user's loan history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoanSummary {
    pub lent: usize,
    pub borrowed: usize,
    /// Distinct users this user lent to or borrowed from
    pub partners: usize,
    pub last_loan_at: Option<DateTime<Utc>>,
}

/// Query service over the append-only loan log
pub struct LoanLedger {
    log: Arc<dyn IAuditLog + Send + Sync>,
}

impl LoanLedger {
    /// Creates a new `LoanLedger` backed by the given audit log.
    pub fn new(log: Arc<dyn IAuditLog + Send + Sync>) -> Self {
        Self { log }
    }

    /// Every loan `user` took part in, newest first
    pub async fn history(&self, user: &UserId) -> anyhow::Result<Vec<LedgerEntry>> {
        let records = self
            .log
            .loans_for_user(user)
            .await
            .with_context(|| format!("Failed to load loans for user {user}"))?;

        tracing::debug!(user = %user, count = records.len(), "Loaded loan history");

        Ok(records
            .into_iter()
            .filter_map(|record| entry_for(user, record))
            .collect())
    }

    /// Every loan of `listing`, newest first
    ///
    /// Records survive the listing's deletion, so this also answers for
    /// returned items.
    pub async fn listing_history(&self, listing: &ListingId) -> anyhow::Result<Vec<LoanRecord>> {
        let records = self
            .log
            .loans_for_listing(listing)
            .await
            .with_context(|| format!("Failed to load loans for listing {listing}"))?;

        tracing::debug!(listing = %listing, count = records.len(), "Loaded listing loans");
        Ok(records)
    }

    /// Loans granted at or after `since`, newest first, at most `limit`
    pub async fn recent(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> anyhow::Result<Vec<LoanRecord>> {
        let records = self
            .log
            .loans_since(since, limit)
            .await
            .context("Failed to load recent loans")?;

        tracing::debug!(since = %since, limit, count = records.len(), "Loaded recent loans");
        Ok(records)
    }

    /// Folds `user`'s history into totals
    pub async fn summary(&self, user: &UserId) -> anyhow::Result<LoanSummary> {
        Ok(summarize(&self.history(user).await?))
    }
}

fn entry_for(user: &UserId, record: LoanRecord) -> Option<LedgerEntry> {
    let (role, counterparty) = if record.lender_id() == user {
        (LoanRole::Lender, *record.borrower_id())
    } else if record.borrower_id() == user {
        (LoanRole::Borrower, *record.lender_id())
    } else {
        return None;
    };

    Some(LedgerEntry {
        record,
        role,
        counterparty,
    })
}

fn summarize(entries: &[LedgerEntry]) -> LoanSummary {
    let partners: BTreeSet<UserId> = entries.iter().map(|e| e.counterparty).collect();

    LoanSummary {
        lent: entries.iter().filter(|e| e.role == LoanRole::Lender).count(),
        borrowed: entries
            .iter()
            .filter(|e| e.role == LoanRole::Borrower)
            .count(),
        partners: partners.len(),
        last_loan_at: entries.iter().map(|e| e.record.granted_at()).max(),
    }
}
