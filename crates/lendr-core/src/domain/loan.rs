//! Loan record entity
//!
//! One append-only row per successful grant. Records are never updated or
//! deleted, even when the listing they refer to is later removed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    listing::Listing,
    newtypes::{ListingId, LoanId, UserId},
};

/// An entry in the loan audit log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRecord {
    id: Option<LoanId>,
    lender_id: UserId,
    borrower_id: UserId,
    listing_id: ListingId,
    listing_name: String,
    granted_at: DateTime<Utc>,
}

impl LoanRecord {
    /// Records `borrower` receiving `listing` from its owner, timestamped now
    ///
    /// The id is assigned by the store on insert.
    pub fn granted(listing: &Listing, borrower: UserId) -> Self {
        Self {
            id: None,
            lender_id: *listing.owner_id(),
            borrower_id: borrower,
            listing_id: *listing.id(),
            listing_name: listing.name().to_string(),
            granted_at: Utc::now(),
        }
    }

    /// Rebuilds a stored record
    pub fn restore(
        id: LoanId,
        lender_id: UserId,
        borrower_id: UserId,
        listing_id: ListingId,
        listing_name: String,
        granted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Some(id),
            lender_id,
            borrower_id,
            listing_id,
            listing_name,
            granted_at,
        }
    }

    /// Sets the store-assigned id
    pub fn with_id(mut self, id: LoanId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn id(&self) -> Option<LoanId> {
        self.id
    }

    pub fn lender_id(&self) -> &UserId {
        &self.lender_id
    }

    pub fn borrower_id(&self) -> &UserId {
        &self.borrower_id
    }

    pub fn listing_id(&self) -> &ListingId {
        &self.listing_id
    }

    /// Listing name at grant time
    pub fn listing_name(&self) -> &str {
        &self.listing_name
    }

    pub fn granted_at(&self) -> DateTime<Utc> {
        self.granted_at
    }
}
