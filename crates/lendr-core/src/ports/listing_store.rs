//! Listing store port (driven/secondary port)
//!
//! Persistence for listings and the booking transitions between them and
//! their requesters.
//!
//! ## Design Notes
//!
//! - Every booking transition is committed through a single
//!   [`IListingStore::commit`] call so adapters can apply it inside one
//!   transaction.
//! - Commits are compare-and-swap on the listing version. A commit whose
//!   `expected_version` no longer matches writes nothing and reports
//!   [`CommitOutcome::Stale`].

use crate::domain::{
    newtypes::{CommunityId, ListingId, UserId},
    Listing, LoanRecord,
};

// ============================================================================
// ListingFilter
// ============================================================================

/// Filter criteria for querying listings
///
/// All fields are optional and combined with AND logic.
#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    /// Only listings in this community
    pub community: Option<CommunityId>,
    /// Only listings owned by this user
    pub owner: Option<UserId>,
    /// Exclude listings owned by this user
    pub exclude_owner: Option<UserId>,
    /// Exclude listings this user has a pending request on
    pub not_requested_by: Option<UserId>,
    /// Only rented (`true`) or available (`false`) listings
    pub rented: Option<bool>,
    /// Only listings held by this user
    pub given_to: Option<UserId>,
    /// Only listings this user has a pending request on
    pub requested_by: Option<UserId>,
}

impl ListingFilter {
    /// Creates an empty filter (matches all listings)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_community(mut self, community: CommunityId) -> Self {
        self.community = Some(community);
        self
    }

    pub fn with_owner(mut self, owner: UserId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn excluding_owner(mut self, owner: UserId) -> Self {
        self.exclude_owner = Some(owner);
        self
    }

    pub fn not_requested_by(mut self, user: UserId) -> Self {
        self.not_requested_by = Some(user);
        self
    }

    pub fn with_rented(mut self, rented: bool) -> Self {
        self.rented = Some(rented);
        self
    }

    pub fn given_to(mut self, holder: UserId) -> Self {
        self.given_to = Some(holder);
        self
    }

    pub fn requested_by(mut self, user: UserId) -> Self {
        self.requested_by = Some(user);
        self
    }

    /// Returns true if `listing` satisfies every set criterion
    ///
    /// Adapters that cannot push the filter down to storage can use this to
    /// filter in memory.
    pub fn matches(&self, listing: &Listing) -> bool {
        if let Some(ref community) = self.community {
            if listing.community_id() != community {
                return false;
            }
        }
        if let Some(ref owner) = self.owner {
            if listing.owner_id() != owner {
                return false;
            }
        }
        if let Some(ref owner) = self.exclude_owner {
            if listing.owner_id() == owner {
                return false;
            }
        }
        if let Some(ref user) = self.not_requested_by {
            if listing.is_requested_by(user) {
                return false;
            }
        }
        if let Some(rented) = self.rented {
            if listing.is_rented() != rented {
                return false;
            }
        }
        if let Some(ref holder) = self.given_to {
            if listing.given_to() != Some(holder) {
                return false;
            }
        }
        if let Some(ref user) = self.requested_by {
            if !listing.is_requested_by(user) {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// Transition
// ============================================================================

/// A booking transition to commit atomically
///
/// Each variant names the listing, the version the caller read, and the
/// user-side effects the store must apply in the same transaction.
#[derive(Debug, Clone)]
pub enum Transition {
    /// Append `requester` to the listing's pending requests
    Request {
        listing: ListingId,
        expected_version: u64,
        requester: UserId,
    },
    /// Remove `requester` from the listing's pending requests
    Cancel {
        listing: ListingId,
        expected_version: u64,
        requester: UserId,
    },
    /// Hand the listing to `holder`, drop every pending request in
    /// `released` and append `loan` to the audit log
    Grant {
        listing: ListingId,
        expected_version: u64,
        holder: UserId,
        released: Vec<UserId>,
        loan: LoanRecord,
    },
    /// End the loan: delete the listing and reward `holder`
    Return {
        listing: ListingId,
        expected_version: u64,
        holder: UserId,
        reward: i32,
    },
    /// Delete an available listing, dropping every pending request
    Delete {
        listing: ListingId,
        expected_version: u64,
        released: Vec<UserId>,
    },
}

impl Transition {
    /// Returns the listing this transition applies to
    pub fn listing(&self) -> &ListingId {
        match self {
            Transition::Request { listing, .. }
            | Transition::Cancel { listing, .. }
            | Transition::Grant { listing, .. }
            | Transition::Return { listing, .. }
            | Transition::Delete { listing, .. } => listing,
        }
    }

    /// Returns the version the transition was computed from
    pub fn expected_version(&self) -> u64 {
        match self {
            Transition::Request {
                expected_version, ..
            }
            | Transition::Cancel {
                expected_version, ..
            }
            | Transition::Grant {
                expected_version, ..
            }
            | Transition::Return {
                expected_version, ..
            }
            | Transition::Delete {
                expected_version, ..
            } => *expected_version,
        }
    }

    /// Returns a lowercase name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Request { .. } => "request",
            Transition::Cancel { .. } => "cancel",
            Transition::Grant { .. } => "grant",
            Transition::Return { .. } => "return",
            Transition::Delete { .. } => "delete",
        }
    }
}

/// Result of a compare-and-swap commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Every effect was written
    Applied,
    /// The listing changed (or vanished) since it was read; nothing written
    Stale,
}

// ============================================================================
// IListingStore trait
// ============================================================================

/// Port trait for listing persistence
#[async_trait::async_trait]
pub trait IListingStore: Send + Sync {
    /// Inserts a newly created listing
    async fn insert_listing(&self, listing: &Listing) -> anyhow::Result<()>;

    /// Retrieves a listing with its pending requesters in request order
    async fn get_listing(&self, id: &ListingId) -> anyhow::Result<Option<Listing>>;

    /// Retrieves every listing in `ids` that exists, in no particular order
    async fn get_listings(&self, ids: &[ListingId]) -> anyhow::Result<Vec<Listing>>;

    /// Queries listings, oldest first
    async fn query_listings(&self, filter: &ListingFilter) -> anyhow::Result<Vec<Listing>>;

    /// Applies a booking transition atomically
    async fn commit(&self, transition: &Transition) -> anyhow::Result<CommitOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = ListingFilter::new();
        assert!(filter.community.is_none());
        assert!(filter.rented.is_none());
    }

    #[test]
    fn test_transition_accessors() {
        let listing = ListingId::new();
        let t = Transition::Delete {
            listing,
            expected_version: 7,
            released: vec![],
        };
        assert_eq!(t.listing(), &listing);
        assert_eq!(t.expected_version(), 7);
        assert_eq!(t.name(), "delete");
    }
}
