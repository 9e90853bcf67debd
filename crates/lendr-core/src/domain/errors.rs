//! Domain error types
//!
//! Errors raised by entity constructors and listing transition methods.
//! Every variant describes a violated precondition; none of them carry
//! storage details.

use thiserror::Error;

use super::newtypes::{ListingId, UserId};

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid email address format
    #[error("Invalid email format: {0}")]
    InvalidEmail(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Invalid community slug
    #[error("Invalid community: {0}")]
    InvalidCommunity(String),

    /// Reputation outside `[0, 100]`
    #[error("Reputation {0} is outside the range 0-100")]
    InvalidReputation(i64),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Invalid state transition attempt
    #[error("Listing cannot move from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted transition
        to: String,
    },

    /// Caller does not own the listing
    #[error("Only the owner of listing {listing} may do this")]
    NotOwner {
        /// The listing being acted on
        listing: ListingId,
    },

    /// Caller is neither the owner nor the current holder
    #[error("Only the owner or the current borrower of listing {listing} may do this")]
    NotParticipant {
        /// The listing being acted on
        listing: ListingId,
    },

    /// Owner tried to request their own listing
    #[error("Listing {listing} belongs to the requester")]
    OwnListing {
        /// The listing being requested
        listing: ListingId,
    },

    /// Requester already has a pending request on the listing
    #[error("User {user} has already requested listing {listing}")]
    AlreadyRequested {
        /// The listing being requested
        listing: ListingId,
        /// The duplicate requester
        user: UserId,
    },

    /// User has no pending request on the listing
    #[error("User {user} has no pending request on listing {listing}")]
    NotPending {
        /// The listing being acted on
        listing: ListingId,
        /// The user expected in the pending set
        user: UserId,
    },

    /// Requester and listing belong to different communities
    #[error("Listing {listing} is not offered in the requester's community")]
    CommunityMismatch {
        /// The listing being requested
        listing: ListingId,
    },
}
