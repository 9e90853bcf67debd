//! Listing domain entity and booking state machine
//!
//! A listing is either `Available` (zero or more pending requesters) or
//! `Rented` (exactly one holder, no pending requesters). The rented flag is
//! derived from the holder so the two can never disagree.
//!
//! Transition methods only validate and update the in-memory entity. The
//! booking use case is responsible for committing the matching store
//! transition atomically.

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeStruct, Serializer};

use super::{
    errors::DomainError,
    newtypes::{CommunityId, ListingId, UserId},
    user::User,
};

/// Longest accepted listing name, in characters
pub const MAX_NAME_LEN: usize = 120;

/// Booking state of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingState {
    /// Open for requests
    Available,
    /// Handed to a borrower
    Rented,
}

impl ListingState {
    /// Returns a lowercase name for the state
    pub fn name(&self) -> &'static str {
        match self {
            ListingState::Available => "available",
            ListingState::Rented => "rented",
        }
    }
}

impl std::fmt::Display for ListingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// An item offered for borrowing within a community
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    id: ListingId,
    name: String,
    details: Vec<String>,
    owner_id: UserId,
    photo_url: String,
    community_id: CommunityId,
    booked_by: Vec<UserId>,
    given_to: Option<UserId>,
    version: u64,
    created_at: DateTime<Utc>,
}

/// Plain field bag used by store adapters to rebuild a [`Listing`]
#[derive(Debug, Clone)]
pub struct ListingSnapshot {
    pub id: ListingId,
    pub name: String,
    pub details: Vec<String>,
    pub owner_id: UserId,
    pub photo_url: String,
    pub community_id: CommunityId,
    pub booked_by: Vec<UserId>,
    pub given_to: Option<UserId>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl Listing {
    /// Trims `name` and checks it is non-blank and at most [`MAX_NAME_LEN`]
    /// characters
    pub fn validate_name(name: &str) -> Result<&str, DomainError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::ValidationFailed(
                "listing name is required".to_string(),
            ));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(DomainError::ValidationFailed(format!(
                "listing name exceeds {MAX_NAME_LEN} characters"
            )));
        }
        Ok(name)
    }

    /// Creates an available listing owned by `owner`, in the owner's community
    ///
    /// Detail lines are trimmed and blank lines dropped.
    ///
    /// # Errors
    /// Returns `DomainError::ValidationFailed` for a blank or overlong name,
    /// or a blank photo URL.
    pub fn new(
        owner: &User,
        name: &str,
        details: Vec<String>,
        photo_url: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let name = Self::validate_name(name)?;

        let photo_url = photo_url.into();
        if photo_url.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "listing photo is required".to_string(),
            ));
        }

        let details = details
            .into_iter()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();

        Ok(Self {
            id: ListingId::new(),
            name: name.to_string(),
            details,
            owner_id: *owner.id(),
            photo_url,
            community_id: owner.community_id().clone(),
            booked_by: Vec::new(),
            given_to: None,
            version: 0,
            created_at: Utc::now(),
        })
    }

    // --- Getters ---

    /// Returns the listing identifier
    pub fn id(&self) -> &ListingId {
        &self.id
    }

    /// Returns the listing name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the free-text detail lines
    pub fn details(&self) -> &[String] {
        &self.details
    }

    /// Returns the owning user
    pub fn owner_id(&self) -> &UserId {
        &self.owner_id
    }

    /// Returns the photo URL
    pub fn photo_url(&self) -> &str {
        &self.photo_url
    }

    /// Returns the community the listing is offered in
    pub fn community_id(&self) -> &CommunityId {
        &self.community_id
    }

    /// Pending requesters, in request order
    pub fn booked_by(&self) -> &[UserId] {
        &self.booked_by
    }

    /// Current holder, if rented
    pub fn given_to(&self) -> Option<&UserId> {
        self.given_to.as_ref()
    }

    /// True iff the listing has a holder
    pub fn is_rented(&self) -> bool {
        self.given_to.is_some()
    }

    /// Returns the booking state
    pub fn state(&self) -> ListingState {
        if self.is_rented() {
            ListingState::Rented
        } else {
            ListingState::Available
        }
    }

    /// Optimistic-concurrency version, bumped by every committed transition
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns when the listing was created
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns true if `user` owns this listing
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        self.owner_id == *user
    }

    /// Returns true if `user` has a pending request on this listing
    pub fn is_requested_by(&self, user: &UserId) -> bool {
        self.booked_by.contains(user)
    }

    /// Records that a transition built from this snapshot was committed
    pub fn advance_version(&mut self) {
        self.version += 1;
    }
}

// ============================================================================
// State transitions
// ============================================================================

impl Listing {
    /// Adds `requester` to the pending set
    ///
    /// # Errors
    /// - `InvalidState` if the listing is rented
    /// - `OwnListing` if the requester owns the listing
    /// - `CommunityMismatch` if the requester is in another community
    /// - `AlreadyRequested` on a duplicate request
    pub fn request(&mut self, requester: &User) -> Result<(), DomainError> {
        self.ensure_available("requested")?;

        if self.is_owned_by(requester.id()) {
            return Err(DomainError::OwnListing { listing: self.id });
        }
        if requester.community_id() != &self.community_id {
            return Err(DomainError::CommunityMismatch { listing: self.id });
        }
        if self.is_requested_by(requester.id()) {
            return Err(DomainError::AlreadyRequested {
                listing: self.id,
                user: *requester.id(),
            });
        }

        self.booked_by.push(*requester.id());
        Ok(())
    }

    /// Hands the listing to `chosen`, releasing every pending request
    ///
    /// Returns every user whose pending request was released, the chosen
    /// borrower included, so their `booked_products` can be cleaned in the
    /// same commit.
    ///
    /// # Errors
    /// - `NotOwner` if `caller` does not own the listing
    /// - `InvalidState` if the listing is already rented
    /// - `NotPending` if `chosen` has not requested the listing
    pub fn grant(&mut self, caller: &UserId, chosen: &UserId) -> Result<Vec<UserId>, DomainError> {
        self.ensure_owner(caller)?;
        self.ensure_available("granted")?;

        if !self.is_requested_by(chosen) {
            return Err(DomainError::NotPending {
                listing: self.id,
                user: *chosen,
            });
        }

        let released = std::mem::take(&mut self.booked_by);
        self.given_to = Some(*chosen);
        Ok(released)
    }

    /// Checks that `caller` may end the loan and returns the holder
    ///
    /// # Errors
    /// - `InvalidState` if the listing is not rented
    /// - `NotParticipant` if `caller` is neither owner nor holder
    pub fn check_return(&self, caller: &UserId) -> Result<UserId, DomainError> {
        let Some(holder) = self.given_to else {
            return Err(DomainError::InvalidState {
                from: ListingState::Available.name().to_string(),
                to: "returned".to_string(),
            });
        };

        if !self.is_owned_by(caller) && holder != *caller {
            return Err(DomainError::NotParticipant { listing: self.id });
        }

        Ok(holder)
    }

    /// Withdraws `requester`'s pending request
    ///
    /// # Errors
    /// - `InvalidState` if the listing is rented
    /// - `NotPending` if `requester` has no pending request
    pub fn cancel(&mut self, requester: &UserId) -> Result<(), DomainError> {
        self.ensure_available("cancelled")?;

        let Some(position) = self.booked_by.iter().position(|id| id == requester) else {
            return Err(DomainError::NotPending {
                listing: self.id,
                user: *requester,
            });
        };

        self.booked_by.remove(position);
        Ok(())
    }

    /// Checks that `caller` may delete the listing and returns the pending
    /// requesters whose requests the deletion releases
    ///
    /// # Errors
    /// - `NotOwner` if `caller` does not own the listing
    /// - `InvalidState` if the listing is out on loan
    pub fn check_delete(&self, caller: &UserId) -> Result<Vec<UserId>, DomainError> {
        self.ensure_owner(caller)?;

        if self.is_rented() {
            return Err(DomainError::InvalidState {
                from: ListingState::Rented.name().to_string(),
                to: "deleted".to_string(),
            });
        }

        Ok(self.booked_by.clone())
    }

    fn ensure_owner(&self, caller: &UserId) -> Result<(), DomainError> {
        if self.is_owned_by(caller) {
            Ok(())
        } else {
            Err(DomainError::NotOwner { listing: self.id })
        }
    }

    fn ensure_available(&self, target: &str) -> Result<(), DomainError> {
        match self.state() {
            ListingState::Available => Ok(()),
            ListingState::Rented => Err(DomainError::InvalidState {
                from: ListingState::Rented.name().to_string(),
                to: target.to_string(),
            }),
        }
    }
}

// ============================================================================
// Reconstitution and serialization
// ============================================================================

impl TryFrom<ListingSnapshot> for Listing {
    type Error = DomainError;

    /// Rebuilds a stored listing, re-checking the booking invariants
    fn try_from(s: ListingSnapshot) -> Result<Self, Self::Error> {
        if s.given_to.is_some() && !s.booked_by.is_empty() {
            return Err(DomainError::ValidationFailed(format!(
                "rented listing {} still has pending requesters",
                s.id
            )));
        }
        if s.given_to == Some(s.owner_id) || s.booked_by.contains(&s.owner_id) {
            return Err(DomainError::ValidationFailed(format!(
                "listing {} is booked by its own owner",
                s.id
            )));
        }
        let mut seen = s.booked_by.clone();
        seen.sort();
        seen.dedup();
        if seen.len() != s.booked_by.len() {
            return Err(DomainError::ValidationFailed(format!(
                "listing {} has duplicate requesters",
                s.id
            )));
        }

        Ok(Self {
            id: s.id,
            name: s.name,
            details: s.details,
            owner_id: s.owner_id,
            photo_url: s.photo_url,
            community_id: s.community_id,
            booked_by: s.booked_by,
            given_to: s.given_to,
            version: s.version,
            created_at: s.created_at,
        })
    }
}

impl Serialize for Listing {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut doc = serializer.serialize_struct("Listing", 10)?;
        doc.serialize_field("id", &self.id)?;
        doc.serialize_field("name", &self.name)?;
        doc.serialize_field("details", &self.details)?;
        doc.serialize_field("owner_id", &self.owner_id)?;
        doc.serialize_field("photo_url", &self.photo_url)?;
        doc.serialize_field("community_id", &self.community_id)?;
        doc.serialize_field("booked_by", &self.booked_by)?;
        doc.serialize_field("given_to", &self.given_to)?;
        doc.serialize_field("is_rented", &self.is_rented())?;
        doc.serialize_field("created_at", &self.created_at)?;
        doc.end()
    }
}
