//! Booking use case
//!
//! Drives a listing through its lifecycle: request, grant, return, cancel
//! and delete. Each operation follows the same shape:
//!
//! 1. Take the listing's in-process lock
//! 2. Re-read the listing (and users where needed) from the stores
//! 3. Validate and apply the transition on the domain entity
//! 4. Commit the matching [`Transition`] atomically, compare-and-swap on
//!    the version read in step 2
//!
//! A lost compare-and-swap surfaces as `Conflict`; nothing is written.

use std::{sync::Arc, time::Duration};

use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info};

use super::{
    error::{guarded, ErrorKind, LendingError, LendingResult},
    locks::ListingLocks,
};
use crate::{
    domain::{Listing, ListingId, LoanRecord, User, UserId},
    ports::{CommitOutcome, IIdentityStore, IListingStore, Transition},
};

/// Default upper bound for a single store call
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default reputation awarded to a borrower on return
pub const DEFAULT_RETURN_REWARD: u8 = 1;

/// Use case for listing booking transitions
pub struct BookingEngine {
    identity: Arc<dyn IIdentityStore + Send + Sync>,
    listings: Arc<dyn IListingStore + Send + Sync>,
    locks: ListingLocks,
    store_timeout: Duration,
    return_reward: i32,
}

impl BookingEngine {
    /// Creates a new BookingEngine with the required dependencies
    ///
    /// # Arguments
    ///
    /// * `identity` - User store, read to validate requesters
    /// * `listings` - Listing store that commits every transition
    pub fn new(
        identity: Arc<dyn IIdentityStore + Send + Sync>,
        listings: Arc<dyn IListingStore + Send + Sync>,
    ) -> Self {
        Self {
            identity,
            listings,
            locks: ListingLocks::new(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            return_reward: i32::from(DEFAULT_RETURN_REWARD),
        }
    }

    /// Shares a lock map with other engines in the same process
    pub fn with_locks(mut self, locks: ListingLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_return_reward(mut self, points: u8) -> Self {
        self.return_reward = i32::from(points);
        self
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Adds `requester` to the listing's pending requests
    ///
    /// # Errors
    ///
    /// - `NotFound` if the listing or requester does not exist
    /// - `InvalidState` if the listing is rented, owned by the requester, or
    ///   already requested by them
    /// - `Unauthorized` if the requester belongs to another community
    /// - `Conflict` if the listing changed concurrently
    pub async fn request(
        &self,
        listing_id: &ListingId,
        requester_id: &UserId,
    ) -> LendingResult<Listing> {
        let (_guard, mut listing) = self.lock_listing(listing_id).await?;
        let requester = self.load_user(requester_id).await?;
        let expected_version = listing.version();

        listing.request(&requester)?;

        self.commit(Transition::Request {
            listing: *listing_id,
            expected_version,
            requester: *requester_id,
        })
        .await?;
        listing.advance_version();

        info!(
            listing = %listing_id,
            requester = %requester_id,
            pending = listing.booked_by().len(),
            "Listing requested"
        );
        Ok(listing)
    }

    /// Hands the listing to `chosen`, clearing every pending request and
    /// recording a loan
    ///
    /// # Errors
    ///
    /// - `NotFound` if the listing does not exist
    /// - `Unauthorized` if `caller` is not the owner
    /// - `InvalidState` if the listing is rented or `chosen` has no pending
    ///   request
    /// - `Conflict` if the listing changed concurrently
    pub async fn grant(
        &self,
        listing_id: &ListingId,
        caller: &UserId,
        chosen: &UserId,
    ) -> LendingResult<Listing> {
        let (_guard, mut listing) = self.lock_listing(listing_id).await?;
        let expected_version = listing.version();

        let released = listing.grant(caller, chosen)?;
        let loan = LoanRecord::granted(&listing, *chosen);

        self.commit(Transition::Grant {
            listing: *listing_id,
            expected_version,
            holder: *chosen,
            released: released.clone(),
            loan,
        })
        .await?;
        listing.advance_version();

        info!(
            listing = %listing_id,
            lender = %caller,
            borrower = %chosen,
            released = released.len(),
            "Listing granted"
        );
        Ok(listing)
    }

    /// Ends the loan: deletes the listing and rewards the borrower
    ///
    /// Returns the listing as it was when returned.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the listing does not exist (including a second return)
    /// - `InvalidState` if the listing is not rented
    /// - `Unauthorized` if `caller` is neither owner nor borrower
    /// - `Conflict` if the listing changed concurrently
    pub async fn return_item(
        &self,
        listing_id: &ListingId,
        caller: &UserId,
    ) -> LendingResult<Listing> {
        let (guard, listing) = self.lock_listing(listing_id).await?;
        let holder = listing.check_return(caller)?;

        self.commit(Transition::Return {
            listing: *listing_id,
            expected_version: listing.version(),
            holder,
            reward: self.return_reward,
        })
        .await?;

        drop(guard);
        self.locks.forget(listing_id);

        info!(
            listing = %listing_id,
            borrower = %holder,
            reward = self.return_reward,
            "Listing returned"
        );
        Ok(listing)
    }

    /// Withdraws `requester`'s pending request
    ///
    /// # Errors
    ///
    /// - `NotFound` if the listing does not exist
    /// - `InvalidState` if the listing is rented or `requester` has no
    ///   pending request
    /// - `Conflict` if the listing changed concurrently
    pub async fn cancel(
        &self,
        listing_id: &ListingId,
        requester: &UserId,
    ) -> LendingResult<Listing> {
        let (_guard, mut listing) = self.lock_listing(listing_id).await?;
        let expected_version = listing.version();

        listing.cancel(requester)?;

        self.commit(Transition::Cancel {
            listing: *listing_id,
            expected_version,
            requester: *requester,
        })
        .await?;
        listing.advance_version();

        info!(listing = %listing_id, requester = %requester, "Request cancelled");
        Ok(listing)
    }

    /// Deletes an available listing, dropping every pending request
    ///
    /// Returns the listing as it was when deleted.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the listing does not exist
    /// - `Unauthorized` if `caller` is not the owner
    /// - `InvalidState` if the listing is out on loan
    /// - `Conflict` if the listing changed concurrently
    pub async fn delete(&self, listing_id: &ListingId, caller: &UserId) -> LendingResult<Listing> {
        let (guard, listing) = self.lock_listing(listing_id).await?;
        let released = listing.check_delete(caller)?;

        self.commit(Transition::Delete {
            listing: *listing_id,
            expected_version: listing.version(),
            released: released.clone(),
        })
        .await?;

        drop(guard);
        self.locks.forget(listing_id);

        info!(
            listing = %listing_id,
            released = released.len(),
            "Listing deleted"
        );
        Ok(listing)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Takes the listing's lock and reads it
    ///
    /// An unknown id leaves no entry behind in the lock map.
    async fn lock_listing(
        &self,
        id: &ListingId,
    ) -> LendingResult<(OwnedMutexGuard<()>, Listing)> {
        let guard = self.locks.acquire(id).await;
        match self.load_listing(id).await {
            Ok(listing) => Ok((guard, listing)),
            Err(e) => {
                drop(guard);
                if e.kind() == ErrorKind::NotFound {
                    self.locks.forget(id);
                }
                Err(e)
            }
        }
    }

    async fn load_listing(&self, id: &ListingId) -> LendingResult<Listing> {
        guarded(
            self.store_timeout,
            "load listing",
            self.listings.get_listing(id),
        )
        .await?
        .ok_or_else(|| LendingError::not_found(format!("Listing {id} not found")))
    }

    async fn load_user(&self, id: &UserId) -> LendingResult<User> {
        guarded(self.store_timeout, "load user", self.identity.get_user(id))
            .await?
            .ok_or_else(|| LendingError::not_found(format!("User {id} not found")))
    }

    async fn commit(&self, transition: Transition) -> LendingResult<()> {
        let outcome = guarded(
            self.store_timeout,
            "commit booking change",
            self.listings.commit(&transition),
        )
        .await?;

        match outcome {
            CommitOutcome::Applied => Ok(()),
            CommitOutcome::Stale => {
                debug!(
                    listing = %transition.listing(),
                    transition = transition.name(),
                    expected_version = transition.expected_version(),
                    "Lost compare-and-swap"
                );
                Err(LendingError::conflict(format!(
                    "Listing {} changed while the {} was in progress; reload and try again",
                    transition.listing(),
                    transition.name()
                )))
            }
        }
    }
}
