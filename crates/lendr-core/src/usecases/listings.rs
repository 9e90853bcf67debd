//! Listing catalog use case
//!
//! Creating listings (with their photo upload) and every read-side view a
//! member has of the catalog: what they can borrow, what they offer, what
//! they hold and what they are waiting on.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tracing::{debug, info, warn};

use super::{
    booking::DEFAULT_STORE_TIMEOUT,
    error::{guarded, LendingError, LendingResult},
};
use crate::{
    domain::{
        ContactInfo, Listing, ListingId, OfferedListing, PendingRequest, RequesterContact, User,
        UserId,
    },
    ports::{IBlobStore, IIdentityStore, IListingStore, ListingFilter, PhotoUpload},
};

/// Parameters for a new listing
#[derive(Debug, Clone)]
pub struct NewListing {
    pub name: String,
    pub details: Vec<String>,
    pub photo: PhotoUpload,
}

/// Use case for creating and browsing listings
pub struct ListingCatalog {
    identity: Arc<dyn IIdentityStore + Send + Sync>,
    listings: Arc<dyn IListingStore + Send + Sync>,
    blobs: Arc<dyn IBlobStore + Send + Sync>,
    store_timeout: Duration,
    upload_timeout: Duration,
    max_photo_bytes: Option<usize>,
}

impl ListingCatalog {
    pub fn new(
        identity: Arc<dyn IIdentityStore + Send + Sync>,
        listings: Arc<dyn IListingStore + Send + Sync>,
        blobs: Arc<dyn IBlobStore + Send + Sync>,
    ) -> Self {
        Self {
            identity,
            listings,
            blobs,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            upload_timeout: Duration::from_secs(30),
            max_photo_bytes: None,
        }
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    /// Rejects photos larger than `bytes`
    pub fn with_max_photo_bytes(mut self, bytes: usize) -> Self {
        self.max_photo_bytes = Some(bytes);
        self
    }

    /// Uploads the photo and creates an available listing in the owner's
    /// community
    ///
    /// Input is validated before anything is uploaded.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for a blank or overlong name, a missing photo, or an
    ///   oversized photo
    /// - `NotFound` if the owner does not exist
    /// - `Transient` if the upload fails or times out
    pub async fn create(&self, owner_id: &UserId, new: NewListing) -> LendingResult<Listing> {
        Listing::validate_name(&new.name)?;
        check_photo(&new.photo, self.max_photo_bytes)?;

        let owner = self.load_user(owner_id).await?;
        let photo_url = upload_photo(self.blobs.as_ref(), &new.photo, self.upload_timeout).await?;
        let listing = Listing::new(&owner, &new.name, new.details, photo_url)?;

        guarded(
            self.store_timeout,
            "save listing",
            self.listings.insert_listing(&listing),
        )
        .await?;

        info!(
            listing = %listing.id(),
            owner = %owner_id,
            community = %listing.community_id(),
            "Listing created"
        );
        Ok(listing)
    }

    /// Retrieves a single listing
    pub async fn get(&self, listing_id: &ListingId) -> LendingResult<Listing> {
        guarded(
            self.store_timeout,
            "load listing",
            self.listings.get_listing(listing_id),
        )
        .await?
        .ok_or_else(|| LendingError::not_found(format!("Listing {listing_id} not found")))
    }

    /// Listings the viewer could request right now
    ///
    /// Same community, not the viewer's own, not already requested by the
    /// viewer, not rented.
    pub async fn browse_available(&self, viewer_id: &UserId) -> LendingResult<Vec<Listing>> {
        let viewer = self.load_user(viewer_id).await?;
        let filter = ListingFilter::new()
            .with_community(viewer.community_id().clone())
            .excluding_owner(*viewer_id)
            .not_requested_by(*viewer_id)
            .with_rented(false);

        let found = self.query(&filter).await?;
        debug!(viewer = %viewer_id, count = found.len(), "Browsed available listings");
        Ok(found)
    }

    /// Every listing in the viewer's community, including their own and
    /// rented ones
    pub async fn community_listings(&self, viewer_id: &UserId) -> LendingResult<Vec<Listing>> {
        let viewer = self.load_user(viewer_id).await?;
        let filter = ListingFilter::new().with_community(viewer.community_id().clone());
        self.query(&filter).await
    }

    /// The viewer's own listings, each with its requesters (while available)
    /// or its holder (while rented)
    pub async fn offered(&self, viewer_id: &UserId) -> LendingResult<Vec<OfferedListing>> {
        let owned = self
            .query(&ListingFilter::new().with_owner(*viewer_id))
            .await?;

        let mut people: Vec<UserId> = owned
            .iter()
            .flat_map(|l| l.booked_by().iter().chain(l.given_to()))
            .copied()
            .collect();
        people.sort();
        people.dedup();
        let contacts = self.contacts(&people).await?;

        Ok(owned
            .into_iter()
            .map(|listing| {
                let requesters = listing
                    .booked_by()
                    .iter()
                    .filter_map(|id| contacts.get(id).cloned())
                    .collect();
                let holder = listing.given_to().and_then(|id| contacts.get(id).cloned());
                OfferedListing {
                    listing,
                    requesters,
                    holder,
                }
            })
            .collect())
    }

    /// Listings the viewer currently holds
    pub async fn active_loans(&self, viewer_id: &UserId) -> LendingResult<Vec<Listing>> {
        let viewer = self.load_user(viewer_id).await?;
        let ids: Vec<ListingId> = viewer.rent_in().iter().copied().collect();
        self.dereference(&ids).await
    }

    /// Listings the viewer is waiting on, each with the owner's contact
    /// details
    pub async fn pending_requests(&self, viewer_id: &UserId) -> LendingResult<Vec<PendingRequest>> {
        let viewer = self.load_user(viewer_id).await?;
        let ids: Vec<ListingId> = viewer.booked_products().iter().copied().collect();
        let listings = self.dereference(&ids).await?;

        let mut owners: Vec<UserId> = listings.iter().map(|l| *l.owner_id()).collect();
        owners.sort();
        owners.dedup();
        let contacts = self.contacts(&owners).await?;

        Ok(listings
            .into_iter()
            .filter_map(|listing| {
                let owner = contacts.get(listing.owner_id())?.clone();
                Some(PendingRequest { listing, owner })
            })
            .collect())
    }

    /// Name and phone of each pending requester, in request order
    ///
    /// # Errors
    ///
    /// - `NotFound` if the listing does not exist
    /// - `Unauthorized` if `caller` does not own the listing
    pub async fn requesters_of(
        &self,
        listing_id: &ListingId,
        caller: &UserId,
    ) -> LendingResult<Vec<RequesterContact>> {
        let listing = self.get(listing_id).await?;
        if !listing.is_owned_by(caller) {
            return Err(LendingError::unauthorized(format!(
                "Only the owner of listing {listing_id} can see its requesters"
            )));
        }

        let users = self.load_users(listing.booked_by()).await?;
        let by_id: HashMap<UserId, &User> = users.iter().map(|u| (*u.id(), u)).collect();
        Ok(listing
            .booked_by()
            .iter()
            .filter_map(|id| by_id.get(id).map(|u| RequesterContact::from(*u)))
            .collect())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn query(&self, filter: &ListingFilter) -> LendingResult<Vec<Listing>> {
        guarded(
            self.store_timeout,
            "query listings",
            self.listings.query_listings(filter),
        )
        .await
    }

    async fn dereference(&self, ids: &[ListingId]) -> LendingResult<Vec<Listing>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut found = guarded(
            self.store_timeout,
            "load listings",
            self.listings.get_listings(ids),
        )
        .await?;
        found.sort_by_key(|l| l.created_at());
        Ok(found)
    }

    async fn load_user(&self, id: &UserId) -> LendingResult<User> {
        guarded(self.store_timeout, "load user", self.identity.get_user(id))
            .await?
            .ok_or_else(|| LendingError::not_found(format!("User {id} not found")))
    }

    async fn load_users(&self, ids: &[UserId]) -> LendingResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        guarded(self.store_timeout, "load users", self.identity.get_users(ids)).await
    }

    async fn contacts(&self, ids: &[UserId]) -> LendingResult<HashMap<UserId, ContactInfo>> {
        Ok(self
            .load_users(ids)
            .await?
            .iter()
            .map(|u| (*u.id(), ContactInfo::from(u)))
            .collect())
    }
}

/// Rejects empty and oversized photos
pub(crate) fn check_photo(photo: &PhotoUpload, max_bytes: Option<usize>) -> LendingResult<()> {
    if photo.is_empty() {
        return Err(LendingError::invalid_input("A photo is required"));
    }
    if let Some(max) = max_bytes {
        if photo.bytes.len() > max {
            return Err(LendingError::invalid_input(format!(
                "Photo is {} bytes; the limit is {max}",
                photo.bytes.len()
            )));
        }
    }
    Ok(())
}

/// Uploads a photo, mapping any failure to `Transient`
pub(crate) async fn upload_photo(
    blobs: &(dyn IBlobStore + Send + Sync),
    photo: &PhotoUpload,
    limit: Duration,
) -> LendingResult<String> {
    match tokio::time::timeout(limit, blobs.upload(photo)).await {
        Ok(Ok(url)) => Ok(url),
        Ok(Err(e)) => {
            warn!(error = %format!("{e:#}"), "Photo upload failed");
            Err(LendingError::transient("Photo upload failed; try again later"))
        }
        Err(_) => {
            warn!(timeout_ms = limit.as_millis() as u64, "Photo upload timed out");
            Err(LendingError::transient("Photo upload timed out; try again later"))
        }
    }
}
