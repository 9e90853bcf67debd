//! Use cases (interactors) for Lendr
//!
//! This module contains the application use cases that orchestrate
//! domain entities and port interfaces. Use cases are thin coordinators
//! that delegate business rules to domain methods and I/O to ports.
//!
//! ## Use Cases
//!
//! - [`BookingEngine`] - Request, grant, return, cancel and delete transitions
//! - [`ListingCatalog`] - Listing creation and read-side views
//! - [`ModerationService`] - Member reports, reputation penalties, notifications
//! - [`AccountService`] - Registration, credentials and profile maintenance

pub mod booking;
pub mod error;
pub mod identity;
pub mod listings;
pub mod locks;
pub mod moderation;
pub mod outcome;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

pub use booking::BookingEngine;
pub use error::{ErrorKind, LendingError, LendingResult};
pub use identity::{AccountService, Registration};
pub use listings::{ListingCatalog, NewListing};
pub use locks::ListingLocks;
pub use moderation::{ModerationService, ReportReceipt};
pub use outcome::OperationResult;

use crate::{
    config::Config,
    domain::Reputation,
    ports::{IBlobStore, IIdentityStore, IListingStore, INotifier},
};

/// Every use case, wired to one set of ports and one configuration
pub struct Services {
    pub accounts: AccountService,
    pub catalog: ListingCatalog,
    pub booking: BookingEngine,
    pub moderation: ModerationService,
}

impl Services {
    /// Builds all use cases from `config`, sharing the given ports
    pub fn new(
        config: &Config,
        identity: Arc<dyn IIdentityStore + Send + Sync>,
        listings: Arc<dyn IListingStore + Send + Sync>,
        notifier: Arc<dyn INotifier + Send + Sync>,
        blobs: Arc<dyn IBlobStore + Send + Sync>,
    ) -> Self {
        let timeout = config.store.timeout();
        let max_photo_bytes = usize::try_from(config.uploads.max_size_kb.saturating_mul(1024))
            .unwrap_or(usize::MAX);

        Self {
            accounts: AccountService::new(identity.clone(), blobs.clone())
                .with_store_timeout(timeout)
                .with_bcrypt_cost(config.identity.bcrypt_cost)
                .with_initial_reputation(Reputation::clamped(i64::from(
                    config.reputation.initial,
                ))),
            catalog: ListingCatalog::new(identity.clone(), listings.clone(), blobs)
                .with_store_timeout(timeout)
                .with_max_photo_bytes(max_photo_bytes),
            booking: BookingEngine::new(identity.clone(), listings)
                .with_store_timeout(timeout)
                .with_return_reward(config.reputation.return_reward),
            moderation: ModerationService::new(identity, notifier)
                .with_store_timeout(timeout)
                .with_penalty(config.reputation.report_penalty),
        }
    }

    /// Waits up to `limit` for background work spawned by the use cases
    ///
    /// Call before the runtime shuts down; returns `false` on timeout.
    pub async fn drain(&self, limit: std::time::Duration) -> bool {
        self.moderation.flush_notifications(limit).await
    }
}
