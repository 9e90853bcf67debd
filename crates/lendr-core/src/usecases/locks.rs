//! Per-listing async locks
//!
//! Serializes booking transitions on the same listing within one process.
//! Transitions on different listings never contend. Cross-process safety
//! comes from the store's compare-and-swap commit, not from these locks.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::ListingId;

/// Map of listing id to its async mutex
#[derive(Debug, Clone, Default)]
pub struct ListingLocks {
    inner: Arc<DashMap<ListingId, Arc<Mutex<()>>>>,
}

impl ListingLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `listing`
    ///
    /// The returned guard releases the lock when dropped.
    pub async fn acquire(&self, listing: &ListingId) -> OwnedMutexGuard<()> {
        let lock = self
            .inner
            .entry(*listing)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drops the lock entry for a deleted listing if nobody is waiting on it
    pub fn forget(&self, listing: &ListingId) {
        self.inner
            .remove_if(listing, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Number of listings with a lock entry
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
