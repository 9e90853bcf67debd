//! Identity store port (driven/secondary port)
//!
//! Persistence for user records, their reputation and the moderation
//! reports kept on leader accounts.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific.
//! - `booked_products` and `rent_in` are read-side joins over listing data;
//!   this port never writes them. They change only through
//!   [`IListingStore::commit`](super::IListingStore::commit).
//! - Reputation is never written by `save_profile`; it moves only through
//!   the clamped delta operations so concurrent adjustments cannot be lost.

use crate::domain::{
    newtypes::{CommunityId, Email, Reputation, UserId},
    ModerationReport, User,
};

/// Port trait for user persistence
#[async_trait::async_trait]
pub trait IIdentityStore: Send + Sync {
    /// Inserts a newly registered user
    ///
    /// Returns `false` without writing anything when the email is already
    /// registered.
    async fn insert_user(&self, user: &User) -> anyhow::Result<bool>;

    /// Persists name, phone, credential hash, photo and leader flag
    async fn save_profile(&self, user: &User) -> anyhow::Result<()>;

    /// Retrieves a user with joined listing sets and reports
    async fn get_user(&self, id: &UserId) -> anyhow::Result<Option<User>>;

    /// Retrieves a user by (normalized) email
    async fn get_user_by_email(&self, email: &Email) -> anyhow::Result<Option<User>>;

    /// Retrieves every user in `ids` that exists, in no particular order
    async fn get_users(&self, ids: &[UserId]) -> anyhow::Result<Vec<User>>;

    /// Retrieves the leader of a community, if one has been promoted
    async fn find_leader(&self, community: &CommunityId) -> anyhow::Result<Option<User>>;

    /// Adds `delta` to a user's reputation, clamped to `[0, 100]`
    ///
    /// Returns the new value, or `None` if the user does not exist.
    async fn adjust_reputation(&self, id: &UserId, delta: i32)
        -> anyhow::Result<Option<Reputation>>;

    /// Atomically stores `report` on `leader` and subtracts `penalty` points
    /// from the report target's reputation, clamped at 0
    ///
    /// Returns the target's new reputation, or `None` (and writes nothing)
    /// if the target no longer exists.
    async fn file_report(
        &self,
        leader: &UserId,
        report: &ModerationReport,
        penalty: i32,
    ) -> anyhow::Result<Option<Reputation>>;
}
