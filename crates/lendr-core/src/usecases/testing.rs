//! In-memory port implementations for use-case unit tests

use std::{
    collections::{BTreeSet, HashMap},
    sync::Mutex,
};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::{
    domain::{
        CommunityId, Email, Listing, ListingId, ListingSnapshot, LoanId, LoanRecord,
        ModerationReport, NewUser, Reputation, User, UserId, UserSnapshot,
    },
    ports::{
        CommitOutcome, IAuditLog, IBlobStore, IIdentityStore, IListingStore, INotifier,
        ListingFilter, Notification, PhotoUpload, Transition,
    },
};

#[derive(Default)]
struct State {
    users: HashMap<UserId, User>,
    listings: HashMap<ListingId, Listing>,
    loans: Vec<LoanRecord>,
    force_stale: bool,
}

/// Identity, listing and audit store backed by hash maps
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user directly, bypassing hashing
    pub fn add_user(&self, name: &str, community: &str, reputation: Reputation) -> User {
        let user = User::register(
            NewUser {
                name: name.to_string(),
                email: Email::new(format!("{}@example.com", name.to_lowercase())).unwrap(),
                phone: format!("555-{:04}", name.len()),
                community_id: CommunityId::new(community.to_string()).unwrap(),
            },
            "hash".to_string(),
            reputation,
        )
        .unwrap();
        self.state
            .lock()
            .unwrap()
            .users
            .insert(*user.id(), user.clone());
        user
    }

    pub fn make_leader(&self, id: &UserId) {
        let mut state = self.state.lock().unwrap();
        state.users.get_mut(id).unwrap().promote_to_leader();
    }

    pub fn add_listing(&self, owner: &User, name: &str) -> Listing {
        let listing = Listing::new(owner, name, vec![], "https://cdn.test/photo.jpg").unwrap();
        self.state
            .lock()
            .unwrap()
            .listings
            .insert(*listing.id(), listing.clone());
        listing
    }

    /// Reads a user with derived listing sets
    pub fn user(&self, id: &UserId) -> Option<User> {
        let state = self.state.lock().unwrap();
        state.users.get(id).map(|u| joined(&state, u))
    }

    pub fn listing(&self, id: &ListingId) -> Option<Listing> {
        self.state.lock().unwrap().listings.get(id).cloned()
    }

    pub fn loans(&self) -> Vec<LoanRecord> {
        self.state.lock().unwrap().loans.clone()
    }

    /// Makes every subsequent commit report `Stale`
    pub fn force_stale(&self, stale: bool) {
        self.state.lock().unwrap().force_stale = stale;
    }
}

fn joined(state: &State, user: &User) -> User {
    let booked_products: BTreeSet<ListingId> = state
        .listings
        .values()
        .filter(|l| l.is_requested_by(user.id()))
        .map(|l| *l.id())
        .collect();
    let rent_in: BTreeSet<ListingId> = state
        .listings
        .values()
        .filter(|l| l.given_to() == Some(user.id()))
        .map(|l| *l.id())
        .collect();

    User::from(UserSnapshot {
        id: *user.id(),
        name: user.name().to_string(),
        email: user.email().clone(),
        phone: user.phone().to_string(),
        password_hash: user.password_hash().to_string(),
        reputation: user.reputation(),
        community_id: user.community_id().clone(),
        is_leader: user.is_leader(),
        photo_url: user.photo_url().map(str::to_string),
        booked_products,
        rent_in,
        reports: user.reports().to_vec(),
        created_at: user.created_at(),
    })
}

fn rebuild(listing: &Listing, booked_by: Vec<UserId>, given_to: Option<UserId>) -> Listing {
    Listing::try_from(ListingSnapshot {
        id: *listing.id(),
        name: listing.name().to_string(),
        details: listing.details().to_vec(),
        owner_id: *listing.owner_id(),
        photo_url: listing.photo_url().to_string(),
        community_id: listing.community_id().clone(),
        booked_by,
        given_to,
        version: listing.version() + 1,
        created_at: listing.created_at(),
    })
    .unwrap()
}

#[async_trait::async_trait]
impl IIdentityStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> anyhow::Result<bool> {
        let mut state = self.state.lock().unwrap();
        if state.users.values().any(|u| u.email() == user.email()) {
            return Ok(false);
        }
        state.users.insert(*user.id(), user.clone());
        Ok(true)
    }

    async fn save_profile(&self, user: &User) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        let stored = state
            .users
            .get_mut(user.id())
            .ok_or_else(|| anyhow::anyhow!("no user {}", user.id()))?;
        *stored = User::from(UserSnapshot {
            id: *stored.id(),
            name: user.name().to_string(),
            email: stored.email().clone(),
            phone: user.phone().to_string(),
            password_hash: user.password_hash().to_string(),
            reputation: stored.reputation(),
            community_id: stored.community_id().clone(),
            is_leader: user.is_leader(),
            photo_url: user.photo_url().map(str::to_string),
            booked_products: BTreeSet::new(),
            rent_in: BTreeSet::new(),
            reports: stored.reports().to_vec(),
            created_at: stored.created_at(),
        });
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> anyhow::Result<Option<User>> {
        Ok(self.user(id))
    }

    async fn get_user_by_email(&self, email: &Email) -> anyhow::Result<Option<User>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .values()
            .find(|u| u.email() == email)
            .map(|u| joined(&state, u)))
    }

    async fn get_users(&self, ids: &[UserId]) -> anyhow::Result<Vec<User>> {
        let state = self.state.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| state.users.get(id))
            .map(|u| joined(&state, u))
            .collect())
    }

    async fn find_leader(&self, community: &CommunityId) -> anyhow::Result<Option<User>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .values()
            .find(|u| u.is_leader() && u.community_id() == community)
            .map(|u| joined(&state, u)))
    }

    async fn adjust_reputation(
        &self,
        id: &UserId,
        delta: i32,
    ) -> anyhow::Result<Option<Reputation>> {
        let mut state = self.state.lock().unwrap();
        Ok(state.users.get_mut(id).map(|u| u.adjust_reputation(delta)))
    }

    async fn file_report(
        &self,
        leader: &UserId,
        report: &ModerationReport,
        penalty: i32,
    ) -> anyhow::Result<Option<Reputation>> {
        let mut state = self.state.lock().unwrap();
        if !state.users.contains_key(report.target_id()) || !state.users.contains_key(leader) {
            return Ok(None);
        }
        let reputation = state
            .users
            .get_mut(report.target_id())
            .map(|u| u.adjust_reputation(-penalty));
        if let Some(leader) = state.users.get_mut(leader) {
            leader.push_report(report.clone());
        }
        Ok(reputation)
    }
}

#[async_trait::async_trait]
impl IListingStore for MemoryStore {
    async fn insert_listing(&self, listing: &Listing) -> anyhow::Result<()> {
        self.state
            .lock()
            .unwrap()
            .listings
            .insert(*listing.id(), listing.clone());
        Ok(())
    }

    async fn get_listing(&self, id: &ListingId) -> anyhow::Result<Option<Listing>> {
        Ok(self.listing(id))
    }

    async fn get_listings(&self, ids: &[ListingId]) -> anyhow::Result<Vec<Listing>> {
        let state = self.state.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| state.listings.get(id).cloned())
            .collect())
    }

    async fn query_listings(&self, filter: &ListingFilter) -> anyhow::Result<Vec<Listing>> {
        let state = self.state.lock().unwrap();
        let mut found: Vec<Listing> = state
            .listings
            .values()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        found.sort_by_key(|l| l.created_at());
        Ok(found)
    }

    async fn commit(&self, transition: &Transition) -> anyhow::Result<CommitOutcome> {
        let mut state = self.state.lock().unwrap();
        let current = match state.listings.get(transition.listing()) {
            Some(l) if !state.force_stale && l.version() == transition.expected_version() => {
                l.clone()
            }
            _ => return Ok(CommitOutcome::Stale),
        };

        match transition {
            Transition::Request { requester, .. } => {
                let mut booked_by = current.booked_by().to_vec();
                booked_by.push(*requester);
                let next = rebuild(&current, booked_by, None);
                state.listings.insert(*next.id(), next);
            }
            Transition::Cancel { requester, .. } => {
                let booked_by = current
                    .booked_by()
                    .iter()
                    .copied()
                    .filter(|id| id != requester)
                    .collect();
                let next = rebuild(&current, booked_by, None);
                state.listings.insert(*next.id(), next);
            }
            Transition::Grant { holder, loan, .. } => {
                let next = rebuild(&current, vec![], Some(*holder));
                state.listings.insert(*next.id(), next);
                let id = LoanId::new(state.loans.len() as i64 + 1);
                state.loans.push(loan.clone().with_id(id));
            }
            Transition::Return { holder, reward, .. } => {
                state.listings.remove(current.id());
                if let Some(user) = state.users.get_mut(holder) {
                    user.adjust_reputation(*reward);
                }
            }
            Transition::Delete { .. } => {
                state.listings.remove(current.id());
            }
        }
        Ok(CommitOutcome::Applied)
    }
}

#[async_trait::async_trait]
impl IAuditLog for MemoryStore {
    async fn loans_for_user(&self, user: &UserId) -> anyhow::Result<Vec<LoanRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .loans
            .iter()
            .rev()
            .filter(|l| l.lender_id() == user || l.borrower_id() == user)
            .cloned()
            .collect())
    }

    async fn loans_for_listing(&self, listing: &ListingId) -> anyhow::Result<Vec<LoanRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .loans
            .iter()
            .rev()
            .filter(|l| l.listing_id() == listing)
            .cloned()
            .collect())
    }

    async fn loans_since(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> anyhow::Result<Vec<LoanRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .loans
            .iter()
            .rev()
            .filter(|l| l.granted_at() >= since)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Outbound doubles
// ============================================================================

/// Forwards every notification to a channel
pub struct RecordingNotifier {
    tx: mpsc::UnboundedSender<Notification>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, fail: false }, rx)
    }

    /// Records the attempt, then reports a delivery failure
    pub fn failing() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, fail: true }, rx)
    }
}

#[async_trait::async_trait]
impl INotifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        let _ = self.tx.send(notification.clone());
        if self.fail {
            anyhow::bail!("smtp relay refused connection");
        }
        Ok(())
    }
}

/// Returns a fixed URL for every upload and counts calls
pub struct StaticBlobStore {
    url: String,
    fail: bool,
    uploads: Mutex<usize>,
}

impl StaticBlobStore {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            fail: false,
            uploads: Mutex::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            url: String::new(),
            fail: true,
            uploads: Mutex::new(0),
        }
    }

    pub fn uploads(&self) -> usize {
        *self.uploads.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl IBlobStore for StaticBlobStore {
    async fn upload(&self, _photo: &PhotoUpload) -> anyhow::Result<String> {
        *self.uploads.lock().unwrap() += 1;
        if self.fail {
            anyhow::bail!("upload endpoint returned 502");
        }
        Ok(self.url.clone())
    }
}
