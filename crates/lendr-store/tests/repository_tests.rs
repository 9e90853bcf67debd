//! Integration tests for SqliteLendingStore
//!
//! These tests exercise the identity, listing and audit ports against an
//! in-memory SQLite database. Each test function creates a fresh database
//! to ensure test isolation.

use std::sync::Arc;

use chrono::{Duration, Utc};

use lendr_core::domain::{
    CommunityId, Email, Listing, ListingId, LoanRecord, ModerationReport, NewUser, Reputation,
    User, UserId,
};
use lendr_core::ports::{
    CommitOutcome, IAuditLog, IIdentityStore, IListingStore, ListingFilter, Transition,
};
use lendr_core::usecases::{BookingEngine, ErrorKind};
use lendr_store::{DatabasePool, SqliteLendingStore};

// ============================================================================
// Test helpers
// ============================================================================

/// Create a fresh in-memory store for each test
async fn setup() -> (DatabasePool, SqliteLendingStore) {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    let store = SqliteLendingStore::new(pool.pool().clone());
    (pool, store)
}

fn new_user(name: &str, community: &str) -> User {
    User::register(
        NewUser {
            name: name.to_string(),
            email: Email::new(format!("{}@example.com", name.to_lowercase())).unwrap(),
            phone: "555-0100".to_string(),
            community_id: CommunityId::new(community.to_string()).unwrap(),
        },
        "$2b$04$hash".to_string(),
        Reputation::default(),
    )
    .unwrap()
}

/// Create and store a user
async fn create_user(store: &SqliteLendingStore, name: &str, community: &str) -> User {
    let user = new_user(name, community);
    assert!(store.insert_user(&user).await.unwrap());
    user
}

/// Create and store a listing owned by `owner`
async fn create_listing(store: &SqliteLendingStore, owner: &User, name: &str) -> Listing {
    let listing = Listing::new(
        owner,
        name,
        vec!["18V".to_string(), "two batteries".to_string()],
        "https://img.example.com/drill.jpg",
    )
    .unwrap();
    store.insert_listing(&listing).await.unwrap();
    listing
}

async fn version_of(store: &SqliteLendingStore, id: &ListingId) -> u64 {
    store.get_listing(id).await.unwrap().unwrap().version()
}

async fn request(store: &SqliteLendingStore, listing: &ListingId, requester: &UserId) {
    let outcome = store
        .commit(&Transition::Request {
            listing: *listing,
            expected_version: version_of(store, listing).await,
            requester: *requester,
        })
        .await
        .unwrap();
    assert_eq!(outcome, CommitOutcome::Applied);
}

async fn grant(store: &SqliteLendingStore, listing: &Listing, holder: &UserId) -> CommitOutcome {
    let current = store.get_listing(listing.id()).await.unwrap().unwrap();
    let released = current
        .booked_by()
        .iter()
        .filter(|id| *id != holder)
        .copied()
        .collect();
    store
        .commit(&Transition::Grant {
            listing: *listing.id(),
            expected_version: current.version(),
            holder: *holder,
            released,
            loan: LoanRecord::granted(&current, *holder),
        })
        .await
        .unwrap()
}

// ============================================================================
// User tests
// ============================================================================

#[tokio::test]
async fn test_insert_and_get_user() {
    let (_pool, store) = setup().await;
    let ana = create_user(&store, "Ana", "riverside").await;

    let retrieved = store.get_user(ana.id()).await.unwrap().unwrap();
    assert_eq!(retrieved.name(), "Ana");
    assert_eq!(retrieved.email().as_str(), "ana@example.com");
    assert_eq!(retrieved.community_id().as_str(), "riverside");
    assert_eq!(retrieved.reputation(), Reputation::default());
    assert!(!retrieved.is_leader());
    assert!(retrieved.booked_products().is_empty());
    assert!(retrieved.rent_in().is_empty());

    let by_email = store.get_user_by_email(ana.email()).await.unwrap().unwrap();
    assert_eq!(by_email.id(), ana.id());
}

#[tokio::test]
async fn test_get_nonexistent_user() {
    let (_pool, store) = setup().await;
    assert!(store.get_user(&UserId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_email_is_not_inserted() {
    let (_pool, store) = setup().await;
    create_user(&store, "Ana", "riverside").await;

    let twin = new_user("Ana", "hillside");
    assert!(!store.insert_user(&twin).await.unwrap());
    assert!(store.get_user(twin.id()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_save_profile_keeps_reputation() {
    let (_pool, store) = setup().await;
    let mut ana = create_user(&store, "Ana", "riverside").await;

    store.adjust_reputation(ana.id(), 7).await.unwrap();

    ana.update_details(Some("Ana Maria"), Some("555-0199")).unwrap();
    ana.set_photo_url("https://img.example.com/ana.jpg");
    ana.promote_to_leader();
    store.save_profile(&ana).await.unwrap();

    let retrieved = store.get_user(ana.id()).await.unwrap().unwrap();
    assert_eq!(retrieved.name(), "Ana Maria");
    assert_eq!(retrieved.phone(), "555-0199");
    assert_eq!(retrieved.photo_url(), Some("https://img.example.com/ana.jpg"));
    assert!(retrieved.is_leader());
    assert_eq!(retrieved.reputation().value(), 57);
}

#[tokio::test]
async fn test_save_profile_of_missing_user_fails() {
    let (_pool, store) = setup().await;
    let ghost = new_user("Ghost", "riverside");
    assert!(store.save_profile(&ghost).await.is_err());
}

#[tokio::test]
async fn test_get_users_returns_existing_only() {
    let (_pool, store) = setup().await;
    let ana = create_user(&store, "Ana", "riverside").await;
    let bo = create_user(&store, "Bo", "riverside").await;

    let users = store
        .get_users(&[*ana.id(), *bo.id(), UserId::new()])
        .await
        .unwrap();
    assert_eq!(users.len(), 2);
    assert!(store.get_users(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_one_leader_per_community() {
    let (_pool, store) = setup().await;
    let mut ana = create_user(&store, "Ana", "riverside").await;
    let mut bo = create_user(&store, "Bo", "riverside").await;

    assert!(store
        .find_leader(ana.community_id())
        .await
        .unwrap()
        .is_none());

    ana.promote_to_leader();
    store.save_profile(&ana).await.unwrap();
    let leader = store
        .find_leader(ana.community_id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(leader.id(), ana.id());

    bo.promote_to_leader();
    assert!(store.save_profile(&bo).await.is_err());
}

#[tokio::test]
async fn test_adjust_reputation_clamps() {
    let (_pool, store) = setup().await;
    let ana = create_user(&store, "Ana", "riverside").await;

    let up = store.adjust_reputation(ana.id(), 500).await.unwrap();
    assert_eq!(up, Some(Reputation::MAX));

    let down = store.adjust_reputation(ana.id(), -500).await.unwrap();
    assert_eq!(down, Some(Reputation::MIN));

    let missing = store.adjust_reputation(&UserId::new(), 1).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_file_report_stores_snapshot_and_penalizes() {
    let (_pool, store) = setup().await;
    let leader = create_user(&store, "Lena", "riverside").await;
    let ana = create_user(&store, "Ana", "riverside").await;
    let ugo = create_user(&store, "Ugo", "riverside").await;

    let report = ModerationReport::new(&ana, &ugo, "Kept the ladder for a month").unwrap();
    let reputation = store
        .file_report(leader.id(), &report, 10)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reputation.value(), 40);

    let leader = store.get_user(leader.id()).await.unwrap().unwrap();
    assert_eq!(leader.reports().len(), 1);
    let stored = &leader.reports()[0];
    assert_eq!(stored.target_id(), ugo.id());
    assert_eq!(stored.target().name, "Ugo");
    assert_eq!(stored.target().email, "ugo@example.com");
    assert_eq!(stored.reason(), "Kept the ladder for a month");
    assert_eq!(stored.reporter_name(), "Ana");
}

#[tokio::test]
async fn test_file_report_against_missing_target_writes_nothing() {
    let (_pool, store) = setup().await;
    let leader = create_user(&store, "Lena", "riverside").await;
    let ana = create_user(&store, "Ana", "riverside").await;
    let ghost = new_user("Ghost", "riverside");

    let report = ModerationReport::new(&ana, &ghost, "Never showed up").unwrap();
    let result = store.file_report(leader.id(), &report, 10).await.unwrap();
    assert!(result.is_none());

    let leader = store.get_user(leader.id()).await.unwrap().unwrap();
    assert!(leader.reports().is_empty());
}

// ============================================================================
// Listing tests
// ============================================================================

#[tokio::test]
async fn test_insert_and_get_listing() {
    let (_pool, store) = setup().await;
    let ana = create_user(&store, "Ana", "riverside").await;
    let drill = create_listing(&store, &ana, "Cordless drill").await;

    let retrieved = store.get_listing(drill.id()).await.unwrap().unwrap();
    assert_eq!(retrieved.name(), "Cordless drill");
    assert_eq!(retrieved.details(), ["18V", "two batteries"]);
    assert_eq!(retrieved.owner_id(), ana.id());
    assert_eq!(retrieved.community_id().as_str(), "riverside");
    assert_eq!(retrieved.version(), 0);
    assert!(!retrieved.is_rented());
    assert!(retrieved.booked_by().is_empty());
}

#[tokio::test]
async fn test_get_nonexistent_listing() {
    let (_pool, store) = setup().await;
    assert!(store.get_listing(&ListingId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_query_listings_filters() {
    let (_pool, store) = setup().await;
    let ana = create_user(&store, "Ana", "riverside").await;
    let bo = create_user(&store, "Bo", "riverside").await;
    let cy = create_user(&store, "Cy", "hillside").await;

    let drill = create_listing(&store, &ana, "Drill").await;
    let ladder = create_listing(&store, &ana, "Ladder").await;
    let saw = create_listing(&store, &bo, "Saw").await;
    create_listing(&store, &cy, "Tent").await;

    request(&store, ladder.id(), bo.id()).await;

    let riverside = ListingFilter::new().with_community(ana.community_id().clone());
    let all = store.query_listings(&riverside).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].id(), drill.id());

    let browse = store
        .query_listings(
            &riverside
                .clone()
                .excluding_owner(*bo.id())
                .not_requested_by(*bo.id())
                .with_rented(false),
        )
        .await
        .unwrap();
    assert_eq!(browse.len(), 1);
    assert_eq!(browse[0].id(), drill.id());

    let mine = store
        .query_listings(&ListingFilter::new().with_owner(*bo.id()))
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id(), saw.id());

    let pending = store
        .query_listings(&ListingFilter::new().requested_by(*bo.id()))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].booked_by(), [*bo.id()]);
}

#[tokio::test]
async fn test_get_listings_by_ids() {
    let (_pool, store) = setup().await;
    let ana = create_user(&store, "Ana", "riverside").await;
    let drill = create_listing(&store, &ana, "Drill").await;
    let ladder = create_listing(&store, &ana, "Ladder").await;

    let found = store
        .get_listings(&[*drill.id(), *ladder.id(), ListingId::new()])
        .await
        .unwrap();
    assert_eq!(found.len(), 2);
}

// ============================================================================
// Transition tests
// ============================================================================

#[tokio::test]
async fn test_request_and_cancel_keep_order_and_user_sets() {
    let (_pool, store) = setup().await;
    let ana = create_user(&store, "Ana", "riverside").await;
    let bo = create_user(&store, "Bo", "riverside").await;
    let cy = create_user(&store, "Cy", "riverside").await;
    let drill = create_listing(&store, &ana, "Drill").await;

    request(&store, drill.id(), cy.id()).await;
    request(&store, drill.id(), bo.id()).await;

    let listing = store.get_listing(drill.id()).await.unwrap().unwrap();
    assert_eq!(listing.booked_by(), [*cy.id(), *bo.id()]);
    assert_eq!(listing.version(), 2);

    let bo_view = store.get_user(bo.id()).await.unwrap().unwrap();
    assert!(bo_view.booked_products().contains(drill.id()));

    let outcome = store
        .commit(&Transition::Cancel {
            listing: *drill.id(),
            expected_version: 2,
            requester: *cy.id(),
        })
        .await
        .unwrap();
    assert_eq!(outcome, CommitOutcome::Applied);

    let listing = store.get_listing(drill.id()).await.unwrap().unwrap();
    assert_eq!(listing.booked_by(), [*bo.id()]);
    let cy_view = store.get_user(cy.id()).await.unwrap().unwrap();
    assert!(cy_view.booked_products().is_empty());
}

#[tokio::test]
async fn test_stale_version_writes_nothing() {
    let (_pool, store) = setup().await;
    let ana = create_user(&store, "Ana", "riverside").await;
    let bo = create_user(&store, "Bo", "riverside").await;
    let drill = create_listing(&store, &ana, "Drill").await;

    let outcome = store
        .commit(&Transition::Request {
            listing: *drill.id(),
            expected_version: 9,
            requester: *bo.id(),
        })
        .await
        .unwrap();
    assert_eq!(outcome, CommitOutcome::Stale);

    let listing = store.get_listing(drill.id()).await.unwrap().unwrap();
    assert!(listing.booked_by().is_empty());
    assert_eq!(listing.version(), 0);
}

#[tokio::test]
async fn test_commit_on_missing_listing_is_stale() {
    let (_pool, store) = setup().await;
    let bo = create_user(&store, "Bo", "riverside").await;

    let outcome = store
        .commit(&Transition::Request {
            listing: ListingId::new(),
            expected_version: 0,
            requester: *bo.id(),
        })
        .await
        .unwrap();
    assert_eq!(outcome, CommitOutcome::Stale);
}

#[tokio::test]
async fn test_cancel_without_request_is_stale_and_rolls_back() {
    let (_pool, store) = setup().await;
    let ana = create_user(&store, "Ana", "riverside").await;
    let bo = create_user(&store, "Bo", "riverside").await;
    let drill = create_listing(&store, &ana, "Drill").await;

    let outcome = store
        .commit(&Transition::Cancel {
            listing: *drill.id(),
            expected_version: 0,
            requester: *bo.id(),
        })
        .await
        .unwrap();
    assert_eq!(outcome, CommitOutcome::Stale);
    assert_eq!(version_of(&store, drill.id()).await, 0);
}

#[tokio::test]
async fn test_grant_hands_over_and_releases_everyone_else() {
    let (_pool, store) = setup().await;
    let ana = create_user(&store, "Ana", "riverside").await;
    let bo = create_user(&store, "Bo", "riverside").await;
    let cy = create_user(&store, "Cy", "riverside").await;
    let drill = create_listing(&store, &ana, "Drill").await;
    let ladder = create_listing(&store, &ana, "Ladder").await;

    request(&store, drill.id(), bo.id()).await;
    request(&store, drill.id(), cy.id()).await;
    request(&store, ladder.id(), cy.id()).await;

    assert_eq!(grant(&store, &drill, bo.id()).await, CommitOutcome::Applied);

    let listing = store.get_listing(drill.id()).await.unwrap().unwrap();
    assert_eq!(listing.given_to(), Some(bo.id()));
    assert!(listing.is_rented());
    assert!(listing.booked_by().is_empty());

    let bo_view = store.get_user(bo.id()).await.unwrap().unwrap();
    assert!(bo_view.rent_in().contains(drill.id()));
    assert!(bo_view.booked_products().is_empty());

    // Cy keeps the request on the other listing.
    let cy_view = store.get_user(cy.id()).await.unwrap().unwrap();
    assert_eq!(cy_view.booked_products().len(), 1);
    assert!(cy_view.booked_products().contains(ladder.id()));

    let loans = store.loans_for_listing(drill.id()).await.unwrap();
    assert_eq!(loans.len(), 1);
    assert_eq!(loans[0].lender_id(), ana.id());
    assert_eq!(loans[0].borrower_id(), bo.id());
    assert_eq!(loans[0].listing_name(), "Drill");
    assert!(loans[0].id().is_some());
}

#[tokio::test]
async fn test_grant_to_non_requester_is_stale() {
    let (_pool, store) = setup().await;
    let ana = create_user(&store, "Ana", "riverside").await;
    let bo = create_user(&store, "Bo", "riverside").await;
    let cy = create_user(&store, "Cy", "riverside").await;
    let drill = create_listing(&store, &ana, "Drill").await;

    request(&store, drill.id(), bo.id()).await;

    assert_eq!(grant(&store, &drill, cy.id()).await, CommitOutcome::Stale);

    let listing = store.get_listing(drill.id()).await.unwrap().unwrap();
    assert!(!listing.is_rented());
    assert_eq!(listing.booked_by(), [*bo.id()]);
    assert!(store.loans_for_listing(drill.id()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_return_deletes_listing_and_rewards_holder() {
    let (_pool, store) = setup().await;
    let ana = create_user(&store, "Ana", "riverside").await;
    let bo = create_user(&store, "Bo", "riverside").await;
    let drill = create_listing(&store, &ana, "Drill").await;

    request(&store, drill.id(), bo.id()).await;
    grant(&store, &drill, bo.id()).await;

    let outcome = store
        .commit(&Transition::Return {
            listing: *drill.id(),
            expected_version: version_of(&store, drill.id()).await,
            holder: *bo.id(),
            reward: 1,
        })
        .await
        .unwrap();
    assert_eq!(outcome, CommitOutcome::Applied);

    assert!(store.get_listing(drill.id()).await.unwrap().is_none());
    let bo_view = store.get_user(bo.id()).await.unwrap().unwrap();
    assert!(bo_view.rent_in().is_empty());
    assert_eq!(bo_view.reputation().value(), 51);

    // The loan record outlives the listing.
    assert_eq!(store.loans_for_listing(drill.id()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_available_listing_releases_requests() {
    let (_pool, store) = setup().await;
    let ana = create_user(&store, "Ana", "riverside").await;
    let bo = create_user(&store, "Bo", "riverside").await;
    let drill = create_listing(&store, &ana, "Drill").await;

    request(&store, drill.id(), bo.id()).await;

    let outcome = store
        .commit(&Transition::Delete {
            listing: *drill.id(),
            expected_version: 1,
            released: vec![*bo.id()],
        })
        .await
        .unwrap();
    assert_eq!(outcome, CommitOutcome::Applied);

    assert!(store.get_listing(drill.id()).await.unwrap().is_none());
    let bo_view = store.get_user(bo.id()).await.unwrap().unwrap();
    assert!(bo_view.booked_products().is_empty());
}

#[tokio::test]
async fn test_delete_rented_listing_is_stale() {
    let (_pool, store) = setup().await;
    let ana = create_user(&store, "Ana", "riverside").await;
    let bo = create_user(&store, "Bo", "riverside").await;
    let drill = create_listing(&store, &ana, "Drill").await;

    request(&store, drill.id(), bo.id()).await;
    grant(&store, &drill, bo.id()).await;

    let outcome = store
        .commit(&Transition::Delete {
            listing: *drill.id(),
            expected_version: version_of(&store, drill.id()).await,
            released: vec![],
        })
        .await
        .unwrap();
    assert_eq!(outcome, CommitOutcome::Stale);
    assert!(store.get_listing(drill.id()).await.unwrap().is_some());
}

// ============================================================================
// Audit log tests
// ============================================================================

#[tokio::test]
async fn test_loan_queries_are_newest_first() {
    let (_pool, store) = setup().await;
    let ana = create_user(&store, "Ana", "riverside").await;
    let bo = create_user(&store, "Bo", "riverside").await;
    let cy = create_user(&store, "Cy", "riverside").await;
    let drill = create_listing(&store, &ana, "Drill").await;
    let ladder = create_listing(&store, &ana, "Ladder").await;

    request(&store, drill.id(), bo.id()).await;
    grant(&store, &drill, bo.id()).await;
    request(&store, ladder.id(), cy.id()).await;
    grant(&store, &ladder, cy.id()).await;

    let ana_loans = store.loans_for_user(ana.id()).await.unwrap();
    assert_eq!(ana_loans.len(), 2);
    assert_eq!(ana_loans[0].listing_id(), ladder.id());
    assert_eq!(ana_loans[1].listing_id(), drill.id());

    let bo_loans = store.loans_for_user(bo.id()).await.unwrap();
    assert_eq!(bo_loans.len(), 1);

    let recent = store
        .loans_since(Utc::now() - Duration::hours(1), 1)
        .await
        .unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].listing_id(), ladder.id());

    let future = store
        .loans_since(Utc::now() + Duration::hours(1), 10)
        .await
        .unwrap();
    assert!(future.is_empty());
}

#[tokio::test]
async fn test_loan_records_are_append_only() {
    let (pool, store) = setup().await;
    let ana = create_user(&store, "Ana", "riverside").await;
    let bo = create_user(&store, "Bo", "riverside").await;
    let drill = create_listing(&store, &ana, "Drill").await;

    request(&store, drill.id(), bo.id()).await;
    grant(&store, &drill, bo.id()).await;

    let update = sqlx::query("UPDATE loan_records SET listing_name = 'Hammer'")
        .execute(pool.pool())
        .await;
    assert!(update.is_err());

    let delete = sqlx::query("DELETE FROM loan_records").execute(pool.pool()).await;
    assert!(delete.is_err());

    assert_eq!(store.loans_for_user(bo.id()).await.unwrap().len(), 1);
}

// ============================================================================
// Booking engine against SQLite
// ============================================================================

#[tokio::test]
async fn test_concurrent_grants_from_separate_engines_admit_one() {
    let (_pool, store) = setup().await;
    let ana = create_user(&store, "Ana", "riverside").await;
    let bo = create_user(&store, "Bo", "riverside").await;
    let cy = create_user(&store, "Cy", "riverside").await;
    let drill = create_listing(&store, &ana, "Drill").await;

    request(&store, drill.id(), bo.id()).await;
    request(&store, drill.id(), cy.id()).await;

    // Separate lock maps, as two processes sharing one database would have.
    let store = Arc::new(store);
    let first = BookingEngine::new(store.clone(), store.clone());
    let second = BookingEngine::new(store.clone(), store.clone());

    let (a, b) = tokio::join!(
        first.grant(drill.id(), ana.id(), bo.id()),
        second.grant(drill.id(), ana.id(), cy.id()),
    );

    let results = [a, b];
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);

    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert!(matches!(
        loser.kind(),
        ErrorKind::Conflict | ErrorKind::InvalidState
    ));

    let listing = store.get_listing(drill.id()).await.unwrap().unwrap();
    assert!(listing.is_rented());
    assert!(listing.booked_by().is_empty());
    assert_eq!(store.loans_for_listing(drill.id()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_engine_full_loan_cycle() {
    let (_pool, store) = setup().await;
    let ana = create_user(&store, "Ana", "riverside").await;
    let bo = create_user(&store, "Bo", "riverside").await;
    let drill = create_listing(&store, &ana, "Drill").await;

    let store = Arc::new(store);
    let engine = BookingEngine::new(store.clone(), store.clone());

    engine.request(drill.id(), bo.id()).await.unwrap();
    engine.grant(drill.id(), ana.id(), bo.id()).await.unwrap();
    engine.return_item(drill.id(), bo.id()).await.unwrap();

    let err = engine.return_item(drill.id(), bo.id()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let bo_view = store.get_user(bo.id()).await.unwrap().unwrap();
    assert_eq!(bo_view.reputation().value(), 51);
    assert!(bo_view.rent_in().is_empty());
}
