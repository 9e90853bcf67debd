//! SQLite implementation of the Lendr store ports
//!
//! This module provides the concrete SQLite-based implementation of the
//! identity, listing and audit ports defined in lendr-core. It handles
//! domain type conversion, SQL query construction and the transactional
//! application of booking transitions.
//!
//! ## Type Mapping
//!
//! | Domain Type         | SQL Type | Strategy                                        |
//! |---------------------|----------|-------------------------------------------------|
//! | UserId, ListingId   | TEXT     | UUID string via `.to_string()` / `FromStr`      |
//! | LoanId              | INTEGER  | `AUTOINCREMENT` rowid                           |
//! | Email, CommunityId  | TEXT     | Normalized string / validated constructor       |
//! | Reputation          | INTEGER  | `0..=100`, clamped in SQL on every adjustment   |
//! | DateTime<Utc>       | TEXT     | RFC 3339, UTC, fixed microsecond precision      |
//! | Listing details     | TEXT     | serde_json array                                |
//! | booked_by           | rows     | `listing_requests`, ordered by `seq`            |
//! | booked_products     | rows     | `listing_requests` by `user_id`                 |
//! | rent_in             | column   | `listings.given_to`                             |

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use lendr_core::domain::{
    CommunityId, ContactInfo, Email, Listing, ListingId, ListingSnapshot, LoanId, LoanRecord,
    ModerationReport, Reputation, User, UserId, UserSnapshot,
};
use lendr_core::ports::{
    CommitOutcome, IAuditLog, IIdentityStore, IListingStore, ListingFilter, Transition,
};

use crate::StoreError;

/// SQLite-based implementation of the identity, listing and audit ports
///
/// All operations are performed through a connection pool for concurrency.
/// Multi-row reads run inside a transaction so they observe one snapshot.
#[derive(Debug, Clone)]
pub struct SqliteLendingStore {
    pool: SqlitePool,
}

impl SqliteLendingStore {
    /// Creates a new store instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

/// Formats a timestamp so that lexical order matches chronological order
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a DateTime<Utc> from an ISO 8601 string
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // SQLite's own CURRENT_TIMESTAMP format
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| {
            StoreError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

fn parse_user_id(s: &str) -> Result<UserId, StoreError> {
    UserId::from_str(s)
        .map_err(|e| StoreError::SerializationError(format!("Invalid UserId '{}': {}", s, e)))
}

fn parse_listing_id(s: &str) -> Result<ListingId, StoreError> {
    ListingId::from_str(s)
        .map_err(|e| StoreError::SerializationError(format!("Invalid ListingId '{}': {}", s, e)))
}

fn reputation_from_sql(value: i64) -> Result<Reputation, StoreError> {
    u8::try_from(value)
        .ok()
        .and_then(|v| Reputation::new(v).ok())
        .ok_or_else(|| {
            StoreError::SerializationError(format!("Stored reputation {} out of range", value))
        })
}

fn version_to_sql(version: u64) -> Result<i64, StoreError> {
    i64::try_from(version)
        .map_err(|_| StoreError::SerializationError(format!("Version {} overflows", version)))
}

/// Builds `?, ?, ?` for an `IN (...)` clause
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

// ============================================================================
// Row mapping functions
// ============================================================================

/// Reconstruct a User from its row, joining listing sets and reports
async fn hydrate_user(conn: &mut SqliteConnection, row: &SqliteRow) -> Result<User, StoreError> {
    let id_str: String = row.get("id");
    let email_str: String = row.get("email");
    let community_str: String = row.get("community_id");
    let reputation: i64 = row.get("reputation");
    let created_at_str: String = row.get("created_at");

    let id = parse_user_id(&id_str)?;
    let email = Email::new(email_str.clone()).map_err(|e| {
        StoreError::SerializationError(format!("Invalid email '{}': {}", email_str, e))
    })?;
    let community_id = CommunityId::new(community_str.clone()).map_err(|e| {
        StoreError::SerializationError(format!("Invalid community '{}': {}", community_str, e))
    })?;

    let booked: Vec<String> = sqlx::query_scalar(
        "SELECT listing_id FROM listing_requests WHERE user_id = ? ORDER BY seq",
    )
    .bind(&id_str)
    .fetch_all(&mut *conn)
    .await?;

    let held: Vec<String> = sqlx::query_scalar("SELECT id FROM listings WHERE given_to = ?")
        .bind(&id_str)
        .fetch_all(&mut *conn)
        .await?;

    let report_rows =
        sqlx::query("SELECT * FROM moderation_reports WHERE leader_id = ? ORDER BY id")
            .bind(&id_str)
            .fetch_all(&mut *conn)
            .await?;

    Ok(User::from(UserSnapshot {
        id,
        name: row.get("name"),
        email,
        phone: row.get("phone"),
        password_hash: row.get("password_hash"),
        reputation: reputation_from_sql(reputation)?,
        community_id,
        is_leader: row.get("is_leader"),
        photo_url: row.get("photo_url"),
        booked_products: booked
            .iter()
            .map(|s| parse_listing_id(s))
            .collect::<Result<BTreeSet<_>, _>>()?,
        rent_in: held
            .iter()
            .map(|s| parse_listing_id(s))
            .collect::<Result<BTreeSet<_>, _>>()?,
        reports: report_rows
            .iter()
            .map(report_from_row)
            .collect::<Result<Vec<_>, _>>()?,
        created_at: parse_datetime(&created_at_str)?,
    }))
}

async fn hydrate_users(
    conn: &mut SqliteConnection,
    rows: &[SqliteRow],
) -> Result<Vec<User>, StoreError> {
    let mut users = Vec::with_capacity(rows.len());
    for row in rows {
        users.push(hydrate_user(conn, row).await?);
    }
    Ok(users)
}

fn report_from_row(row: &SqliteRow) -> Result<ModerationReport, StoreError> {
    let target_id: String = row.get("target_id");
    let reported_at: String = row.get("reported_at");

    Ok(ModerationReport::restore(
        ContactInfo {
            user_id: parse_user_id(&target_id)?,
            name: row.get("target_name"),
            phone: row.get("target_phone"),
            email: row.get("target_email"),
        },
        row.get("reason"),
        row.get("reporter_name"),
        parse_datetime(&reported_at)?,
    ))
}

/// Reconstruct a Listing from its row and its ordered requesters
fn listing_from_row(row: &SqliteRow, booked_by: Vec<UserId>) -> Result<Listing, StoreError> {
    let id_str: String = row.get("id");
    let details_str: String = row.get("details");
    let owner_str: String = row.get("owner_id");
    let community_str: String = row.get("community_id");
    let given_to_str: Option<String> = row.get("given_to");
    let version: i64 = row.get("version");
    let created_at_str: String = row.get("created_at");

    let details: Vec<String> = serde_json::from_str(&details_str).map_err(|e| {
        StoreError::SerializationError(format!("Invalid details JSON for {}: {}", id_str, e))
    })?;
    let community_id = CommunityId::new(community_str.clone()).map_err(|e| {
        StoreError::SerializationError(format!("Invalid community '{}': {}", community_str, e))
    })?;
    let version = u64::try_from(version).map_err(|_| {
        StoreError::SerializationError(format!("Negative version {} for {}", version, id_str))
    })?;

    let snapshot = ListingSnapshot {
        id: parse_listing_id(&id_str)?,
        name: row.get("name"),
        details,
        owner_id: parse_user_id(&owner_str)?,
        photo_url: row.get("photo_url"),
        community_id,
        booked_by,
        given_to: given_to_str.as_deref().map(parse_user_id).transpose()?,
        version,
        created_at: parse_datetime(&created_at_str)?,
    };

    Listing::try_from(snapshot).map_err(|e| {
        StoreError::SerializationError(format!("Listing {} is inconsistent: {}", id_str, e))
    })
}

/// Loads the ordered requesters of every listing in `ids`
async fn requesters_for(
    conn: &mut SqliteConnection,
    ids: &[String],
) -> Result<HashMap<String, Vec<UserId>>, StoreError> {
    let mut by_listing: HashMap<String, Vec<UserId>> = HashMap::new();
    if ids.is_empty() {
        return Ok(by_listing);
    }

    let sql = format!(
        "SELECT listing_id, user_id FROM listing_requests \
         WHERE listing_id IN ({}) ORDER BY seq",
        placeholders(ids.len())
    );
    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(id.as_str());
    }

    for row in query.fetch_all(&mut *conn).await? {
        let listing: String = row.get("listing_id");
        let user: String = row.get("user_id");
        by_listing
            .entry(listing)
            .or_default()
            .push(parse_user_id(&user)?);
    }
    Ok(by_listing)
}

async fn hydrate_listings(
    conn: &mut SqliteConnection,
    rows: &[SqliteRow],
) -> Result<Vec<Listing>, StoreError> {
    let ids: Vec<String> = rows.iter().map(|r| r.get::<String, _>("id")).collect();
    let mut requesters = requesters_for(conn, &ids).await?;

    rows.iter()
        .zip(&ids)
        .map(|(row, id)| listing_from_row(row, requesters.remove(id).unwrap_or_default()))
        .collect()
}

fn loan_from_row(row: &SqliteRow) -> Result<LoanRecord, StoreError> {
    let lender: String = row.get("lender_id");
    let borrower: String = row.get("borrower_id");
    let listing: String = row.get("listing_id");
    let granted_at: String = row.get("granted_at");

    Ok(LoanRecord::restore(
        LoanId::new(row.get("id")),
        parse_user_id(&lender)?,
        parse_user_id(&borrower)?,
        parse_listing_id(&listing)?,
        row.get("listing_name"),
        parse_datetime(&granted_at)?,
    ))
}

// ============================================================================
// Booking transition steps
// ============================================================================

/// Compare-and-swap on the listing version; false means nothing changed
async fn bump_version(
    conn: &mut SqliteConnection,
    listing: &str,
    expected: i64,
) -> Result<bool, StoreError> {
    let result = sqlx::query("UPDATE listings SET version = version + 1 WHERE id = ? AND version = ?")
        .bind(listing)
        .bind(expected)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

async fn apply_request(
    conn: &mut SqliteConnection,
    listing: &str,
    requester: &UserId,
) -> Result<bool, StoreError> {
    sqlx::query("INSERT INTO listing_requests (listing_id, user_id, requested_at) VALUES (?, ?, ?)")
        .bind(listing)
        .bind(requester.to_string())
        .bind(format_datetime(&Utc::now()))
        .execute(&mut *conn)
        .await?;
    Ok(true)
}

async fn apply_cancel(
    conn: &mut SqliteConnection,
    listing: &str,
    requester: &UserId,
) -> Result<bool, StoreError> {
    let result = sqlx::query("DELETE FROM listing_requests WHERE listing_id = ? AND user_id = ?")
        .bind(listing)
        .bind(requester.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

async fn apply_grant(
    conn: &mut SqliteConnection,
    listing: &str,
    holder: &UserId,
    released: &[UserId],
    loan: &LoanRecord,
) -> Result<bool, StoreError> {
    let holder_str = holder.to_string();

    // The chosen borrower must still be pending.
    let chosen: Option<i64> = sqlx::query_scalar(
        "SELECT seq FROM listing_requests WHERE listing_id = ? AND user_id = ?",
    )
    .bind(listing)
    .bind(&holder_str)
    .fetch_optional(&mut *conn)
    .await?;
    if chosen.is_none() {
        return Ok(false);
    }

    let cleared = sqlx::query("DELETE FROM listing_requests WHERE listing_id = ?")
        .bind(listing)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    let handed = sqlx::query("UPDATE listings SET given_to = ? WHERE id = ? AND given_to IS NULL")
        .bind(&holder_str)
        .bind(listing)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if handed != 1 {
        return Ok(false);
    }

    sqlx::query(
        "INSERT INTO loan_records \
         (lender_id, borrower_id, listing_id, listing_name, granted_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(loan.lender_id().to_string())
    .bind(loan.borrower_id().to_string())
    .bind(loan.listing_id().to_string())
    .bind(loan.listing_name())
    .bind(format_datetime(&loan.granted_at()))
    .execute(&mut *conn)
    .await?;

    tracing::trace!(
        listing = %listing,
        cleared,
        expected = released.len(),
        "Released pending requests on grant"
    );
    Ok(true)
}

async fn apply_return(
    conn: &mut SqliteConnection,
    listing: &str,
    holder: &UserId,
    reward: i32,
) -> Result<bool, StoreError> {
    let holder_str = holder.to_string();

    let deleted = sqlx::query("DELETE FROM listings WHERE id = ? AND given_to = ?")
        .bind(listing)
        .bind(&holder_str)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if deleted != 1 {
        return Ok(false);
    }

    sqlx::query("UPDATE users SET reputation = MAX(0, MIN(100, reputation + ?)) WHERE id = ?")
        .bind(reward)
        .bind(&holder_str)
        .execute(&mut *conn)
        .await?;
    Ok(true)
}

async fn apply_delete(conn: &mut SqliteConnection, listing: &str) -> Result<bool, StoreError> {
    sqlx::query("DELETE FROM listing_requests WHERE listing_id = ?")
        .bind(listing)
        .execute(&mut *conn)
        .await?;

    let deleted = sqlx::query("DELETE FROM listings WHERE id = ? AND given_to IS NULL")
        .bind(listing)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    Ok(deleted == 1)
}

// ============================================================================
// IIdentityStore implementation
// ============================================================================

#[async_trait::async_trait]
impl IIdentityStore for SqliteLendingStore {
    async fn insert_user(&self, user: &User) -> anyhow::Result<bool> {
        let id = user.id().to_string();

        let result = sqlx::query(
            "INSERT INTO users \
             (id, name, email, phone, password_hash, reputation, community_id, \
              is_leader, photo_url, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (email) DO NOTHING",
        )
        .bind(&id)
        .bind(user.name())
        .bind(user.email().as_str())
        .bind(user.phone())
        .bind(user.password_hash())
        .bind(i64::from(user.reputation().value()))
        .bind(user.community_id().as_str())
        .bind(user.is_leader())
        .bind(user.photo_url())
        .bind(format_datetime(&user.created_at()))
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() == 1;
        tracing::trace!(user_id = %id, inserted, "Inserted user");
        Ok(inserted)
    }

    async fn save_profile(&self, user: &User) -> anyhow::Result<()> {
        let id = user.id().to_string();

        let result = sqlx::query(
            "UPDATE users SET name = ?, phone = ?, password_hash = ?, photo_url = ?, \
             is_leader = ? WHERE id = ?",
        )
        .bind(user.name())
        .bind(user.phone())
        .bind(user.password_hash())
        .bind(user.photo_url())
        .bind(user.is_leader())
        .bind(&id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {}", id)).into());
        }

        tracing::trace!(user_id = %id, "Saved user profile");
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> anyhow::Result<Option<User>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await?;

        let user = match row {
            Some(ref r) => Some(hydrate_user(&mut tx, r).await?),
            None => None,
        };
        tx.commit().await?;
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &Email) -> anyhow::Result<Option<User>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM users WHERE email = ?")
            .bind(email.as_str())
            .fetch_optional(&mut *tx)
            .await?;

        let user = match row {
            Some(ref r) => Some(hydrate_user(&mut tx, r).await?),
            None => None,
        };
        tx.commit().await?;
        Ok(user)
    }

    async fn get_users(&self, ids: &[UserId]) -> anyhow::Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT * FROM users WHERE id IN ({}) ORDER BY created_at",
            placeholders(ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id.to_string());
        }

        let mut tx = self.pool.begin().await?;
        let rows = query.fetch_all(&mut *tx).await?;
        let users = hydrate_users(&mut tx, &rows).await?;
        tx.commit().await?;
        Ok(users)
    }

    async fn find_leader(&self, community: &CommunityId) -> anyhow::Result<Option<User>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM users WHERE community_id = ? AND is_leader = 1")
            .bind(community.as_str())
            .fetch_optional(&mut *tx)
            .await?;

        let user = match row {
            Some(ref r) => Some(hydrate_user(&mut tx, r).await?),
            None => None,
        };
        tx.commit().await?;
        Ok(user)
    }

    async fn adjust_reputation(
        &self,
        id: &UserId,
        delta: i32,
    ) -> anyhow::Result<Option<Reputation>> {
        let value: Option<i64> = sqlx::query_scalar(
            "UPDATE users SET reputation = MAX(0, MIN(100, reputation + ?)) \
             WHERE id = ? RETURNING reputation",
        )
        .bind(delta)
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        tracing::trace!(user_id = %id, delta, "Adjusted reputation");
        Ok(value.map(reputation_from_sql).transpose()?)
    }

    async fn file_report(
        &self,
        leader: &UserId,
        report: &ModerationReport,
        penalty: i32,
    ) -> anyhow::Result<Option<Reputation>> {
        let mut tx = self.pool.begin().await?;

        let value: Option<i64> = sqlx::query_scalar(
            "UPDATE users SET reputation = MAX(0, MIN(100, reputation - ?)) \
             WHERE id = ? RETURNING reputation",
        )
        .bind(penalty)
        .bind(report.target_id().to_string())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(value) = value else {
            tx.rollback().await?;
            return Ok(None);
        };

        let target = report.target();
        sqlx::query(
            "INSERT INTO moderation_reports \
             (leader_id, target_id, target_name, target_phone, target_email, \
              reason, reporter_name, reported_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(leader.to_string())
        .bind(target.user_id.to_string())
        .bind(&target.name)
        .bind(&target.phone)
        .bind(&target.email)
        .bind(report.reason())
        .bind(report.reporter_name())
        .bind(format_datetime(&report.reported_at()))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::trace!(leader_id = %leader, target_id = %target.user_id, "Filed report");
        Ok(Some(reputation_from_sql(value)?))
    }
}

// ============================================================================
// IListingStore implementation
// ============================================================================

#[async_trait::async_trait]
impl IListingStore for SqliteLendingStore {
    async fn insert_listing(&self, listing: &Listing) -> anyhow::Result<()> {
        let id = listing.id().to_string();
        let details = serde_json::to_string(listing.details())
            .map_err(|e| anyhow::anyhow!("Failed to serialize details: {}", e))?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO listings \
             (id, name, details, owner_id, photo_url, community_id, given_to, version, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(listing.name())
        .bind(&details)
        .bind(listing.owner_id().to_string())
        .bind(listing.photo_url())
        .bind(listing.community_id().as_str())
        .bind(listing.given_to().map(|u| u.to_string()))
        .bind(version_to_sql(listing.version())?)
        .bind(format_datetime(&listing.created_at()))
        .execute(&mut *tx)
        .await?;

        for requester in listing.booked_by() {
            apply_request(&mut tx, &id, requester).await?;
        }

        tx.commit().await?;

        tracing::trace!(listing_id = %id, "Inserted listing");
        Ok(())
    }

    async fn get_listing(&self, id: &ListingId) -> anyhow::Result<Option<Listing>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM listings WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await?;

        let listing = match row {
            Some(r) => hydrate_listings(&mut tx, &[r]).await?.pop(),
            None => None,
        };
        tx.commit().await?;
        Ok(listing)
    }

    async fn get_listings(&self, ids: &[ListingId]) -> anyhow::Result<Vec<Listing>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT * FROM listings WHERE id IN ({}) ORDER BY created_at, id",
            placeholders(ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id.to_string());
        }

        let mut tx = self.pool.begin().await?;
        let rows = query.fetch_all(&mut *tx).await?;
        let listings = hydrate_listings(&mut tx, &rows).await?;
        tx.commit().await?;
        Ok(listings)
    }

    async fn query_listings(&self, filter: &ListingFilter) -> anyhow::Result<Vec<Listing>> {
        let mut sql = String::from("SELECT * FROM listings WHERE 1=1");
        let mut binds: Vec<String> = Vec::new();

        if let Some(ref community) = filter.community {
            sql.push_str(" AND community_id = ?");
            binds.push(community.as_str().to_string());
        }

        if let Some(ref owner) = filter.owner {
            sql.push_str(" AND owner_id = ?");
            binds.push(owner.to_string());
        }

        if let Some(ref owner) = filter.exclude_owner {
            sql.push_str(" AND owner_id <> ?");
            binds.push(owner.to_string());
        }

        if let Some(ref user) = filter.not_requested_by {
            sql.push_str(
                " AND NOT EXISTS (SELECT 1 FROM listing_requests r \
                 WHERE r.listing_id = listings.id AND r.user_id = ?)",
            );
            binds.push(user.to_string());
        }

        if let Some(rented) = filter.rented {
            sql.push_str(if rented {
                " AND given_to IS NOT NULL"
            } else {
                " AND given_to IS NULL"
            });
        }

        if let Some(ref holder) = filter.given_to {
            sql.push_str(" AND given_to = ?");
            binds.push(holder.to_string());
        }

        if let Some(ref user) = filter.requested_by {
            sql.push_str(
                " AND EXISTS (SELECT 1 FROM listing_requests r \
                 WHERE r.listing_id = listings.id AND r.user_id = ?)",
            );
            binds.push(user.to_string());
        }

        sql.push_str(" ORDER BY created_at, id");

        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind.as_str());
        }

        let mut tx = self.pool.begin().await?;
        let rows = query.fetch_all(&mut *tx).await?;
        let listings = hydrate_listings(&mut tx, &rows).await?;
        tx.commit().await?;

        tracing::trace!(count = listings.len(), "Queried listings");
        Ok(listings)
    }

    async fn commit(&self, transition: &Transition) -> anyhow::Result<CommitOutcome> {
        let listing = transition.listing().to_string();
        let expected = version_to_sql(transition.expected_version())?;

        let mut tx = self.pool.begin().await?;

        let applied = bump_version(&mut tx, &listing, expected).await?
            && match transition {
                Transition::Request { requester, .. } => {
                    apply_request(&mut tx, &listing, requester).await?
                }
                Transition::Cancel { requester, .. } => {
                    apply_cancel(&mut tx, &listing, requester).await?
                }
                Transition::Grant {
                    holder,
                    released,
                    loan,
                    ..
                } => apply_grant(&mut tx, &listing, holder, released, loan).await?,
                Transition::Return { holder, reward, .. } => {
                    apply_return(&mut tx, &listing, holder, *reward).await?
                }
                Transition::Delete { .. } => apply_delete(&mut tx, &listing).await?,
            };

        if applied {
            tx.commit().await?;
            tracing::trace!(
                listing_id = %listing,
                transition = transition.name(),
                "Committed transition"
            );
            Ok(CommitOutcome::Applied)
        } else {
            tx.rollback().await?;
            tracing::trace!(
                listing_id = %listing,
                transition = transition.name(),
                expected_version = expected,
                "Stale transition rolled back"
            );
            Ok(CommitOutcome::Stale)
        }
    }
}

// ============================================================================
// IAuditLog implementation
// ============================================================================

#[async_trait::async_trait]
impl IAuditLog for SqliteLendingStore {
    async fn loans_for_user(&self, user: &UserId) -> anyhow::Result<Vec<LoanRecord>> {
        let id = user.to_string();

        let rows = sqlx::query(
            "SELECT * FROM loan_records WHERE lender_id = ? OR borrower_id = ? ORDER BY id DESC",
        )
        .bind(&id)
        .bind(&id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(loan_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn loans_for_listing(&self, listing: &ListingId) -> anyhow::Result<Vec<LoanRecord>> {
        let rows = sqlx::query("SELECT * FROM loan_records WHERE listing_id = ? ORDER BY id DESC")
            .bind(listing.to_string())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(loan_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn loans_since(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> anyhow::Result<Vec<LoanRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM loan_records WHERE granted_at >= ? ORDER BY id DESC LIMIT ?",
        )
        .bind(format_datetime(&since))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(loan_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }
}
