//! User domain entity
//!
//! A registered member of a lending community. Besides identity and
//! contact details, a user carries the two listing sets the booking engine
//! maintains (`booked_products` and `rent_in`) and, for community leaders,
//! the moderation reports filed with them.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{
    errors::DomainError,
    newtypes::{CommunityId, Email, ListingId, Reputation, UserId},
    report::ModerationReport,
};

/// Registration details, before the password has been hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Display name
    pub name: String,
    /// Contact email, unique across the system
    pub email: Email,
    /// Contact phone number
    pub phone: String,
    /// Community the user joins
    pub community_id: CommunityId,
}

/// A registered community member
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    id: UserId,
    name: String,
    email: Email,
    phone: String,
    #[serde(skip_serializing)]
    password_hash: String,
    reputation: Reputation,
    community_id: CommunityId,
    is_leader: bool,
    photo_url: Option<String>,
    booked_products: BTreeSet<ListingId>,
    rent_in: BTreeSet<ListingId>,
    reports: Vec<ModerationReport>,
    created_at: DateTime<Utc>,
}

/// Plain field bag used by store adapters to rebuild a [`User`]
#[derive(Debug, Clone)]
pub struct UserSnapshot {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub phone: String,
    pub password_hash: String,
    pub reputation: Reputation,
    pub community_id: CommunityId,
    pub is_leader: bool,
    pub photo_url: Option<String>,
    pub booked_products: BTreeSet<ListingId>,
    pub rent_in: BTreeSet<ListingId>,
    pub reports: Vec<ModerationReport>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Registers a new user with a freshly generated id
    ///
    /// # Errors
    /// Returns `DomainError::ValidationFailed` if the name, phone or password
    /// hash is blank.
    pub fn register(
        details: NewUser,
        password_hash: String,
        reputation: Reputation,
    ) -> Result<Self, DomainError> {
        let name = required("name", &details.name)?;
        let phone = required("phone", &details.phone)?;
        if password_hash.is_empty() {
            return Err(DomainError::ValidationFailed(
                "password hash cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            id: UserId::new(),
            name,
            email: details.email,
            phone,
            password_hash,
            reputation,
            community_id: details.community_id,
            is_leader: false,
            photo_url: None,
            booked_products: BTreeSet::new(),
            rent_in: BTreeSet::new(),
            reports: Vec::new(),
            created_at: Utc::now(),
        })
    }

    // --- Getters ---

    /// Returns the user's identifier
    pub fn id(&self) -> &UserId {
        &self.id
    }

    /// Returns the display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the contact email
    pub fn email(&self) -> &Email {
        &self.email
    }

    /// Returns the contact phone number
    pub fn phone(&self) -> &str {
        &self.phone
    }

    /// Returns the bcrypt credential hash
    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    /// Returns the current reputation score
    pub fn reputation(&self) -> Reputation {
        self.reputation
    }

    /// Returns the user's community
    pub fn community_id(&self) -> &CommunityId {
        &self.community_id
    }

    /// Returns true if the user moderates their community
    pub fn is_leader(&self) -> bool {
        self.is_leader
    }

    /// Returns the profile picture URL, if one was uploaded
    pub fn photo_url(&self) -> Option<&str> {
        self.photo_url.as_deref()
    }

    /// Listings this user has pending requests on
    pub fn booked_products(&self) -> &BTreeSet<ListingId> {
        &self.booked_products
    }

    /// Listings this user currently holds as borrower
    pub fn rent_in(&self) -> &BTreeSet<ListingId> {
        &self.rent_in
    }

    /// Reports filed with this user (leaders only)
    pub fn reports(&self) -> &[ModerationReport] {
        &self.reports
    }

    /// Returns when the user registered
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // --- Mutations ---

    /// Updates the display name and/or phone number
    ///
    /// # Errors
    /// Returns `DomainError::ValidationFailed` if a provided value is blank.
    pub fn update_details(
        &mut self,
        name: Option<&str>,
        phone: Option<&str>,
    ) -> Result<(), DomainError> {
        // Validate both before touching either field.
        let name = name.map(|n| required("name", n)).transpose()?;
        let phone = phone.map(|p| required("phone", p)).transpose()?;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(phone) = phone {
            self.phone = phone;
        }
        Ok(())
    }

    /// Replaces the credential hash
    pub fn set_password_hash(&mut self, hash: String) {
        self.password_hash = hash;
    }

    /// Sets the profile picture URL
    pub fn set_photo_url(&mut self, url: impl Into<String>) {
        self.photo_url = Some(url.into());
    }

    /// Marks the user as their community's leader
    pub fn promote_to_leader(&mut self) {
        self.is_leader = true;
    }

    /// Applies a reputation delta, saturating at the bounds
    pub fn adjust_reputation(&mut self, delta: i32) -> Reputation {
        self.reputation = self.reputation.adjusted(delta);
        self.reputation
    }

    /// Records a pending request on `listing`
    pub fn add_booked_product(&mut self, listing: ListingId) {
        self.booked_products.insert(listing);
    }

    /// Drops a pending request on `listing`
    pub fn remove_booked_product(&mut self, listing: &ListingId) {
        self.booked_products.remove(listing);
    }

    /// Records `listing` as currently held
    pub fn add_rent_in(&mut self, listing: ListingId) {
        self.rent_in.insert(listing);
    }

    /// Drops `listing` from the held set
    pub fn remove_rent_in(&mut self, listing: &ListingId) {
        self.rent_in.remove(listing);
    }

    /// Appends a moderation report to this (leader) account
    pub fn push_report(&mut self, report: ModerationReport) {
        self.reports.push(report);
    }
}

impl From<UserSnapshot> for User {
    fn from(s: UserSnapshot) -> Self {
        Self {
            id: s.id,
            name: s.name,
            email: s.email,
            phone: s.phone,
            password_hash: s.password_hash,
            reputation: s.reputation,
            community_id: s.community_id,
            is_leader: s.is_leader,
            photo_url: s.photo_url,
            booked_products: s.booked_products,
            rent_in: s.rent_in,
            reports: s.reports,
            created_at: s.created_at,
        }
    }
}

fn required(field: &str, value: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::ValidationFailed(format!(
            "{field} cannot be empty"
        )));
    }
    Ok(trimmed.to_string())
}
