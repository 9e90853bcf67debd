//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for identifiers and bounded values. Every
//! constructor validates its input so the rest of the domain can rely on
//! the invariant without re-checking it.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// UUID-based ID types
// ============================================================================

/// Identifier for registered users
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Create a new random UserId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a UserId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid UserId: {e}")))
    }
}

impl From<Uuid> for UserId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Identifier for listings (items offered for borrowing)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(Uuid);

impl ListingId {
    /// Create a new random ListingId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a ListingId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ListingId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ListingId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ListingId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid ListingId: {e}")))
    }
}

impl From<Uuid> for ListingId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Identifier for loan records (database row ID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoanId(i64);

impl LoanId {
    /// Create a LoanId from an i64 value
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for LoanId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for LoanId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ============================================================================
// Community identifier
// ============================================================================

/// Slug identifying a lending community (e.g. `riverside-allotments`)
///
/// Lowercase ASCII letters, digits, `-` and `_`, 1 to 64 characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommunityId(String);

impl CommunityId {
    const MAX_LEN: usize = 64;

    /// Create a new validated CommunityId
    ///
    /// Input is trimmed and lowercased before validation.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidCommunity` for empty, overlong or
    /// non-slug input
    pub fn new(id: String) -> Result<Self, DomainError> {
        let normalized = id.trim().to_lowercase();

        if normalized.is_empty() {
            return Err(DomainError::InvalidCommunity(
                "Community id cannot be empty".to_string(),
            ));
        }

        if normalized.len() > Self::MAX_LEN {
            return Err(DomainError::InvalidCommunity(format!(
                "Community id too long (max {} chars): {normalized}",
                Self::MAX_LEN
            )));
        }

        if !normalized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(DomainError::InvalidCommunity(format!(
                "Community id contains invalid characters: {normalized}"
            )));
        }

        Ok(Self(normalized))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CommunityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CommunityId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for CommunityId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<CommunityId> for String {
    fn from(id: CommunityId) -> Self {
        id.0
    }
}

// ============================================================================
// Email type
// ============================================================================

/// Validated, lowercased email address
///
/// Structural checks only: one `@`, a non-empty local part of at most 64
/// characters, and a dotted domain without empty labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Create a new validated Email
    ///
    /// # Errors
    /// Returns `DomainError::InvalidEmail` if the format is invalid
    pub fn new(email: String) -> Result<Self, DomainError> {
        let email = email.trim().to_lowercase();
        Self::validate(&email)?;
        Ok(Self(email))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the domain part (after @)
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.split('@').nth(1).unwrap_or("")
    }

    fn validate(email: &str) -> Result<(), DomainError> {
        let Some((local, domain)) = email.split_once('@') else {
            return Err(DomainError::InvalidEmail(format!(
                "Email must contain '@': {email}"
            )));
        };

        if domain.contains('@') {
            return Err(DomainError::InvalidEmail(format!(
                "Email must contain exactly one '@': {email}"
            )));
        }

        if local.is_empty() || local.len() > 64 {
            return Err(DomainError::InvalidEmail(format!(
                "Email local part must be 1-64 chars: {email}"
            )));
        }

        if !local
            .chars()
            .all(|c| c.is_alphanumeric() || ".+-_".contains(c))
        {
            return Err(DomainError::InvalidEmail(format!(
                "Email local part contains invalid characters: {email}"
            )));
        }

        if !domain.contains('.') {
            return Err(DomainError::InvalidEmail(format!(
                "Email domain must contain at least one dot: {email}"
            )));
        }

        for label in domain.split('.') {
            if label.is_empty()
                || label.starts_with('-')
                || label.ends_with('-')
                || !label.chars().all(|c| c.is_alphanumeric() || c == '-')
            {
                return Err(DomainError::InvalidEmail(format!(
                    "Email domain is malformed: {email}"
                )));
            }
        }

        Ok(())
    }
}

impl Display for Email {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Email {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for Email {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

// ============================================================================
// Reputation
// ============================================================================

/// Trust score bounded to `[0, 100]`
///
/// Every adjustment saturates at the bounds; there is no way to build a
/// `Reputation` outside the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Reputation(u8);

impl Reputation {
    /// Lowest possible score
    pub const MIN: Reputation = Reputation(0);
    /// Highest possible score
    pub const MAX: Reputation = Reputation(100);

    /// Create a Reputation from a raw score
    ///
    /// # Errors
    /// Returns `DomainError::InvalidReputation` if `value` exceeds 100
    pub fn new(value: u8) -> Result<Self, DomainError> {
        if value > Self::MAX.0 {
            return Err(DomainError::InvalidReputation(i64::from(value)));
        }
        Ok(Self(value))
    }

    /// Build a Reputation from any integer, clamping into range
    #[must_use]
    pub fn clamped(value: i64) -> Self {
        // Range is 0..=100 so the cast cannot truncate.
        Self(value.clamp(i64::from(Self::MIN.0), i64::from(Self::MAX.0)) as u8)
    }

    /// Returns the score shifted by `delta`, saturating at the bounds
    #[must_use]
    pub fn adjusted(self, delta: i32) -> Self {
        Self::clamped(i64::from(self.0) + i64::from(delta))
    }

    /// Get the raw score
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }
}

impl Default for Reputation {
    fn default() -> Self {
        Self(50)
    }
}

impl Display for Reputation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for Reputation {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Reputation> for u8 {
    fn from(reputation: Reputation) -> Self {
        reputation.0
    }
}

// ============================================================================
// Tests
// ============================================================================
