//! Use-case error taxonomy
//!
//! Every operation fails with a [`LendingError`]: an [`ErrorKind`] the
//! boundary maps to a status code, plus a message that is safe to show to
//! the caller. Store-level details never reach the message; they are logged
//! where the failure is observed.

use std::{future::Future, time::Duration};

use thiserror::Error;

use crate::domain::DomainError;

/// Failure classes surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The user or listing does not exist
    NotFound,
    /// The listing is not in a state that allows the operation
    InvalidState,
    /// The caller is not allowed to perform the operation
    Unauthorized,
    /// A concurrent writer changed the listing first
    Conflict,
    /// Malformed or missing parameters
    InvalidInput,
    /// A dependency timed out or was briefly unavailable
    Transient,
    /// An unexpected failure; state should be re-checked
    Internal,
}

impl ErrorKind {
    /// HTTP-style status code for this kind
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::Unauthorized => 403,
            ErrorKind::InvalidState | ErrorKind::Conflict => 409,
            ErrorKind::InvalidInput => 400,
            ErrorKind::Transient => 503,
            ErrorKind::Internal => 500,
        }
    }

    /// Returns a snake_case name for the kind
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Conflict => "conflict",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Transient => "transient",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Error returned by every lending operation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct LendingError {
    kind: ErrorKind,
    message: String,
}

/// Result alias for lending operations
pub type LendingResult<T> = std::result::Result<T, LendingError>;

impl LendingError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidState, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Returns the failure class
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the caller-facing message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Shorthand for `self.kind().status_code()`
    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }
}

impl From<DomainError> for LendingError {
    fn from(err: DomainError) -> Self {
        let kind = match err {
            DomainError::InvalidEmail(_)
            | DomainError::InvalidId(_)
            | DomainError::InvalidCommunity(_)
            | DomainError::InvalidReputation(_)
            | DomainError::ValidationFailed(_) => ErrorKind::InvalidInput,
            DomainError::InvalidState { .. }
            | DomainError::OwnListing { .. }
            | DomainError::AlreadyRequested { .. }
            | DomainError::NotPending { .. } => ErrorKind::InvalidState,
            DomainError::NotOwner { .. }
            | DomainError::NotParticipant { .. }
            | DomainError::CommunityMismatch { .. } => ErrorKind::Unauthorized,
        };
        Self::new(kind, err.to_string())
    }
}

// ============================================================================
// Store call guard
// ============================================================================

/// Runs a store call under `limit`, translating failures into
/// [`LendingError`]s
///
/// Adapter errors are logged in full and surface as `Internal`; an elapsed
/// deadline surfaces as `Transient`. Neither is assumed to have committed,
/// so both messages ask the caller to re-check state.
pub(crate) async fn guarded<T, F>(limit: Duration, operation: &str, call: F) -> LendingResult<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            tracing::error!(operation, error = %format!("{e:#}"), "Store call failed");
            Err(LendingError::internal(format!(
                "Could not {operation}; re-check state before retrying"
            )))
        }
        Err(_) => {
            tracing::warn!(operation, timeout_ms = limit.as_millis() as u64, "Store call timed out");
            Err(LendingError::transient(format!(
                "Timed out trying to {operation}; re-check state before retrying"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ListingId, UserId};

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorKind::NotFound.status_code(), 404);
        assert_eq!(ErrorKind::Unauthorized.status_code(), 403);
        assert_eq!(ErrorKind::InvalidState.status_code(), 409);
        assert_eq!(ErrorKind::Conflict.status_code(), 409);
        assert_eq!(ErrorKind::InvalidInput.status_code(), 400);
        assert_eq!(ErrorKind::Transient.status_code(), 503);
        assert_eq!(ErrorKind::Internal.status_code(), 500);
    }

    #[test]
    fn test_domain_error_mapping() {
        let listing = ListingId::new();
        let user = UserId::new();

        let err: LendingError = DomainError::NotOwner { listing }.into();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let err: LendingError = DomainError::AlreadyRequested { listing, user }.into();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let err: LendingError = DomainError::ValidationFailed("name".into()).into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(err.message(), "Validation failed: name");
    }

    #[tokio::test]
    async fn test_guarded_hides_store_details() {
        let result: LendingResult<()> = guarded(Duration::from_secs(1), "load listing", async {
            Err(anyhow::anyhow!("database is locked: SQLITE_BUSY"))
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!err.message().contains("SQLITE"));
        assert!(err.message().contains("re-check state"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_guarded_times_out_as_transient() {
        let result: LendingResult<()> = guarded(Duration::from_millis(50), "commit", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Transient);
    }
}
