//! Domain entities and business logic
//!
//! This module contains the core domain types for Lendr:
//! - Newtypes for type-safe identifiers and validated values
//! - Users, listings and the booking state machine
//! - Moderation reports and loan records
//! - Read-side views returned by listing queries
//! - Domain-specific error types

pub mod errors;
pub mod listing;
pub mod loan;
pub mod newtypes;
pub mod report;
pub mod user;
pub mod views;

// Re-export commonly used types
pub use errors::DomainError;
pub use listing::{Listing, ListingSnapshot, ListingState};
pub use loan::LoanRecord;
pub use newtypes::*;
pub use report::ModerationReport;
pub use user::{NewUser, User, UserSnapshot};
pub use views::{ContactInfo, OfferedListing, PendingRequest, RequesterContact};
