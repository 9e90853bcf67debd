//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IIdentityStore`] - User records, reputation and moderation reports
//! - [`IListingStore`] - Listings and atomic booking transitions
//! - [`IAuditLog`] - Read access to the append-only loan log
//! - [`INotifier`] - Best-effort outbound messages
//! - [`IBlobStore`] - Photo uploads

pub mod audit_log;
pub mod blob_store;
pub mod identity_store;
pub mod listing_store;
pub mod notification;

pub use audit_log::IAuditLog;
pub use blob_store::{IBlobStore, PhotoUpload};
pub use identity_store::IIdentityStore;
pub use listing_store::{CommitOutcome, IListingStore, ListingFilter, Transition};
pub use notification::{INotifier, Notification};
