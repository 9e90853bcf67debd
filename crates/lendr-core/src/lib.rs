//! Lendr Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `User`, `Listing`, `LoanRecord`, `ModerationReport`
//! - **Use cases** - `BookingEngine`, `ListingCatalog`, `ModerationService`, `AccountService`
//! - **Port definitions** - Traits for adapters: `IIdentityStore`, `IListingStore`,
//!   `IAuditLog`, `INotifier`, `IBlobStore`
//! - **State machine** - The listing booking lifecycle (available / rented)
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement.
//! Use cases orchestrate domain entities through port interfaces.

pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
