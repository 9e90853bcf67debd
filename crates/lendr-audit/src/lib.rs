//! Lendr Audit - Loan ledger
//!
//! Provides:
//! - `LoanLedger`: read-side service over the append-only loan log
//! - `LoanRole`: which side of a loan a user was on
//! - Integration with `IAuditLog` for persistent loan records

pub mod ledger;
pub mod role;

pub use ledger::{LedgerEntry, LoanLedger, LoanSummary};
pub use role::LoanRole;
