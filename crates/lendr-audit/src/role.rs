//! Roles a user can play in a loan

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which side of a loan record a user was on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanRole {
    /// Owned the listing and handed it over
    Lender,
    /// Received the listing
    Borrower,
}

impl fmt::Display for LoanRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoanRole::Lender => "lender",
            LoanRole::Borrower => "borrower",
        };
        write!(f, "{s}")
    }
}
