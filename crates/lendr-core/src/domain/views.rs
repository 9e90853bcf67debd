//! Read-side composite views
//!
//! Typed results of the joins the listing queries perform: a listing paired
//! with the contact details of the people attached to it.

use serde::{Deserialize, Serialize};

use super::{listing::Listing, newtypes::UserId, user::User};

/// Public contact details of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub user_id: UserId,
    pub name: String,
    pub phone: String,
    pub email: String,
}

impl From<&User> for ContactInfo {
    fn from(user: &User) -> Self {
        Self {
            user_id: *user.id(),
            name: user.name().to_string(),
            phone: user.phone().to_string(),
            email: user.email().as_str().to_string(),
        }
    }
}

/// One of the viewer's own listings, with whoever is attached to it
///
/// `requesters` is only populated while the listing is available and
/// `holder` only while it is rented.
#[derive(Debug, Clone, Serialize)]
pub struct OfferedListing {
    pub listing: Listing,
    pub requesters: Vec<ContactInfo>,
    pub holder: Option<ContactInfo>,
}

/// A listing the viewer has requested, with the owner's contact details
#[derive(Debug, Clone, Serialize)]
pub struct PendingRequest {
    pub listing: Listing,
    pub owner: ContactInfo,
}

/// Name and phone of a pending requester, as shown to the owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequesterContact {
    pub user_id: UserId,
    pub name: String,
    pub phone: String,
}

impl From<&User> for RequesterContact {
    fn from(user: &User) -> Self {
        Self {
            user_id: *user.id(),
            name: user.name().to_string(),
            phone: user.phone().to_string(),
        }
    }
}
