//! Listing command - create and browse listings
//!
//! Provides the `lendr listing` CLI command which:
//! 1. Creates a listing with a photo
//! 2. Browses the community catalog from the --as user's point of view
//! 3. Shows what the user offers, holds and waits for

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;

use lendr_core::{
    config::Config,
    domain::{Listing, OfferedListing, PendingRequest, RequesterContact},
    usecases::NewListing,
};

use super::{acting_user, parse_listing_id, read_photo, AppContext};
use crate::output::{emit, OutputFormat, OutputFormatter};

/// Listing subcommands
#[derive(Debug, Subcommand)]
pub enum ListingCommand {
    /// Offer a new item
    Create {
        #[arg(long)]
        name: String,
        /// Detail line; repeat for several
        #[arg(long = "detail")]
        details: Vec<String>,
        /// Photo of the item
        #[arg(long)]
        photo: PathBuf,
    },
    /// Show one listing
    Show {
        listing: String,
    },
    /// Available listings you can still request
    Browse,
    /// Every listing in your community
    Community,
    /// Your listings with their requesters and holder
    Mine,
    /// Listings you currently hold
    Loans,
    /// Listings you are waiting on
    Requests,
    /// Who is waiting for one of your listings
    Requesters {
        listing: String,
    },
}

impl ListingCommand {
    /// Execute the listing command
    pub async fn execute(
        &self,
        config: &Config,
        as_user: Option<&str>,
        format: OutputFormat,
    ) -> Result<()> {
        let ctx = AppContext::open(config).await?;
        let catalog = &ctx.services.catalog;

        if let ListingCommand::Show { listing } = self {
            let id = parse_listing_id(listing)?;
            let result = catalog.get(&id).await;
            return emit(format, result, "Listing", |out, l| render_listing(out, l));
        }

        let viewer = acting_user(as_user)?;

        match self {
            ListingCommand::Create {
                name,
                details,
                photo,
            } => {
                let photo = read_photo(photo).await?;
                let result = catalog
                    .create(
                        &viewer,
                        NewListing {
                            name: name.clone(),
                            details: details.clone(),
                            photo,
                        },
                    )
                    .await;
                emit(format, result, "Listing created", |out, l| {
                    render_listing(out, l)
                })
            }
            ListingCommand::Browse => {
                let result = catalog.browse_available(&viewer).await;
                emit(format, result, "Available listings", |out, v| render_listings(out, v))
            }
            ListingCommand::Community => {
                let result = catalog.community_listings(&viewer).await;
                emit(format, result, "Community listings", |out, v| render_listings(out, v))
            }
            ListingCommand::Mine => {
                let result = catalog.offered(&viewer).await;
                emit(format, result, "Your listings", |out, v| render_offered(out, v))
            }
            ListingCommand::Loans => {
                let result = catalog.active_loans(&viewer).await;
                emit(format, result, "Items you hold", |out, v| render_listings(out, v))
            }
            ListingCommand::Requests => {
                let result = catalog.pending_requests(&viewer).await;
                emit(format, result, "Pending requests", |out, v| render_pending(out, v))
            }
            ListingCommand::Requesters { listing } => {
                let id = parse_listing_id(listing)?;
                let result = catalog.requesters_of(&id, &viewer).await;
                emit(format, result, "Requesters", |out, v| render_requesters(out, v))
            }
            ListingCommand::Show { .. } => Ok(()),
        }
    }
}

fn render_listing(out: &dyn OutputFormatter, listing: &Listing) {
    out.info(&format!("{}  {}", listing.id(), listing.name()));
    for line in listing.details() {
        out.info(&format!("    {line}"));
    }
    out.info(&format!("    state: {}", listing.state()));
    if !listing.booked_by().is_empty() {
        out.info(&format!("    pending requests: {}", listing.booked_by().len()));
    }
}

fn render_listings(out: &dyn OutputFormatter, listings: &[Listing]) {
    if listings.is_empty() {
        out.info("Nothing here yet.");
    }
    for listing in listings {
        render_listing(out, listing);
    }
}

fn render_offered(out: &dyn OutputFormatter, offered: &[OfferedListing]) {
    if offered.is_empty() {
        out.info("You have not listed anything.");
    }
    for entry in offered {
        render_listing(out, &entry.listing);
        if let Some(ref holder) = entry.holder {
            out.info(&format!("    held by {} ({})", holder.name, holder.phone));
        }
        for requester in &entry.requesters {
            out.info(&format!(
                "    requested by {} ({}, {})",
                requester.name, requester.phone, requester.email
            ));
        }
    }
}

fn render_pending(out: &dyn OutputFormatter, pending: &[PendingRequest]) {
    if pending.is_empty() {
        out.info("No pending requests.");
    }
    for entry in pending {
        render_listing(out, &entry.listing);
        out.info(&format!(
            "    owner {} ({}, {})",
            entry.owner.name, entry.owner.phone, entry.owner.email
        ));
    }
}

fn render_requesters(out: &dyn OutputFormatter, requesters: &[RequesterContact]) {
    if requesters.is_empty() {
        out.info("Nobody is waiting for this listing.");
    }
    for (position, requester) in requesters.iter().enumerate() {
        out.info(&format!(
            "{}. {}  {} ({})",
            position + 1,
            requester.user_id,
            requester.name,
            requester.phone
        ));
    }
}
