//! Book command - drive a listing through its lending states
//!
//! Every subcommand acts as the global `--as` user:
//! request and cancel as a borrower, grant and delete as the owner,
//! return as either side of the loan.

use anyhow::Result;
use clap::Subcommand;

use lendr_core::{config::Config, domain::Listing};

use super::{acting_user, parse_listing_id, parse_user_id, AppContext};
use crate::output::{emit, OutputFormat, OutputFormatter};

/// Booking subcommands
#[derive(Debug, Subcommand)]
pub enum BookCommand {
    /// Ask to borrow a listing
    Request {
        listing: String,
    },
    /// Lend a listing to one of its requesters
    Grant {
        listing: String,
        /// Requester to hand the item to
        #[arg(long = "to")]
        to: String,
    },
    /// Hand a borrowed item back; the listing is removed
    Return {
        listing: String,
    },
    /// Withdraw your pending request
    Cancel {
        listing: String,
    },
    /// Remove one of your listings that is not out on loan
    Delete {
        listing: String,
    },
}

impl BookCommand {
    /// Execute the booking command
    pub async fn execute(
        &self,
        config: &Config,
        as_user: Option<&str>,
        format: OutputFormat,
    ) -> Result<()> {
        let caller = acting_user(as_user)?;
        let ctx = AppContext::open(config).await?;
        let booking = &ctx.services.booking;

        match self {
            BookCommand::Request { listing } => {
                let id = parse_listing_id(listing)?;
                let result = booking.request(&id, &caller).await;
                emit(format, result, "Request placed", render_booking)
            }
            BookCommand::Grant { listing, to } => {
                let id = parse_listing_id(listing)?;
                let chosen = parse_user_id(to)?;
                let result = booking.grant(&id, &caller, &chosen).await;
                emit(format, result, "Listing lent", render_booking)
            }
            BookCommand::Return { listing } => {
                let id = parse_listing_id(listing)?;
                let result = booking.return_item(&id, &caller).await;
                emit(format, result, "Item returned", |out, l| {
                    out.info(&format!("{}  {} (removed)", l.id(), l.name()));
                })
            }
            BookCommand::Cancel { listing } => {
                let id = parse_listing_id(listing)?;
                let result = booking.cancel(&id, &caller).await;
                emit(format, result, "Request withdrawn", render_booking)
            }
            BookCommand::Delete { listing } => {
                let id = parse_listing_id(listing)?;
                let result = booking.delete(&id, &caller).await;
                emit(format, result, "Listing deleted", |out, l| {
                    out.info(&format!("{}  {}", l.id(), l.name()));
                    if !l.booked_by().is_empty() {
                        out.info(&format!(
                            "    {} pending request(s) dropped",
                            l.booked_by().len()
                        ));
                    }
                })
            }
        }
    }
}

fn render_booking(out: &dyn OutputFormatter, listing: &Listing) {
    out.info(&format!("{}  {}", listing.id(), listing.name()));
    out.info(&format!("    state: {}", listing.state()));
    if let Some(holder) = listing.given_to() {
        out.info(&format!("    held by {holder}"));
    }
    for (position, requester) in listing.booked_by().iter().enumerate() {
        out.info(&format!("    {}. {requester}", position + 1));
    }
}
