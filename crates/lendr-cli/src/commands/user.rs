//! User command - accounts and profiles
//!
//! Provides the `lendr user` CLI command which:
//! 1. Registers members and checks their credentials
//! 2. Shows and edits profiles (details, password, picture)
//! 3. Promotes a member to community leader

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use tracing::info;

use lendr_core::{config::Config, domain::User, usecases::Registration};

use super::{acting_user, parse_user_id, read_photo, AppContext};
use crate::output::{emit, OutputFormat, OutputFormatter};

/// User subcommands
#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// Register a new member
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        phone: String,
        /// Community slug, e.g. "riverside-allotments"
        #[arg(long)]
        community: String,
    },
    /// Check an email and password, printing the member's id
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Show a profile (defaults to the --as user)
    Profile {
        /// User id to show
        user: Option<String>,
    },
    /// Change display name and/or phone
    Update {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Change password
    Password {
        #[arg(long)]
        current: String,
        #[arg(long = "new")]
        new_password: String,
    },
    /// Upload a profile picture
    Photo {
        /// Image file
        path: PathBuf,
    },
    /// Make a member the leader of their community
    Promote {
        /// User id to promote
        user: String,
    },
}

impl UserCommand {
    /// Execute the user command
    pub async fn execute(
        &self,
        config: &Config,
        as_user: Option<&str>,
        format: OutputFormat,
    ) -> Result<()> {
        let ctx = AppContext::open(config).await?;
        let accounts = &ctx.services.accounts;

        match self {
            UserCommand::Register {
                name,
                email,
                password,
                phone,
                community,
            } => {
                info!(email = %email, community = %community, "Registering user");
                let result = accounts
                    .register(Registration {
                        name: name.clone(),
                        email: email.clone(),
                        password: password.clone(),
                        phone: phone.clone(),
                        community: community.clone(),
                    })
                    .await;
                emit(format, result, "User registered", render_user)
            }
            UserCommand::Login { email, password } => {
                let result = accounts.verify_credentials(email, password).await;
                emit(format, result, "Credentials verified", render_user)
            }
            UserCommand::Profile { user } => {
                let id = match user {
                    Some(raw) => parse_user_id(raw)?,
                    None => acting_user(as_user)?,
                };
                let result = accounts.profile(&id).await;
                emit(format, result, "Profile", render_user)
            }
            UserCommand::Update { name, phone } => {
                let id = acting_user(as_user)?;
                let result = accounts
                    .update_details(&id, name.as_deref(), phone.as_deref())
                    .await;
                emit(format, result, "Profile updated", render_user)
            }
            UserCommand::Password {
                current,
                new_password,
            } => {
                let id = acting_user(as_user)?;
                let result = accounts
                    .change_password(&id, current, new_password)
                    .await
                    .map(|_| ());
                emit(format, result, "Password changed", |_, _| {})
            }
            UserCommand::Photo { path } => {
                let id = acting_user(as_user)?;
                let photo = read_photo(path).await?;
                let result = accounts.set_profile_picture(&id, photo).await;
                emit(format, result, "Profile picture updated", render_user)
            }
            UserCommand::Promote { user } => {
                let id = parse_user_id(user)?;
                let result = accounts.promote_to_leader(&id).await;
                emit(format, result, "Promoted to community leader", render_user)
            }
        }
    }
}

fn render_user(out: &dyn OutputFormatter, user: &User) {
    out.info(&format!("Id:          {}", user.id()));
    out.info(&format!("Name:        {}", user.name()));
    out.info(&format!("Email:       {}", user.email()));
    out.info(&format!("Phone:       {}", user.phone()));
    out.info(&format!(
        "Community:   {}{}",
        user.community_id(),
        if user.is_leader() { " (leader)" } else { "" }
    ));
    out.info(&format!("Reputation:  {}/100", user.reputation()));
    if let Some(url) = user.photo_url() {
        out.info(&format!("Photo:       {url}"));
    }
    out.info(&format!(
        "Borrowing:   {} held, {} requested",
        user.rent_in().len(),
        user.booked_products().len()
    ));
    if user.is_leader() {
        out.info(&format!("Reports:     {}", user.reports().len()));
        for report in user.reports() {
            out.info(&format!(
                "  {} reported {} ({}): {}",
                report.reporter_name(),
                report.target().name,
                report.reported_at().format("%Y-%m-%d"),
                report.reason()
            ));
        }
    }
}
