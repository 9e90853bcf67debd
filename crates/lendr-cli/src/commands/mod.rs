//! CLI subcommands and the wiring they share

pub mod audit;
pub mod book;
pub mod completions;
pub mod config;
pub mod listing;
pub mod report;
pub mod user;

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use tracing::debug;

use lendr_audit::LoanLedger;
use lendr_core::{
    config::Config,
    domain::{ListingId, UserId},
    ports::PhotoUpload,
    usecases::Services,
};
use lendr_outbound::{build_blob_store, build_notifier};
use lendr_store::{DatabasePool, SqliteLendingStore};

/// Use cases and ledger wired to the configured adapters
pub struct AppContext {
    pub services: Services,
    pub ledger: LoanLedger,
}

impl AppContext {
    /// Opens the database and builds every adapter from `config`
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = DatabasePool::with_max_connections(
            &config.store.database_path,
            config.store.max_connections,
        )
        .await
        .with_context(|| {
            format!(
                "Failed to open database at {}",
                config.store.database_path.display()
            )
        })?;
        let store = Arc::new(SqliteLendingStore::new(pool.pool().clone()));

        let notifier = build_notifier(&config.notify).context("Failed to set up notifications")?;
        let blobs = build_blob_store(&config.uploads).context("Failed to set up photo uploads")?;

        debug!(path = %config.store.database_path.display(), "Application context ready");

        Ok(Self {
            services: Services::new(config, store.clone(), store.clone(), notifier, blobs),
            ledger: LoanLedger::new(store),
        })
    }
}

/// The user a command acts as, from the global `--as` flag
pub fn acting_user(as_user: Option<&str>) -> Result<UserId> {
    let raw = as_user.context("This command needs --as <USER_ID>")?;
    parse_user_id(raw)
}

pub fn parse_user_id(raw: &str) -> Result<UserId> {
    raw.trim()
        .parse()
        .with_context(|| format!("Invalid user id: '{raw}'"))
}

pub fn parse_listing_id(raw: &str) -> Result<ListingId> {
    raw.trim()
        .parse()
        .with_context(|| format!("Invalid listing id: '{raw}'"))
}

/// Reads a photo from disk, guessing its content type from the extension
pub async fn read_photo(path: &Path) -> Result<PhotoUpload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read photo {}", path.display()))?;

    let mut photo = PhotoUpload::new(bytes);
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        photo = photo.with_file_name(name);
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let content_type = match extension.as_deref() {
        Some("jpg") | Some("jpeg") => Some("image/jpeg"),
        Some("png") => Some("image/png"),
        Some("gif") => Some("image/gif"),
        Some("webp") => Some("image/webp"),
        _ => None,
    };
    if let Some(content_type) = content_type {
        photo = photo.with_content_type(content_type);
    }

    Ok(photo)
}
