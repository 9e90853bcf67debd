//! Lendr CLI - Command-line interface for Lendr
//!
//! Provides commands for:
//! - Registering members and editing profiles
//! - Listing items and browsing the community catalog
//! - Requesting, granting, returning and cancelling loans
//! - Reporting members to the community leader
//! - Reading the loan log

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lendr_core::config::Config;

mod commands;
mod output;

use commands::{
    audit::AuditCommand, book::BookCommand, completions::CompletionsCommand,
    config::ConfigCommand, listing::ListingCommand, report::ReportCommand, user::UserCommand,
};
use output::{CommandFailed, OutputFormat};

#[derive(Debug, Parser)]
#[command(name = "lendr", version, about = "Community item lending")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Act as this user (id printed by `user register` / `user login`)
    #[arg(long = "as", value_name = "USER_ID", global = true)]
    as_user: Option<String>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Accounts and profiles
    #[command(subcommand)]
    User(UserCommand),
    /// Create and browse listings
    #[command(subcommand)]
    Listing(ListingCommand),
    /// Request, lend, return and cancel
    #[command(subcommand)]
    Book(BookCommand),
    /// Report a member to the community leader
    Report(ReportCommand),
    /// View the loan log
    Audit(AuditCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<CommandFailed>() {
            // Already reported by the command
            Some(failed) => ExitCode::from(failed.exit_code()),
            None => {
                eprintln!("\u{2717} Error: {e:#}");
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = match cli.config {
        Some(ref path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::load_or_default(&config_path),
    };

    init_tracing(&cli, &config);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let as_user = cli.as_user.as_deref();

    match cli.command {
        Commands::Config(ref cmd) => return cmd.execute(&config, &config_path, format).await,
        Commands::Completions(ref cmd) => return cmd.execute(),
        _ => {}
    }

    let errors = config.validate();
    if !errors.is_empty() {
        let details: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow::bail!(
            "Invalid configuration ({}): {}",
            config_path.display(),
            details.join("; ")
        );
    }

    match cli.command {
        Commands::User(ref cmd) => cmd.execute(&config, as_user, format).await,
        Commands::Listing(ref cmd) => cmd.execute(&config, as_user, format).await,
        Commands::Book(ref cmd) => cmd.execute(&config, as_user, format).await,
        Commands::Report(ref cmd) => cmd.execute(&config, as_user, format).await,
        Commands::Audit(ref cmd) => cmd.execute(&config, format).await,
        Commands::Config(_) | Commands::Completions(_) => Ok(()),
    }
}

/// RUST_LOG wins, then -v/-q, then `logging.level`
fn init_tracing(cli: &Cli, config: &Config) {
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => "warn",
        (false, 0) => config.logging.level.as_str(),
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
