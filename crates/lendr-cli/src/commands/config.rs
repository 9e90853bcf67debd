//! Config command - View and manage Lendr configuration
//!
//! Provides the `lendr config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON, secrets masked)
//! 2. Sets individual configuration values via dot-notation keys
//! 3. Validates the configuration file and reports errors

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use lendr_core::config::{Config, UploadMode};

use crate::output::{get_formatter, OutputFormat};

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "reputation.return_reward")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    /// Execute the config command against the file at `config_path`
    pub async fn execute(
        &self,
        config: &Config,
        config_path: &Path,
        format: OutputFormat,
    ) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(config, config_path, format),
            ConfigCommand::Set { key, value } => execute_set(config_path, key, value, format),
            ConfigCommand::Validate => execute_validate(config_path, format),
            ConfigCommand::Path => {
                let formatter = get_formatter(format.is_json());
                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "config_path": config_path.display().to_string(),
                        "exists": config_path.exists(),
                    }));
                } else {
                    println!("{}", config_path.display());
                }
                Ok(())
            }
        }
    }
}

fn execute_show(config: &Config, config_path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format.is_json());
    let config = masked(config);

    info!(config_path = %config_path.display(), "Showing configuration");

    if format.is_json() {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", config_path.display()));
        formatter.info("");

        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }

    Ok(())
}

fn execute_set(config_path: &Path, key: &str, value: &str, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format.is_json());
    let mut config = Config::load_or_default(config_path);

    info!(key = %key, "Setting configuration value");

    if let Err(e) = apply_config_value(&mut config, key, value) {
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "error": e.to_string(),
            }));
        } else {
            formatter.error(&format!("Failed to set '{}': {}", key, e));
            formatter.info("");
            formatter.info("Supported keys:");
            for (name, help) in SUPPORTED_KEYS {
                formatter.info(&format!("  {:<36} - {}", name, help));
            }
        }
        return Ok(());
    }

    let errors = config.validate();
    if !errors.is_empty() {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "errors": messages,
            }));
        } else {
            formatter.error(&format!(
                "Invalid value for '{}': {}",
                key,
                messages.join("; ")
            ));
        }
        return Ok(());
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
    }
    let yaml = serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
    std::fs::write(config_path, yaml).context("Failed to write configuration file")?;

    if format.is_json() {
        formatter.print_json(&serde_json::json!({
            "success": true,
            "key": key,
            "config_path": config_path.display().to_string(),
        }));
    } else {
        formatter.success(&format!("Set {}", key));
        formatter.info(&format!("Saved to {}", config_path.display()));
    }

    Ok(())
}

fn execute_validate(config_path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format.is_json());

    let config = match Config::load(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            let error = if config_path.exists() {
                format!("Failed to parse configuration: {}", e)
            } else {
                "Configuration file not found. Using defaults.".to_string()
            };

            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": config_path.display().to_string(),
                    "errors": [error],
                }));
            } else if config_path.exists() {
                formatter.error(&error);
                formatter.info(&format!("File: {}", config_path.display()));
            } else {
                formatter.info(&format!(
                    "Configuration file not found at {}",
                    config_path.display()
                ));
                formatter.info(
                    "Using default configuration. Run 'lendr config set <key> <value>' to create one.",
                );
            }
            return Ok(());
        }
    };

    info!(config_path = %config_path.display(), "Validating configuration");

    let errors = config.validate();

    if format.is_json() {
        let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": config_path.display().to_string(),
            "errors": error_strings,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", config_path.display()));
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        formatter.info(&format!("File: {}", config_path.display()));
        formatter.info("");
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }

    Ok(())
}

/// Copy of `config` with the SMTP password replaced
fn masked(config: &Config) -> Config {
    let mut config = config.clone();
    if let Some(ref mut smtp) = config.notify.smtp {
        if smtp.password.is_some() {
            smtp.password = Some("********".to_string());
        }
    }
    config
}

const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("store.database_path", "SQLite database file"),
    ("store.timeout_ms", "Store call timeout (ms)"),
    ("store.max_connections", "Connection pool size"),
    ("reputation.initial", "Score for new members (0-100)"),
    ("reputation.return_reward", "Points for returning an item"),
    ("reputation.report_penalty", "Points lost when reported"),
    ("identity.bcrypt_cost", "Password hashing work factor"),
    ("uploads.mode", "local|http"),
    ("uploads.local_dir", "Photo directory in local mode"),
    ("uploads.endpoint", "Image host URL in http mode"),
    ("uploads.upload_preset", "Upload preset in http mode"),
    ("uploads.max_size_kb", "Largest accepted photo (KiB)"),
    ("logging.level", "trace|debug|info|warn|error"),
    ("logging.json", "true|false"),
];

/// Apply a dot-notation key/value pair to a Config struct
///
/// SMTP settings are left to the file itself.
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        // --- store ---
        "store.database_path" => {
            config.store.database_path = PathBuf::from(value);
        }
        "store.timeout_ms" => {
            config.store.timeout_ms = value
                .parse::<u64>()
                .context("Expected a positive integer for store.timeout_ms")?;
        }
        "store.max_connections" => {
            config.store.max_connections = value
                .parse::<u32>()
                .context("Expected a positive integer")?;
        }

        // --- reputation ---
        "reputation.initial" => {
            config.reputation.initial = parse_points(value)?;
        }
        "reputation.return_reward" => {
            config.reputation.return_reward = parse_points(value)?;
        }
        "reputation.report_penalty" => {
            config.reputation.report_penalty = parse_points(value)?;
        }

        // --- identity ---
        "identity.bcrypt_cost" => {
            config.identity.bcrypt_cost = value
                .parse::<u32>()
                .context("Expected a positive integer")?;
        }

        // --- uploads ---
        "uploads.mode" => {
            config.uploads.mode = match value {
                "local" => UploadMode::Local,
                "http" => UploadMode::Http,
                other => anyhow::bail!("Unknown upload mode '{}', expected local or http", other),
            };
        }
        "uploads.local_dir" => {
            config.uploads.local_dir = PathBuf::from(value);
        }
        "uploads.endpoint" => {
            config.uploads.endpoint = optional(value);
        }
        "uploads.upload_preset" => {
            config.uploads.upload_preset = optional(value);
        }
        "uploads.max_size_kb" => {
            config.uploads.max_size_kb = value
                .parse::<u64>()
                .context("Expected a positive integer")?;
        }

        // --- logging ---
        "logging.level" => {
            config.logging.level = value.to_string();
        }
        "logging.json" => {
            config.logging.json = value
                .parse::<bool>()
                .context("Expected true or false")?;
        }

        _ => {
            anyhow::bail!("Unknown configuration key: '{}'", key);
        }
    }

    Ok(())
}

fn parse_points(value: &str) -> Result<u8> {
    value
        .parse::<u8>()
        .context("Expected an integer between 0 and 100")
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}
