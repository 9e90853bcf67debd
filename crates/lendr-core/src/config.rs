//! Configuration module for Lendr.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Lendr.
///
/// Every section is optional in the YAML file; missing sections take their
/// defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub reputation: ReputationConfig,
    pub identity: IdentityConfig,
    pub notify: NotifyConfig,
    pub uploads: UploadsConfig,
    pub logging: LoggingConfig,
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,
    /// Upper bound for a single store call, in milliseconds.
    pub timeout_ms: u64,
    /// Maximum pooled connections.
    pub max_connections: u32,
}

/// Reputation scoring settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReputationConfig {
    /// Score assigned on registration (0-100).
    pub initial: u8,
    /// Added to the borrower's score on return.
    pub return_reward: u8,
    /// Subtracted from the target's score on report.
    pub report_penalty: u8,
}

/// Credential hashing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// bcrypt work factor (4-31).
    pub bcrypt_cost: u32,
}

/// Outbound notification settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// SMTP relay. `None` logs notifications instead of sending them.
    pub smtp: Option<SmtpConfig>,
}

/// SMTP relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Sender address.
    pub from_address: String,
    /// Sender display name.
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

/// Where uploaded photos go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadMode {
    /// Write files under `uploads.local_dir`.
    Local,
    /// POST to an HTTP image host at `uploads.endpoint`.
    Http,
}

/// Photo upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadsConfig {
    pub mode: UploadMode,
    /// Directory for `local` mode.
    pub local_dir: PathBuf,
    /// Upload URL for `http` mode.
    pub endpoint: Option<String>,
    /// Unsigned upload preset sent with each `http` upload.
    pub upload_preset: Option<String>,
    /// Largest accepted photo, in KiB.
    pub max_size_kb: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_name() -> String {
    "Lendr".to_string()
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/lendr/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("lendr")
            .join("config.yaml")
    }
}

impl StoreConfig {
    /// Store call timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("lendr")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: data_dir().join("lendr.db"),
            timeout_ms: 5_000,
            max_connections: 5,
        }
    }
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            initial: 50,
            return_reward: 1,
            report_penalty: 10,
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self { bcrypt_cost: 10 }
    }
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            mode: UploadMode::Local,
            local_dir: data_dir().join("photos"),
            endpoint: None,
            upload_preset: None,
            max_size_kb: 5 * 1024,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"store.timeout_ms"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// bcrypt accepts work factors in this range.
const BCRYPT_COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: String| {
            errors.push(ValidationError {
                field: field.into(),
                message,
            })
        };

        // --- store ---
        if self.store.timeout_ms == 0 {
            push("store.timeout_ms", "must be greater than 0".into());
        }
        if self.store.max_connections == 0 {
            push("store.max_connections", "must be greater than 0".into());
        }

        // --- reputation ---
        if self.reputation.initial > 100 {
            push(
                "reputation.initial",
                format!("must be between 0 and 100, got {}", self.reputation.initial),
            );
        }
        if self.reputation.return_reward > 100 {
            push("reputation.return_reward", "must not exceed 100".into());
        }
        if self.reputation.report_penalty > 100 {
            push("reputation.report_penalty", "must not exceed 100".into());
        }

        // --- identity ---
        if !BCRYPT_COST_RANGE.contains(&self.identity.bcrypt_cost) {
            push(
                "identity.bcrypt_cost",
                format!(
                    "must be between {} and {}, got {}",
                    BCRYPT_COST_RANGE.start(),
                    BCRYPT_COST_RANGE.end(),
                    self.identity.bcrypt_cost
                ),
            );
        }

        // --- notify ---
        if let Some(ref smtp) = self.notify.smtp {
            if smtp.host.trim().is_empty() {
                push("notify.smtp.host", "must not be empty".into());
            }
            if !smtp.from_address.contains('@') {
                push(
                    "notify.smtp.from_address",
                    format!("not an email address: {}", smtp.from_address),
                );
            }
            if smtp.username.is_some() != smtp.password.is_some() {
                push(
                    "notify.smtp.password",
                    "username and password must be set together".into(),
                );
            }
        }

        // --- uploads ---
        if self.uploads.mode == UploadMode::Http {
            match self.uploads.endpoint.as_deref() {
                None | Some("") => {
                    push("uploads.endpoint", "required when mode is http".into());
                }
                Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                    push("uploads.endpoint", format!("not an http(s) URL: {url}"));
                }
                Some(_) => {}
            }
        }
        if self.uploads.max_size_kb == 0 {
            push("uploads.max_size_kb", "must be greater than 0".into());
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            push(
                "logging.level",
                format!(
                    "invalid level '{}', expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            );
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Config`], starting from defaults.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a builder pre-filled with default values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- store ---

    pub fn database_path(mut self, path: PathBuf) -> Self {
        self.config.store.database_path = path;
        self
    }

    pub fn store_timeout_ms(mut self, ms: u64) -> Self {
        self.config.store.timeout_ms = ms;
        self
    }

    pub fn store_max_connections(mut self, n: u32) -> Self {
        self.config.store.max_connections = n;
        self
    }

    // --- reputation ---

    pub fn initial_reputation(mut self, score: u8) -> Self {
        self.config.reputation.initial = score;
        self
    }

    pub fn return_reward(mut self, points: u8) -> Self {
        self.config.reputation.return_reward = points;
        self
    }

    pub fn report_penalty(mut self, points: u8) -> Self {
        self.config.reputation.report_penalty = points;
        self
    }

    // --- identity ---

    pub fn bcrypt_cost(mut self, cost: u32) -> Self {
        self.config.identity.bcrypt_cost = cost;
        self
    }

    // --- notify ---

    pub fn smtp(mut self, smtp: SmtpConfig) -> Self {
        self.config.notify.smtp = Some(smtp);
        self
    }

    // --- uploads ---

    pub fn uploads_local(mut self, dir: PathBuf) -> Self {
        self.config.uploads.mode = UploadMode::Local;
        self.config.uploads.local_dir = dir;
        self
    }

    pub fn uploads_http(mut self, endpoint: impl Into<String>, preset: Option<String>) -> Self {
        self.config.uploads.mode = UploadMode::Http;
        self.config.uploads.endpoint = Some(endpoint.into());
        self.config.uploads.upload_preset = preset;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
