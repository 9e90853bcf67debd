//! Audit command - View the loan log
//!
//! Provides the `lendr audit` CLI command which:
//! 1. Lists recent loans, or the loans of one user or one listing
//! 2. Folds a user's loans into totals with --summary
//! 3. Supports relative and absolute time parsing for the --since flag

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::Args;
use tracing::info;

use lendr_audit::{LedgerEntry, LoanSummary};
use lendr_core::{config::Config, domain::LoanRecord};

use super::{parse_listing_id, parse_user_id, AppContext};
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Audit command with filter arguments
#[derive(Debug, Args)]
pub struct AuditCommand {
    /// Show loans since this time (e.g., "1h", "2d", "2024-01-01")
    #[arg(long, conflicts_with_all = ["user", "listing"])]
    pub since: Option<String>,

    /// Maximum number of loans to show
    #[arg(long, default_value = "50")]
    pub limit: u32,

    /// Loans a user lent or borrowed
    #[arg(long, conflicts_with = "listing")]
    pub user: Option<String>,

    /// Loans of one listing, including returned ones
    #[arg(long)]
    pub listing: Option<String>,

    /// Totals instead of entries (requires --user)
    #[arg(long, requires = "user")]
    pub summary: bool,
}

impl AuditCommand {
    /// Execute the audit command
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let ctx = AppContext::open(config).await?;
        let ledger = &ctx.ledger;

        if let Some(ref raw) = self.user {
            let user = parse_user_id(raw)?;

            if self.summary {
                let summary = ledger.summary(&user).await?;
                if format.is_json() {
                    formatter.print_json(&serde_json::to_value(&summary)?);
                } else {
                    print_summary(formatter.as_ref(), &summary);
                }
                return Ok(());
            }

            let entries = ledger.history(&user).await?;
            info!(user = %user, count = entries.len(), "Retrieved loan history");
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "user": user,
                    "count": entries.len(),
                    "entries": entries,
                }));
            } else {
                print_history(formatter.as_ref(), &entries);
            }
            return Ok(());
        }

        if let Some(ref raw) = self.listing {
            let listing = parse_listing_id(raw)?;
            let records = ledger.listing_history(&listing).await?;
            info!(listing = %listing, count = records.len(), "Retrieved listing loans");
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "listing": listing,
                    "count": records.len(),
                    "entries": records,
                }));
            } else {
                print_records(formatter.as_ref(), &records, self.limit);
            }
            return Ok(());
        }

        let since = match &self.since {
            Some(since_str) => {
                let parsed = parse_since(since_str).with_context(|| {
                    format!(
                        "Invalid --since value: '{}'. Expected formats: '1h', '30m', '2d', '1w', '2024-01-01', '2024-01-01T12:00:00'",
                        since_str
                    )
                })?;
                info!(since = %parsed, "Filtering loans since");
                parsed
            }
            // Default: last 7 days
            None => Utc::now() - chrono::Duration::days(7),
        };

        let records = ledger.recent(since, self.limit).await?;
        info!(count = records.len(), "Retrieved recent loans");

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "since": since.to_rfc3339(),
                "limit": self.limit,
                "count": records.len(),
                "entries": records,
            }));
            return Ok(());
        }

        print_records(formatter.as_ref(), &records, self.limit);
        Ok(())
    }
}

fn print_records(formatter: &dyn OutputFormatter, records: &[LoanRecord], limit: u32) {
    if records.is_empty() {
        formatter.info("No loans found for the specified criteria.");
        return;
    }

    formatter.success(&format!("Loan Log ({} entries)", records.len()));
    formatter.info("");
    formatter.info("  Granted              Item                           Lender                               Borrower");
    formatter.info("  ------------------- ------------------------------ ------------------------------------ ------------------------------------");

    for record in records {
        formatter.info(&format!(
            "  {} {:<30} {} {}",
            record.granted_at().format("%Y-%m-%d %H:%M:%S"),
            truncate_string(record.listing_name(), 30),
            record.lender_id(),
            record.borrower_id()
        ));
    }

    if records.len() as u32 >= limit {
        formatter.info("");
        formatter.info(&format!(
            "Showing {} entries (limit). Use --limit to show more.",
            limit
        ));
    }
}

fn print_history(formatter: &dyn OutputFormatter, entries: &[LedgerEntry]) {
    if entries.is_empty() {
        formatter.info("This user has not lent or borrowed anything yet.");
        return;
    }

    formatter.success(&format!("Loan History ({} entries)", entries.len()));
    formatter.info("");
    for entry in entries {
        formatter.info(&format!(
            "  {} {:<8} {:<30} with {}",
            entry.record.granted_at().format("%Y-%m-%d %H:%M:%S"),
            entry.role.to_string(),
            truncate_string(entry.record.listing_name(), 30),
            entry.counterparty
        ));
    }
}

fn print_summary(formatter: &dyn OutputFormatter, summary: &LoanSummary) {
    formatter.success("Loan Summary");
    formatter.info(&format!("Lent:       {}", summary.lent));
    formatter.info(&format!("Borrowed:   {}", summary.borrowed));
    formatter.info(&format!("Partners:   {}", summary.partners));
    match summary.last_loan_at {
        Some(at) => formatter.info(&format!("Last loan:  {}", at.format("%Y-%m-%d %H:%M"))),
        None => formatter.info("Last loan:  never"),
    }
}

/// Parse the --since argument into a DateTime<Utc>
///
/// Supports:
/// - Relative: "1h" (1 hour ago), "30m" (30 minutes), "2d" (2 days), "1w" (1 week)
/// - Absolute date: "2024-01-01"
/// - Absolute datetime: "2024-01-01T12:00:00"
fn parse_since(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();

    if let Some(duration) = parse_relative_duration(input) {
        return Ok(Utc::now() - duration);
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let datetime = date
            .and_hms_opt(0, 0, 0)
            .context("Failed to create datetime from date")?;
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(datetime, Utc));
    }

    if let Ok(datetime) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(datetime, Utc));
    }

    anyhow::bail!(
        "Could not parse '{}' as a time. Use relative (1h, 30m, 2d, 1w) or absolute (2024-01-01) format.",
        input
    )
}

/// Parse relative duration strings like "1h", "30m", "2d", "1w"
fn parse_relative_duration(input: &str) -> Option<chrono::Duration> {
    if input.len() < 2 {
        return None;
    }

    let (num_str, unit) = input.split_at(input.len() - 1);
    let num: i64 = num_str.parse().ok()?;

    match unit {
        "m" => Some(chrono::Duration::minutes(num)),
        "h" => Some(chrono::Duration::hours(num)),
        "d" => Some(chrono::Duration::days(num)),
        "w" => Some(chrono::Duration::weeks(num)),
        _ => None,
    }
}

/// Truncate a string to at most `max_chars` characters
fn truncate_string(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
