//! Report command - flag a member to the community leader
//!
//! Provides the `lendr report <USER_ID> --reason <TEXT>` CLI command.
//! The report lands in the leader's inbox, costs the target reputation
//! and sends the target a notice.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tracing::warn;

use lendr_core::{config::Config, usecases::ReportReceipt};

use super::{acting_user, parse_user_id, AppContext};
use crate::output::{emit, OutputFormat, OutputFormatter};

/// How long the process waits for the target's notice before exiting
const NOTIFY_GRACE: Duration = Duration::from_secs(15);

/// Arguments for `lendr report`
#[derive(Debug, Args)]
pub struct ReportCommand {
    /// Member being reported
    pub target: String,
    /// What happened
    #[arg(long)]
    pub reason: String,
}

impl ReportCommand {
    pub async fn execute(
        &self,
        config: &Config,
        as_user: Option<&str>,
        format: OutputFormat,
    ) -> Result<()> {
        let reporter = acting_user(as_user)?;
        let target = parse_user_id(&self.target)?;

        let ctx = AppContext::open(config).await?;
        let result = ctx
            .services
            .moderation
            .report(&reporter, &target, &self.reason)
            .await;

        if result.is_ok() && !ctx.services.drain(NOTIFY_GRACE).await {
            warn!("Exiting before the reported member's notice was sent");
        }

        emit(format, result, "Report filed", render_receipt)
    }
}

fn render_receipt(out: &dyn OutputFormatter, receipt: &ReportReceipt) {
    out.info(&format!(
        "Reported:    {} ({})",
        receipt.report.target().name,
        receipt.report.target_id()
    ));
    out.info(&format!("Reason:      {}", receipt.report.reason()));
    out.info(&format!("Sent to:     leader {}", receipt.leader_id));
    out.info(&format!(
        "Reputation:  {}/100",
        receipt.target_reputation.value()
    ));
}
