//! Clear command - Delete synced records and the sync cursors
//!
//! The stored Xero connection is kept, so the next sync starts from page 1
//! without a new login.

use anyhow::{bail, Context, Result};
use clap::Args;
use serde_json::json;
use tracing::warn;

use ledgersync_core::config::Config;
use ledgersync_core::ports::IRecordStore;

use crate::context::CliContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct ClearCommand {
    /// Confirm deletion
    #[arg(long)]
    pub yes: bool,
}

impl ClearCommand {
    pub async fn execute(&self, config: Config, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format);
        if !self.yes {
            bail!("This deletes all synced records and cursors; pass --yes to confirm");
        }

        let ctx = CliContext::open(config).await?;
        let user = ctx.stored_tokens()?.user_id().clone();
        let result = async {
            let removed = ctx
                .store
                .clear_synced_data()
                .await
                .context("Failed to clear synced records")?;
            let cursors = ctx
                .store
                .clear_cursors(&user)
                .await
                .context("Failed to clear cursors")?;
            anyhow::Ok((removed, cursors))
        }
        .await;
        ctx.close().await;
        let (removed, cursors) = result?;
        warn!(records = removed.total(), cursors, "Local data cleared");

        if format.is_json() {
            fmt.print_json(&json!({
                "success": true,
                "removed": removed,
                "cursors": cursors,
            }));
        } else {
            fmt.success(&format!(
                "Removed {} customer(s), {} invoice(s), {} bank transaction(s)",
                removed.customers, removed.invoices, removed.bank_transactions
            ));
            fmt.field("Cursors reset", &cursors.to_string());
        }
        Ok(())
    }
}
