//! Status command - Row counts, pending enrichment and sync cursors

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use ledgersync_core::config::Config;
use ledgersync_core::domain::SyncCursor;
use ledgersync_core::ports::{IRecordStore, RecordCounts};
use ledgersync_core::usecases::ConnectionStatus;

use crate::context::CliContext;
use crate::output::{get_formatter, to_json, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct StatusCommand {}

/// Everything `status` reports
#[derive(Debug, Serialize)]
struct StatusReport {
    user: String,
    connected: bool,
    tenant_id: Option<String>,
    database: String,
    counts: RecordCounts,
    pending_enrichment: u64,
    cursors: Vec<SyncCursor>,
}

impl StatusCommand {
    pub async fn execute(&self, config: Config, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format);
        let ctx = CliContext::open(config).await?;
        let report = gather(&ctx).await;
        ctx.close().await;
        let report = report?;

        if format.is_json() {
            fmt.print_json(&to_json(&report)?);
        } else {
            print_report(&*fmt, &report);
        }
        Ok(())
    }
}

async fn gather(ctx: &CliContext) -> Result<StatusReport> {
    let tokens = ctx.stored_tokens()?;
    let (connected, tenant_id) = match tokens.status().await? {
        ConnectionStatus::NotConnected => (false, None),
        ConnectionStatus::Expired { tenant_id } => (false, Some(tenant_id)),
        ConnectionStatus::Connected { tenant_id, .. } => (true, Some(tenant_id)),
    };

    let store = &ctx.store;
    let counts = store.counts().await.context("Failed to count records")?;
    let pending_enrichment = store
        .count_pending_enrichment(ctx.config.enrichment.min_description_length)
        .await
        .context("Failed to count pending invoices")?;
    let cursors = store
        .load_cursors(tokens.user_id())
        .await
        .context("Failed to read cursors")?;

    Ok(StatusReport {
        user: tokens.user_id().to_string(),
        connected,
        tenant_id,
        database: ctx.config.database.path.display().to_string(),
        counts,
        pending_enrichment,
        cursors,
    })
}

fn describe_cursor(cursor: &SyncCursor) -> String {
    match cursor.next_page {
        _ if cursor.is_finished() => format!("complete ({} written)", cursor.written),
        Some(page) => format!("next page {page} ({} written)", cursor.written),
        None => format!("not started ({} written)", cursor.written),
    }
}

fn print_report(fmt: &dyn OutputFormatter, report: &StatusReport) {
    match (&report.tenant_id, report.connected) {
        (Some(tenant), true) => fmt.success(&format!("Connected to {tenant}")),
        (Some(tenant), false) => fmt.warn(&format!("Connection to {tenant} expired")),
        (None, _) => fmt.warn("Not connected"),
    }
    fmt.field("Database", &report.database);
    fmt.field("Customers", &report.counts.customers.to_string());
    fmt.field("Invoices", &report.counts.invoices.to_string());
    fmt.field("Bank transactions", &report.counts.bank_transactions.to_string());
    fmt.field("Pending enrichment", &report.pending_enrichment.to_string());

    if report.cursors.is_empty() {
        fmt.info("No sync has run yet");
    }
    for cursor in &report.cursors {
        fmt.field(&format!("Cursor {}", cursor.entity), &describe_cursor(cursor));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgersync_core::domain::EntityKind;

    #[test]
    fn test_describe_cursor() {
        let mut cursor = SyncCursor::start(EntityKind::Invoices);
        cursor.advance(1, 1000).unwrap();
        assert_eq!(describe_cursor(&cursor), "next page 2 (1000 written)");
        cursor.finish();
        assert_eq!(describe_cursor(&cursor), "complete (1000 written)");
    }
}
