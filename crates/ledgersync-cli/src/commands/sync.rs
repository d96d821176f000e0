//! Sync command - Drive chunked sync until every entity is exhausted
//!
//! Each chunk is bounded by the per-entity page limits; the driver keeps
//! invoking chunks from the returned cursors until nothing is left, the
//! run stalls, or Ctrl+C cancels it between chunks.

use anyhow::{bail, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use ledgersync_core::config::Config;
use ledgersync_core::domain::EntityKind;
use ledgersync_sync::{DriverOptions, DriverOutcome, DriverSummary, SyncDriver};

use crate::context::CliContext;
use crate::output::{get_formatter, to_json, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Continue from the stored cursors instead of page 1
    #[arg(long)]
    pub resume: bool,

    /// Customer pages per chunk
    #[arg(long, value_name = "N")]
    pub max_customer_pages: Option<u32>,

    /// Invoice pages per chunk
    #[arg(long, value_name = "N")]
    pub max_invoice_pages: Option<u32>,

    /// Bank transaction pages per chunk
    #[arg(long, value_name = "N")]
    pub max_bank_transaction_pages: Option<u32>,

    /// Records per page requested from Xero
    #[arg(long, value_name = "N")]
    pub page_size: Option<u32>,
}

impl SyncCommand {
    fn options(&self) -> DriverOptions {
        DriverOptions {
            resume: self.resume,
            max_customer_pages: self.max_customer_pages,
            max_invoice_pages: self.max_invoice_pages,
            max_bank_transaction_pages: self.max_bank_transaction_pages,
            page_size: self.page_size,
        }
    }

    pub async fn execute(&self, config: Config, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format);
        let ctx = CliContext::open(config).await?;
        let mut driver = SyncDriver::new(ctx.orchestrator()?);

        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl+C received, stopping after the current chunk");
                on_signal.cancel();
            }
        });

        fmt.info("Syncing from Xero...");
        let summary = driver.run(&self.options(), &cancel).await;
        ctx.close().await;

        if format.is_json() {
            fmt.print_json(&to_json(&summary)?);
        } else {
            print_summary(&*fmt, &summary);
        }

        match &summary.outcome {
            DriverOutcome::Failed { message, .. } => bail!("Sync failed: {message}"),
            _ => Ok(()),
        }
    }
}

fn print_summary(fmt: &dyn OutputFormatter, summary: &DriverSummary) {
    for line in &summary.progress {
        fmt.info(line);
    }
    for error in &summary.errors {
        fmt.warn(error);
    }

    match &summary.outcome {
        DriverOutcome::Completed => fmt.success(&format!(
            "Sync complete: {} records in {} chunk(s)",
            summary.totals.total(),
            summary.invocations
        )),
        DriverOutcome::Cancelled => {
            fmt.warn("Sync cancelled; run 'ledgersync sync --resume' to continue")
        }
        DriverOutcome::Stalled => fmt.warn(if summary.rate_limited {
            "Xero is rate limiting; run 'ledgersync sync --resume' later"
        } else {
            "Sync made no progress; run 'ledgersync sync --resume' later"
        }),
        DriverOutcome::Failed {
            message,
            reconnect_required,
        } => {
            fmt.error(message);
            if *reconnect_required {
                fmt.info("Run 'ledgersync auth login' to reconnect");
            }
        }
    }

    for kind in EntityKind::ALL {
        fmt.field(&kind.to_string(), &summary.totals.get(kind).to_string());
    }
    fmt.field("Duration", &format!("{} ms", summary.duration_ms));
}
