//! Enrich command - Generate work descriptions for synced invoices

use anyhow::Result;
use clap::Args;

use ledgersync_core::config::Config;
use ledgersync_enrich::EnrichRunSummary;

use crate::context::CliContext;
use crate::output::{get_formatter, to_json, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct EnrichCommand {
    /// Invoices selected per batch
    #[arg(long, value_name = "N")]
    pub batch_size: Option<u32>,

    /// Stop after this many batches
    #[arg(long, value_name = "N")]
    pub max_batches: Option<u32>,

    /// Row id to continue after
    #[arg(long, value_name = "ROW_ID", default_value_t = 0)]
    pub cursor: i64,
}

impl EnrichCommand {
    pub async fn execute(&self, config: Config, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format);
        let ctx = CliContext::open(config).await?;
        let pipeline = ctx.pipeline()?;

        let pending = pipeline.pending_count().await?;
        fmt.info(&format!("{pending} invoice(s) awaiting enrichment"));

        let result = pipeline
            .run(self.cursor, self.batch_size, self.max_batches)
            .await;
        ctx.close().await;
        let summary = result?;

        if format.is_json() {
            fmt.print_json(&to_json(&summary)?);
        } else {
            print_summary(&*fmt, &summary);
        }
        Ok(())
    }
}

fn print_summary(fmt: &dyn OutputFormatter, summary: &EnrichRunSummary) {
    fmt.success(&format!(
        "Enriched {} of {} invoice(s) in {} batch(es)",
        summary.updated, summary.processed, summary.batches
    ));
    fmt.field("Skipped by pre-filter", &summary.prefiltered.to_string());
    if summary.failed_sub_batches > 0 {
        fmt.warn(&format!(
            "{} sub-batch(es) failed and stay pending",
            summary.failed_sub_batches
        ));
    }
    fmt.field(
        "Tokens",
        &format!(
            "{} in / {} out",
            summary.token_usage.prompt_tokens, summary.token_usage.completion_tokens
        ),
    );
    fmt.field("Cost", &format!("${:.4}", summary.token_usage.cost_usd));
    if summary.has_more {
        fmt.info(&format!(
            "More invoices remain; continue with --cursor {}",
            summary.next_cursor
        ));
    }
}
