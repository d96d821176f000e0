//! Enrichment pipeline
//!
//! One batch:
//!
//! 1. Select up to `batch_size` pending invoices after the cursor row id
//! 2. Pre-filter: misses get an empty keyword list, no model call
//! 3. Split hits into sub-batches; run up to `concurrency` sub-batches at
//!    once, pausing `group_delay` between groups
//! 4. Parse each answer positionally; a failed call or unparseable
//!    answer leaves that sub-batch pending
//! 5. Write all results in one store call
//!
//! Keyset pagination on the row id means rows enriched (or skipped) in
//! this batch can never shift the next batch's window.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use ledgersync_core::config::EnrichmentConfig;
use ledgersync_core::domain::{Enrichment, PendingInvoice};
use ledgersync_core::ports::IRecordStore;

use crate::openai::{ILanguageModel, TokenCounts};
use crate::prefilter::Prefilter;
use crate::prompt::{parse_response, user_message, SYSTEM_PROMPT};
use crate::EnrichError;

// ============================================================================
// Results
// ============================================================================

/// Token usage and its derived dollar cost
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost_usd: f64,
}

impl TokenUsage {
    pub fn add(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.cost_usd += other.cost_usd;
    }
}

/// Result of one enrichment batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichResult {
    /// Invoices selected
    pub processed: u64,
    /// Rows written back
    pub updated: u64,
    /// Invoices written with empty keywords by the pre-filter
    pub prefiltered: u64,
    /// Model calls made
    pub llm_calls: u64,
    /// Sub-batches whose call or answer failed
    pub failed_sub_batches: u64,
    pub has_more: bool,
    /// Row id to pass as the cursor of the next batch
    pub next_cursor: i64,
    pub token_usage: TokenUsage,
}

/// Aggregate of several batches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichRunSummary {
    pub batches: u32,
    pub processed: u64,
    pub updated: u64,
    pub prefiltered: u64,
    pub failed_sub_batches: u64,
    pub has_more: bool,
    pub next_cursor: i64,
    pub token_usage: TokenUsage,
}

impl EnrichRunSummary {
    fn absorb(&mut self, batch: &EnrichResult) {
        self.batches += 1;
        self.processed += batch.processed;
        self.updated += batch.updated;
        self.prefiltered += batch.prefiltered;
        self.failed_sub_batches += batch.failed_sub_batches;
        self.has_more = batch.has_more;
        self.next_cursor = batch.next_cursor;
        self.token_usage.add(&batch.token_usage);
    }
}

/// Outcome of one sub-batch call
struct SubBatchOutcome {
    updates: Vec<(i64, Enrichment)>,
    usage: TokenCounts,
    failed: bool,
}

// ============================================================================
// EnrichmentPipeline
// ============================================================================

pub struct EnrichmentPipeline {
    store: Arc<dyn IRecordStore>,
    model: Arc<dyn ILanguageModel>,
    prefilter: Prefilter,
    batch_size: u32,
    sub_batch_size: usize,
    concurrency: usize,
    group_delay: Duration,
    min_description_length: u32,
    input_cost_per_1k: f64,
    output_cost_per_1k: f64,
}

impl EnrichmentPipeline {
    pub fn new(
        store: Arc<dyn IRecordStore>,
        model: Arc<dyn ILanguageModel>,
        config: &EnrichmentConfig,
    ) -> Self {
        Self {
            store,
            model,
            prefilter: Prefilter::new(&config.prefilter_vocabulary),
            batch_size: config.batch_size.max(1),
            sub_batch_size: config.sub_batch_size.max(1) as usize,
            concurrency: config.concurrency.max(1) as usize,
            group_delay: Duration::from_millis(config.group_delay_ms),
            min_description_length: config.min_description_length,
            input_cost_per_1k: config.input_cost_per_1k,
            output_cost_per_1k: config.output_cost_per_1k,
        }
    }

    /// Dollar cost of `counts` at the configured rates
    pub fn cost(&self, counts: TokenCounts) -> TokenUsage {
        TokenUsage {
            prompt_tokens: counts.prompt_tokens,
            completion_tokens: counts.completion_tokens,
            cost_usd: counts.prompt_tokens as f64 / 1000.0 * self.input_cost_per_1k
                + counts.completion_tokens as f64 / 1000.0 * self.output_cost_per_1k,
        }
    }

    /// Invoices currently awaiting enrichment
    pub async fn pending_count(&self) -> Result<u64, EnrichError> {
        self.store
            .count_pending_enrichment(self.min_description_length)
            .await
            .map_err(EnrichError::Store)
    }

    /// Enriches the next batch of pending invoices after row `cursor`
    ///
    /// `batch_size` overrides the configured batch size.
    #[tracing::instrument(skip(self))]
    pub async fn enrich_batch(
        &self,
        cursor: i64,
        batch_size: Option<u32>,
    ) -> Result<EnrichResult, EnrichError> {
        let limit = batch_size.unwrap_or(self.batch_size).max(1);
        let records = self
            .store
            .select_pending_enrichment(cursor, limit, self.min_description_length)
            .await
            .map_err(EnrichError::Store)?;

        let mut result = EnrichResult {
            processed: records.len() as u64,
            has_more: records.len() as u32 == limit,
            next_cursor: records.last().map_or(cursor, |r| r.row_id),
            ..EnrichResult::default()
        };
        if records.is_empty() {
            debug!(cursor, "No pending invoices");
            return Ok(result);
        }

        let (candidates, misses): (Vec<PendingInvoice>, Vec<PendingInvoice>) = records
            .into_iter()
            .partition(|r| self.prefilter.matches(&r.content()));

        // Misses keep whatever description they already had
        let mut updates: Vec<(i64, Enrichment)> = misses
            .iter()
            .map(|r| {
                (
                    r.row_id,
                    Enrichment::new(r.work_description.clone(), Vec::<String>::new()),
                )
            })
            .collect();
        result.prefiltered = misses.len() as u64;

        let sub_batches: Vec<&[PendingInvoice]> = candidates.chunks(self.sub_batch_size).collect();
        let mut usage = TokenCounts::default();
        for (i, group) in sub_batches.chunks(self.concurrency).enumerate() {
            if i > 0 && !self.group_delay.is_zero() {
                tokio::time::sleep(self.group_delay).await;
            }
            let outcomes = join_all(group.iter().map(|records| self.run_sub_batch(records))).await;
            for outcome in outcomes {
                result.llm_calls += 1;
                usage.prompt_tokens += outcome.usage.prompt_tokens;
                usage.completion_tokens += outcome.usage.completion_tokens;
                if outcome.failed {
                    result.failed_sub_batches += 1;
                }
                updates.extend(outcome.updates);
            }
        }
        result.token_usage = self.cost(usage);

        result.updated = self
            .store
            .apply_enrichment(&updates)
            .await
            .map_err(EnrichError::Store)?;

        info!(
            processed = result.processed,
            updated = result.updated,
            prefiltered = result.prefiltered,
            llm_calls = result.llm_calls,
            failed = result.failed_sub_batches,
            cost_usd = result.token_usage.cost_usd,
            next_cursor = result.next_cursor,
            "Enrichment batch complete"
        );
        Ok(result)
    }

    async fn run_sub_batch(&self, records: &[PendingInvoice]) -> SubBatchOutcome {
        let first = records.first().map_or(0, |r| r.row_id);
        let completion = match self.model.complete(SYSTEM_PROMPT, &user_message(records)).await {
            Ok(completion) => completion,
            Err(e) => {
                warn!(first_row = first, size = records.len(), error = %e, "Model call failed, sub-batch left pending");
                return SubBatchOutcome {
                    updates: Vec::new(),
                    usage: TokenCounts::default(),
                    failed: true,
                };
            }
        };

        match parse_response(&completion.content, records.len()) {
            Ok(slots) => SubBatchOutcome {
                updates: records
                    .iter()
                    .zip(slots)
                    .filter_map(|(record, slot)| slot.map(|e| (record.row_id, e)))
                    .collect(),
                usage: completion.usage,
                failed: false,
            },
            Err(e) => {
                warn!(first_row = first, size = records.len(), error = %e, "Unparseable model answer, sub-batch left pending");
                SubBatchOutcome {
                    updates: Vec::new(),
                    usage: completion.usage,
                    failed: true,
                }
            }
        }
    }

    /// Runs batches from `cursor` until nothing is left or `max_batches`
    /// batches have run
    pub async fn run(
        &self,
        cursor: i64,
        batch_size: Option<u32>,
        max_batches: Option<u32>,
    ) -> Result<EnrichRunSummary, EnrichError> {
        let mut summary = EnrichRunSummary {
            next_cursor: cursor,
            ..EnrichRunSummary::default()
        };
        loop {
            if max_batches.is_some_and(|max| summary.batches >= max) {
                break;
            }
            let batch = self.enrich_batch(summary.next_cursor, batch_size).await?;
            summary.absorb(&batch);
            if !batch.has_more {
                break;
            }
        }
        Ok(summary)
    }
}
