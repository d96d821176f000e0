//! Sync driver - repeats chunk invocations until every entity is done
//!
//! The driver turns each [`ChunkResponse`] into the next [`ChunkRequest`]:
//! entities with a next page continue from it, finished entities are
//! skipped. The loop ends when nothing has more pages, when the
//! cancellation token fires (checked before each chunk), when a chunk
//! fails, or when a chunk makes no progress at all.
//!
//! ```text
//! start ──→ run_chunk ──→ hasMore? ──no──→ Completed
//!              ↑              │yes
//!              │        progress made? ──no──→ Stalled
//!              └──────────────┘yes
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ledgersync_core::domain::{EntityKind, RunId};
use ledgersync_core::ports::RecordCounts;

use crate::orchestrator::{ChunkOrchestrator, ChunkRequest, ChunkResponse};

// ============================================================================
// ProgressThrottle
// ============================================================================

/// Rate limiter for progress log lines
///
/// Each driver owns its own throttle, so two drivers never suppress each
/// other's output.
#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    last_emit: Option<Instant>,
    suppressed: u64,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
            suppressed: 0,
        }
    }

    /// Returns true if a line may be emitted now
    ///
    /// The first call always passes.
    pub fn should_emit(&mut self) -> bool {
        self.should_emit_at(Instant::now())
    }

    pub fn should_emit_at(&mut self, now: Instant) -> bool {
        let due = self
            .last_emit
            .map_or(true, |last| now.saturating_duration_since(last) >= self.interval);
        if due {
            self.last_emit = Some(now);
        } else {
            self.suppressed += 1;
        }
        due
    }

    /// Lines held back so far
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

// ============================================================================
// Options and summary
// ============================================================================

/// Parameters of one driver run
#[derive(Debug, Clone, Default)]
pub struct DriverOptions {
    /// Continue from stored cursors instead of page 1
    pub resume: bool,
    pub max_customer_pages: Option<u32>,
    pub max_invoice_pages: Option<u32>,
    pub max_bank_transaction_pages: Option<u32>,
    pub page_size: Option<u32>,
}

impl DriverOptions {
    fn first_request(&self) -> ChunkRequest {
        let start = if self.resume { None } else { Some(1) };
        ChunkRequest {
            start_customer_page: start,
            start_invoice_page: start,
            start_bank_transaction_page: start,
            max_customer_pages: self.max_customer_pages,
            max_invoice_pages: self.max_invoice_pages,
            max_bank_transaction_pages: self.max_bank_transaction_pages,
            page_size: self.page_size,
            ..ChunkRequest::default()
        }
    }
}

/// How a driver run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DriverOutcome {
    /// Every entity reached an empty page
    Completed,
    /// The cancellation token fired between chunks
    Cancelled,
    /// A chunk wrote nothing and moved no cursor
    Stalled,
    /// A chunk returned an error
    Failed {
        message: String,
        reconnect_required: bool,
    },
}

/// Result of a driver run
#[derive(Debug, Clone, Serialize)]
pub struct DriverSummary {
    pub run_id: RunId,
    pub invocations: u32,
    pub totals: RecordCounts,
    pub progress: Vec<String>,
    pub errors: Vec<String>,
    pub rate_limited: bool,
    pub duration_ms: u64,
    pub outcome: DriverOutcome,
}

impl DriverSummary {
    pub fn is_success(&self) -> bool {
        self.outcome == DriverOutcome::Completed
    }
}

// ============================================================================
// SyncDriver
// ============================================================================

/// In-process loop over [`ChunkOrchestrator::run_chunk`]
pub struct SyncDriver {
    orchestrator: Arc<ChunkOrchestrator>,
    throttle: ProgressThrottle,
}

impl SyncDriver {
    pub fn new(orchestrator: Arc<ChunkOrchestrator>) -> Self {
        Self {
            orchestrator,
            throttle: ProgressThrottle::default(),
        }
    }

    pub fn with_throttle(mut self, throttle: ProgressThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    /// Runs chunks until done, cancelled, stalled or failed
    #[tracing::instrument(skip_all)]
    pub async fn run(&mut self, options: &DriverOptions, cancel: &CancellationToken) -> DriverSummary {
        let started = Instant::now();
        let mut summary = DriverSummary {
            run_id: RunId::new(),
            invocations: 0,
            totals: RecordCounts::default(),
            progress: Vec::new(),
            errors: Vec::new(),
            rate_limited: false,
            duration_ms: 0,
            outcome: DriverOutcome::Completed,
        };
        info!(run_id = %summary.run_id, resume = options.resume, "Sync run starting");

        let mut request = options.first_request();
        loop {
            if cancel.is_cancelled() {
                info!(run_id = %summary.run_id, "Sync run cancelled");
                summary.outcome = DriverOutcome::Cancelled;
                break;
            }

            summary.invocations += 1;
            let response = match self.orchestrator.run_chunk(&request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(run_id = %summary.run_id, error = %e, "Chunk failed");
                    summary.errors.push(e.to_string());
                    summary.outcome = DriverOutcome::Failed {
                        message: e.to_string(),
                        reconnect_required: e.is_auth(),
                    };
                    break;
                }
            };

            self.absorb(&mut summary, &response);

            if !response.has_more {
                summary.outcome = DriverOutcome::Completed;
                break;
            }
            if is_stalled(&request, &response) {
                warn!(run_id = %summary.run_id, "Chunk made no progress, stopping");
                summary.progress.push("sync stalled: no records written and no cursor moved".to_string());
                summary.outcome = DriverOutcome::Stalled;
                break;
            }
            request = next_request(&request, &response);
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            run_id = %summary.run_id,
            invocations = summary.invocations,
            written = summary.totals.total(),
            outcome = ?summary.outcome,
            "Sync run finished"
        );
        summary
    }

    fn absorb(&mut self, summary: &mut DriverSummary, response: &ChunkResponse) {
        for kind in EntityKind::ALL {
            summary.totals.add(kind, response.written(kind));
        }
        summary.rate_limited |= response.rate_limited;
        summary
            .errors
            .extend(response.errors.iter().map(|e| format!("{}: {}", e.entity, e.message)));

        for line in &response.progress {
            if self.throttle.should_emit() {
                info!(run_id = %summary.run_id, "{line}");
            }
        }
        summary.progress.extend(response.progress.iter().cloned());
    }
}

/// Continuation request: finished entities are skipped from now on
fn next_request(previous: &ChunkRequest, response: &ChunkResponse) -> ChunkRequest {
    let mut next = previous.clone();
    for kind in EntityKind::ALL {
        match response.next_page(kind) {
            Some(page) => next.set_start_page(kind, Some(page)),
            None => {
                next.set_start_page(kind, None);
                next.set_max_pages(kind, Some(0));
            }
        }
    }
    next
}

/// True when a chunk wrote nothing and every open entity is still at the
/// page it was asked to start from
fn is_stalled(request: &ChunkRequest, response: &ChunkResponse) -> bool {
    response.total_written() == 0
        && EntityKind::ALL.iter().all(|&kind| match response.next_page(kind) {
            None => true,
            Some(page) => request.start_page(kind) == Some(page),
        })
}
