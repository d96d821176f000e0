//! Chunk orchestrator - one bounded sync invocation
//!
//! A chunk walks the entity kinds in [`EntityKind::ALL`] order. For each
//! kind it fetches pages starting at the requested (or stored) cursor,
//! upserts every page, and stops when a page comes back empty, when the
//! per-kind page bound is reached, or when the fetch fails softly.
//!
//! ## Outcomes per entity
//!
//! | Stop reason          | `hasMore` | next page        |
//! |----------------------|-----------|------------------|
//! | empty page           | false     | `null`           |
//! | page bound reached   | true      | last page + 1    |
//! | rate limited / error | true      | the failed page  |
//! | `maxPages == 0`      | false     | `null` (skipped) |
//!
//! Unauthorized responses and store failures abort the whole chunk.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use ledgersync_core::config::SyncConfig;
use ledgersync_core::domain::{AccessGrant, EntityKind, SyncCursor, UserId};
use ledgersync_core::ports::{IAccountingProvider, IRecordStore};
use ledgersync_core::usecases::{TokenError, TokenLifecycle};

use crate::SyncError;

// ============================================================================
// Request / response
// ============================================================================

/// Body of one chunk invocation
///
/// Every field is optional. Credentials default to the stored
/// connection; start pages default to the stored cursors; page bounds
/// default to the configured limits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkRequest {
    pub access_token: Option<String>,
    pub tenant_id: Option<String>,
    pub start_customer_page: Option<u32>,
    pub start_invoice_page: Option<u32>,
    pub start_bank_transaction_page: Option<u32>,
    pub max_customer_pages: Option<u32>,
    pub max_invoice_pages: Option<u32>,
    pub max_bank_transaction_pages: Option<u32>,
    pub page_size: Option<u32>,
}

impl ChunkRequest {
    pub fn start_page(&self, kind: EntityKind) -> Option<u32> {
        match kind {
            EntityKind::Customers => self.start_customer_page,
            EntityKind::Invoices => self.start_invoice_page,
            EntityKind::BankTransactions => self.start_bank_transaction_page,
        }
    }

    pub fn set_start_page(&mut self, kind: EntityKind, page: Option<u32>) {
        match kind {
            EntityKind::Customers => self.start_customer_page = page,
            EntityKind::Invoices => self.start_invoice_page = page,
            EntityKind::BankTransactions => self.start_bank_transaction_page = page,
        }
    }

    pub fn max_pages(&self, kind: EntityKind) -> Option<u32> {
        match kind {
            EntityKind::Customers => self.max_customer_pages,
            EntityKind::Invoices => self.max_invoice_pages,
            EntityKind::BankTransactions => self.max_bank_transaction_pages,
        }
    }

    pub fn set_max_pages(&mut self, kind: EntityKind, max: Option<u32>) {
        match kind {
            EntityKind::Customers => self.max_customer_pages = max,
            EntityKind::Invoices => self.max_invoice_pages = max,
            EntityKind::BankTransactions => self.max_bank_transaction_pages = max,
        }
    }

    /// Credentials supplied inline, when both halves are present
    fn inline_grant(&self) -> Option<AccessGrant> {
        let access_token = self.access_token.as_deref()?.trim();
        let tenant_id = self.tenant_id.as_deref()?.trim();
        if access_token.is_empty() || tenant_id.is_empty() {
            return None;
        }
        Some(AccessGrant {
            access_token: access_token.to_string(),
            tenant_id: tenant_id.to_string(),
        })
    }
}

/// A soft failure that stopped one entity kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityError {
    pub entity: EntityKind,
    pub page: u32,
    pub message: String,
}

/// Result of one chunk invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkResponse {
    pub progress: Vec<String>,
    pub total_customers: u64,
    pub total_invoices: u64,
    pub total_bank_transactions: u64,
    /// True while any entity kind has pages left
    pub has_more: bool,
    /// Next customer page
    pub next_start_page: Option<u32>,
    pub next_invoice_page: Option<u32>,
    pub next_bank_transaction_page: Option<u32>,
    pub success: bool,
    /// Some entity stopped because the API kept answering 429
    pub rate_limited: bool,
    pub errors: Vec<EntityError>,
}

impl ChunkResponse {
    pub fn written(&self, kind: EntityKind) -> u64 {
        match kind {
            EntityKind::Customers => self.total_customers,
            EntityKind::Invoices => self.total_invoices,
            EntityKind::BankTransactions => self.total_bank_transactions,
        }
    }

    pub fn next_page(&self, kind: EntityKind) -> Option<u32> {
        match kind {
            EntityKind::Customers => self.next_start_page,
            EntityKind::Invoices => self.next_invoice_page,
            EntityKind::BankTransactions => self.next_bank_transaction_page,
        }
    }

    pub fn total_written(&self) -> u64 {
        self.total_customers + self.total_invoices + self.total_bank_transactions
    }

    fn record(&mut self, outcome: &EntityOutcome) {
        match outcome.entity {
            EntityKind::Customers => {
                self.total_customers = outcome.written;
                self.next_start_page = outcome.next_page;
            }
            EntityKind::Invoices => {
                self.total_invoices = outcome.written;
                self.next_invoice_page = outcome.next_page;
            }
            EntityKind::BankTransactions => {
                self.total_bank_transactions = outcome.written;
                self.next_bank_transaction_page = outcome.next_page;
            }
        }
        self.has_more |= outcome.has_more;
        self.rate_limited |= outcome.rate_limited;
        if let Some(error) = &outcome.error {
            self.errors.push(error.clone());
        }
    }
}

/// What happened to one entity kind within a chunk
#[derive(Debug)]
struct EntityOutcome {
    entity: EntityKind,
    written: u64,
    next_page: Option<u32>,
    has_more: bool,
    rate_limited: bool,
    error: Option<EntityError>,
}

impl EntityOutcome {
    fn skipped(entity: EntityKind) -> Self {
        Self {
            entity,
            written: 0,
            next_page: None,
            has_more: false,
            rate_limited: false,
            error: None,
        }
    }
}

// ============================================================================
// ChunkOrchestrator
// ============================================================================

/// Runs chunk invocations against a provider and a record store
pub struct ChunkOrchestrator {
    provider: Arc<dyn IAccountingProvider>,
    store: Arc<dyn IRecordStore>,
    tokens: Arc<TokenLifecycle>,
    page_size: u32,
    page_delay: Duration,
    max_customer_pages: u32,
    max_invoice_pages: u32,
    max_bank_transaction_pages: u32,
}

impl ChunkOrchestrator {
    /// Creates an orchestrator with page limits taken from `config`
    pub fn new(
        provider: Arc<dyn IAccountingProvider>,
        store: Arc<dyn IRecordStore>,
        tokens: Arc<TokenLifecycle>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            provider,
            store,
            tokens,
            page_size: config.page_size.max(1),
            page_delay: Duration::from_millis(config.page_delay_ms),
            max_customer_pages: config.max_customer_pages,
            max_invoice_pages: config.max_invoice_pages,
            max_bank_transaction_pages: config.max_bank_transaction_pages,
        }
    }

    pub fn user_id(&self) -> &UserId {
        self.tokens.user_id()
    }

    fn default_max_pages(&self, kind: EntityKind) -> u32 {
        match kind {
            EntityKind::Customers => self.max_customer_pages,
            EntityKind::Invoices => self.max_invoice_pages,
            EntityKind::BankTransactions => self.max_bank_transaction_pages,
        }
    }

    /// Runs one chunk invocation
    ///
    /// # Errors
    /// - [`SyncError::NotConnected`] when no usable connection is stored
    /// - [`SyncError::ReconnectRequired`] when a refresh or fetch is rejected
    /// - [`SyncError::InvalidRequest`] when a start page leaves no room to advance
    /// - [`SyncError::Store`] when writing records or cursors fails
    #[tracing::instrument(skip_all, fields(user = %self.user_id()))]
    pub async fn run_chunk(&self, request: &ChunkRequest) -> Result<ChunkResponse, SyncError> {
        if let Some(kind) = EntityKind::ALL
            .into_iter()
            .find(|&kind| request.start_page(kind) == Some(u32::MAX))
        {
            return Err(SyncError::InvalidRequest(format!(
                "{kind}: start page must be below {}",
                u32::MAX
            )));
        }
        let grant = self.resolve_grant(request).await?;
        let page_size = request.page_size.unwrap_or(self.page_size).max(1);

        let mut response = ChunkResponse::default();
        for kind in EntityKind::ALL {
            let max_pages = request
                .max_pages(kind)
                .unwrap_or_else(|| self.default_max_pages(kind));

            let outcome = if max_pages == 0 {
                debug!(entity = %kind, "Entity skipped for this chunk");
                response.progress.push(format!("{kind}: skipped"));
                EntityOutcome::skipped(kind)
            } else {
                self.sync_entity(
                    &grant,
                    kind,
                    request.start_page(kind),
                    max_pages,
                    page_size,
                    &mut response.progress,
                )
                .await?
            };
            response.record(&outcome);
        }
        response.success = true;

        info!(
            customers = response.total_customers,
            invoices = response.total_invoices,
            bank_transactions = response.total_bank_transactions,
            has_more = response.has_more,
            rate_limited = response.rate_limited,
            "Chunk complete"
        );
        Ok(response)
    }

    async fn resolve_grant(&self, request: &ChunkRequest) -> Result<AccessGrant, SyncError> {
        if let Some(grant) = request.inline_grant() {
            return Ok(grant);
        }
        match self.tokens.get_valid_access_token().await {
            Ok(Some(grant)) => Ok(grant),
            Ok(None) => Err(SyncError::NotConnected),
            Err(TokenError::RefreshFailed(e)) => Err(SyncError::ReconnectRequired(e.to_string())),
            Err(TokenError::Store(e)) => Err(SyncError::Store(e)),
        }
    }

    /// Initial cursor for `kind`
    ///
    /// An explicit start page wins over the stored cursor. The stored
    /// `written` total is kept only when continuing from where it stopped.
    async fn starting_cursor(
        &self,
        kind: EntityKind,
        requested: Option<u32>,
    ) -> Result<SyncCursor, SyncError> {
        let stored = self
            .store
            .load_cursor(self.user_id(), kind)
            .await
            .map_err(SyncError::Store)?;

        let start = requested
            .map(|p| p.max(1))
            .or_else(|| stored.as_ref().map(SyncCursor::resume_page))
            .unwrap_or(1);

        Ok(match stored {
            Some(cursor) if cursor.has_more && cursor.resume_page() == start => cursor,
            _ => {
                let mut cursor = SyncCursor::start(kind);
                cursor.next_page = Some(start);
                cursor
            }
        })
    }

    async fn save_cursor(&self, cursor: &SyncCursor) -> Result<(), SyncError> {
        self.store
            .save_cursor(self.user_id(), cursor)
            .await
            .map_err(SyncError::Store)
    }

    async fn sync_entity(
        &self,
        grant: &AccessGrant,
        kind: EntityKind,
        requested_start: Option<u32>,
        max_pages: u32,
        page_size: u32,
        progress: &mut Vec<String>,
    ) -> Result<EntityOutcome, SyncError> {
        let mut cursor = self.starting_cursor(kind, requested_start).await?;
        let mut page = cursor.resume_page();
        let mut outcome = EntityOutcome {
            entity: kind,
            written: 0,
            next_page: Some(page),
            has_more: true,
            rate_limited: false,
            error: None,
        };

        info!(entity = %kind, start_page = page, max_pages, "Syncing entity");

        for fetched_pages in 0..max_pages {
            if fetched_pages > 0 && !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }
            let Some(following) = page.checked_add(1) else {
                return Err(SyncError::InvalidRequest(format!(
                    "{kind}: page {page} is past the last page number"
                )));
            };

            let fetched = match self.provider.fetch_page(grant, kind, page, page_size).await {
                Ok(fetched) => fetched,
                Err(e) if e.requires_reconnect() => {
                    warn!(entity = %kind, page, error = %e, "Fetch rejected");
                    self.save_cursor(&cursor).await?;
                    return Err(SyncError::ReconnectRequired(e.to_string()));
                }
                Err(e) => {
                    warn!(entity = %kind, page, error = %e, "Fetch failed, stopping entity");
                    outcome.rate_limited = e.is_rate_limited();
                    progress.push(if outcome.rate_limited {
                        format!("{kind}: rate limited on page {page}, try later")
                    } else {
                        format!("{kind}: page {page} failed: {e}")
                    });
                    outcome.error = Some(EntityError {
                        entity: kind,
                        page,
                        message: e.to_string(),
                    });
                    break;
                }
            };

            if fetched.is_exhausted() {
                cursor.finish();
                outcome.next_page = None;
                outcome.has_more = false;
                progress.push(format!("{kind}: done, {} written", outcome.written));
                break;
            }

            let written = self
                .store
                .upsert_batch(&fetched.records)
                .await
                .map_err(SyncError::Store)?;

            cursor
                .advance(page, written)
                .map_err(|e| SyncError::InvalidRequest(e.to_string()))?;
            self.save_cursor(&cursor).await?;

            outcome.written += written;
            debug!(
                entity = %kind,
                page,
                written,
                skipped = fetched.skipped(),
                "Page written"
            );
            progress.push(format!("{kind}: page {page} wrote {written} records"));

            page = following;
            outcome.next_page = Some(page);
        }

        if outcome.has_more && outcome.error.is_none() {
            progress.push(format!("{kind}: continuing from page {page}"));
        }
        self.save_cursor(&cursor).await?;
        Ok(outcome)
    }
}
