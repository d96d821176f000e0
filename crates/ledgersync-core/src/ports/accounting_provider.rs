//! Accounting provider ports (driven/secondary ports)
//!
//! This module defines the interfaces for reading records from the
//! upstream accounting system and for exchanging refresh tokens with its
//! identity service. The primary implementation targets Xero.
//!
//! ## Design Notes
//!
//! - Unlike the storage port, fetch errors carry a typed [`ProviderError`]:
//!   the chunk orchestrator branches on the failure class (rate limited,
//!   unauthorized, other) to decide between a soft stop and a fatal error.
//! - Records are normalized inside the adapter. Callers only ever see
//!   domain records, never upstream payload shapes.
//! - Uses `#[async_trait]` for async trait methods.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{AccessGrant, BankTransaction, Customer, EntityKind, Invoice};

// ============================================================================
// ProviderError
// ============================================================================

/// Failure classes reported by provider adapters
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Still rate limited after the bounded back-off was exhausted
    #[error("rate limited after {attempts} attempts; try again later")]
    RateLimited { attempts: u32 },

    /// Credentials were rejected (HTTP 401/403, or an invalid grant)
    #[error("unauthorized ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// Any other non-success HTTP status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Transport failure before a response was received
    #[error("network error: {0}")]
    Network(String),

    /// Response body could not be decoded
    #[error("decode error: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Errors that require the user to re-authorize
    #[must_use]
    pub fn requires_reconnect(&self) -> bool {
        matches!(self, ProviderError::Unauthorized { .. })
    }

    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }
}

// ============================================================================
// Fetched pages
// ============================================================================

/// Normalized records of a single kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", content = "records", rename_all = "snake_case")]
pub enum RecordBatch {
    Customers(Vec<Customer>),
    Invoices(Vec<Invoice>),
    BankTransactions(Vec<BankTransaction>),
}

impl RecordBatch {
    /// An empty batch of the given kind
    pub fn empty(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Customers => RecordBatch::Customers(Vec::new()),
            EntityKind::Invoices => RecordBatch::Invoices(Vec::new()),
            EntityKind::BankTransactions => RecordBatch::BankTransactions(Vec::new()),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            RecordBatch::Customers(_) => EntityKind::Customers,
            RecordBatch::Invoices(_) => EntityKind::Invoices,
            RecordBatch::BankTransactions(_) => EntityKind::BankTransactions,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RecordBatch::Customers(r) => r.len(),
            RecordBatch::Invoices(r) => r.len(),
            RecordBatch::BankTransactions(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One fetched page
///
/// `raw_count` is the number of records the upstream page contained
/// before normalization dropped or filtered any. Only a page with
/// `raw_count == 0` ends paging.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub page: u32,
    pub raw_count: usize,
    pub records: RecordBatch,
}

impl FetchedPage {
    /// True when the upstream page held no records at all
    pub fn is_exhausted(&self) -> bool {
        self.raw_count == 0
    }

    /// Records dropped by normalization or client-side filtering
    pub fn skipped(&self) -> usize {
        self.raw_count.saturating_sub(self.records.len())
    }
}

// ============================================================================
// IAccountingProvider
// ============================================================================

/// Read access to the upstream accounting system
#[async_trait::async_trait]
pub trait IAccountingProvider: Send + Sync {
    /// Fetches and normalizes one page of `kind`
    ///
    /// # Arguments
    /// * `grant` - Access token and tenant to use for the request
    /// * `kind` - Entity kind to fetch
    /// * `page` - 1-based page number
    /// * `page_size` - Records per page requested from upstream
    ///
    /// Rate limiting is handled inside the adapter with bounded back-off;
    /// exhaustion surfaces as [`ProviderError::RateLimited`].
    async fn fetch_page(
        &self,
        grant: &AccessGrant,
        kind: EntityKind,
        page: u32,
        page_size: u32,
    ) -> Result<FetchedPage, ProviderError>;
}

// ============================================================================
// ITokenEndpoint
// ============================================================================

/// Tokens returned by a refresh exchange
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshedTokens {
    pub access_token: String,
    /// Rotated refresh token; `None` when the endpoint kept the old one
    pub refresh_token: Option<String>,
    /// Access-token lifetime in seconds
    pub expires_in: u64,
}

impl std::fmt::Debug for RefreshedTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshedTokens")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// The identity service's token endpoint
#[async_trait::async_trait]
pub trait ITokenEndpoint: Send + Sync {
    /// Exchanges a refresh token for a new access/refresh pair
    ///
    /// Implementations make exactly one attempt.
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, ProviderError>;
}
