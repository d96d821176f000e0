//! Record store port (driven/secondary port)
//!
//! This module defines the interface for persisting synced records, the
//! OAuth connection, per-entity sync cursors, and enrichment results.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   (SQLite, etc.) and don't need domain-level classification. Any store
//!   failure during a chunk is fatal to that chunk.
//! - Upserts are keyed on the upstream external ID and are last-write-wins.
//! - Enrichment selection is keyset-paginated on the local row id.

use serde::{Deserialize, Serialize};

use crate::domain::{
    EntityKind, Enrichment, OAuthConnection, PendingInvoice, SyncCursor, UserId,
};

use super::accounting_provider::RecordBatch;

/// Row counts per synced table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCounts {
    pub customers: u64,
    pub invoices: u64,
    pub bank_transactions: u64,
}

impl RecordCounts {
    pub fn get(&self, kind: EntityKind) -> u64 {
        match kind {
            EntityKind::Customers => self.customers,
            EntityKind::Invoices => self.invoices,
            EntityKind::BankTransactions => self.bank_transactions,
        }
    }

    pub fn total(&self) -> u64 {
        self.customers + self.invoices + self.bank_transactions
    }

    pub fn add(&mut self, kind: EntityKind, n: u64) {
        match kind {
            EntityKind::Customers => self.customers += n,
            EntityKind::Invoices => self.invoices += n,
            EntityKind::BankTransactions => self.bank_transactions += n,
        }
    }
}

/// Persistence for everything the pipeline reads and writes
#[async_trait::async_trait]
pub trait IRecordStore: Send + Sync {
    // --- Synced records ---

    /// Inserts or updates every record in `batch` in one transaction
    ///
    /// Returns the number of records written.
    async fn upsert_batch(&self, batch: &RecordBatch) -> anyhow::Result<u64>;

    /// Current row counts
    async fn counts(&self) -> anyhow::Result<RecordCounts>;

    /// Administrative clear: deletes all synced records and returns how
    /// many rows each table held
    async fn clear_synced_data(&self) -> anyhow::Result<RecordCounts>;

    // --- OAuth connection ---

    async fn get_connection(&self, user: &UserId) -> anyhow::Result<Option<OAuthConnection>>;

    /// Inserts or replaces the user's connection
    async fn save_connection(&self, connection: &OAuthConnection) -> anyhow::Result<()>;

    /// Removes the user's connection; returns whether one existed
    async fn delete_connection(&self, user: &UserId) -> anyhow::Result<bool>;

    // --- Sync cursors ---

    async fn load_cursor(
        &self,
        user: &UserId,
        entity: EntityKind,
    ) -> anyhow::Result<Option<SyncCursor>>;

    /// All stored cursors for `user`, in processing order
    async fn load_cursors(&self, user: &UserId) -> anyhow::Result<Vec<SyncCursor>>;

    async fn save_cursor(&self, user: &UserId, cursor: &SyncCursor) -> anyhow::Result<()>;

    /// Deletes every cursor for `user`; returns how many were removed
    async fn clear_cursors(&self, user: &UserId) -> anyhow::Result<u64>;

    // --- Enrichment ---

    /// Invoices needing enrichment with row id greater than `after_id`,
    /// ordered by row id, at most `limit`
    async fn select_pending_enrichment(
        &self,
        after_id: i64,
        limit: u32,
        min_description_length: u32,
    ) -> anyhow::Result<Vec<PendingInvoice>>;

    /// Number of invoices currently needing enrichment
    async fn count_pending_enrichment(&self, min_description_length: u32) -> anyhow::Result<u64>;

    /// Overwrites the derived columns of the given rows
    ///
    /// Returns the number of rows updated.
    async fn apply_enrichment(&self, updates: &[(i64, Enrichment)]) -> anyhow::Result<u64>;
}
