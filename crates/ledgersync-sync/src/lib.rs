//! Ledgersync Sync - Chunked, resumable synchronization
//!
//! Provides:
//! - Per-invocation chunk processing of customers, invoices and bank
//!   transactions with a page bound per entity
//! - Server-side cursors so an interrupted sync resumes where it stopped
//! - A driver loop that keeps invoking chunks until all entities are done
//!
//! ## Modules
//!
//! - [`orchestrator`] - One chunk invocation: fetch, normalize, upsert, advance cursors
//! - [`driver`] - Repeats chunk invocations with cancellation and a stall guard

pub mod driver;
pub mod orchestrator;

pub use driver::{DriverOptions, DriverOutcome, DriverSummary, ProgressThrottle, SyncDriver};
pub use orchestrator::{ChunkOrchestrator, ChunkRequest, ChunkResponse, EntityError};

use thiserror::Error;

/// Errors that end a chunk invocation
///
/// Soft per-entity failures (rate limiting, other HTTP errors) are not
/// errors here; they are reported inside the [`ChunkResponse`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// No stored connection, or its refresh token has expired
    #[error("not connected to Xero; run 'ledgersync auth login'")]
    NotConnected,

    /// The token refresh or an API call was rejected
    #[error("reconnect required: {0}")]
    ReconnectRequired(String),

    /// The request names a page range that cannot be represented
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Persisting records or cursors failed
    #[error("store error: {0:#}")]
    Store(#[source] anyhow::Error),
}

impl SyncError {
    /// Errors that the user fixes by logging in again
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, SyncError::NotConnected | SyncError::ReconnectRequired(_))
    }
}
