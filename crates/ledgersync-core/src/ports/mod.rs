//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IAccountingProvider`] - Paged reads from the accounting system (Xero)
//! - [`ITokenEndpoint`] - Refresh-token exchange with the identity service
//! - [`IRecordStore`] - Persistent storage for records, connections, cursors

pub mod accounting_provider;
pub mod record_store;

pub use accounting_provider::{
    FetchedPage, IAccountingProvider, ITokenEndpoint, ProviderError, RecordBatch, RefreshedTokens,
};
pub use record_store::{IRecordStore, RecordCounts};
