//! Domain entities and business logic
//!
//! This module contains the core domain types for Ledgersync:
//! - Newtypes for upstream identifiers, users and entity kinds
//! - Customer, invoice and bank-transaction records
//! - OAuth connection and per-entity sync cursor state
//! - Enrichment selection and results
//! - The [`Shape`] container used at the ingestion boundary
//! - Domain-specific error types

pub mod bank_transaction;
pub mod connection;
pub mod cursor;
pub mod customer;
pub mod enrichment;
pub mod errors;
pub mod invoice;
pub mod newtypes;
pub mod shape;

// Re-export commonly used types
pub use bank_transaction::{BankTransaction, TransactionDirection};
pub use connection::{AccessGrant, OAuthConnection};
pub use cursor::SyncCursor;
pub use customer::{Address, ContactStatus, Customer, PhoneNumber, TrackingCategoryRef};
pub use enrichment::{Enrichment, PendingInvoice};
pub use errors::DomainError;
pub use invoice::{Invoice, InvoiceStatus, InvoiceType, LineItem};
pub use newtypes::*;
pub use shape::Shape;
