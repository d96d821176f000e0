//! Ledgersync Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Customer`, `Invoice`, `BankTransaction`, `OAuthConnection`, `SyncCursor`
//! - **Use cases** - `TokenLifecycle` (access-token validation and proactive refresh)
//! - **Port definitions** - Traits for adapters: `IAccountingProvider`, `ITokenEndpoint`, `IRecordStore`
//! - **Configuration** - YAML-backed `Config` with validation and a builder
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement.
//! Use cases orchestrate domain entities through port interfaces.

pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
