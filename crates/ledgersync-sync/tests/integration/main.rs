//! Integration tests for ledgersync-sync
//!
//! Drives the chunk orchestrator and the sync driver against a scripted
//! in-process provider and an in-memory SQLite store.

mod common;

mod test_driver;
mod test_orchestrator;
