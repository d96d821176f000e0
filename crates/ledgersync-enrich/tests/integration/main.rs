//! Integration tests for ledgersync-enrich
//!
//! A wiremock server stands in for the chat-completions endpoint; invoices
//! live in an in-memory SQLite store.

mod common;

mod test_openai;
mod test_pipeline;
