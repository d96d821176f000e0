//! Ledgersync Enrich - LLM-derived invoice metadata
//!
//! Provides:
//! - An OpenAI-compatible chat-completions client
//! - A keyword pre-filter that keeps obviously irrelevant invoices away
//!   from the model
//! - The batch pipeline: keyset selection, sub-batched model calls with
//!   bounded concurrency, positional response parsing, cost accounting
//!
//! ## Modules
//!
//! - [`openai`] - [`ILanguageModel`] port and its chat-completions adapter
//! - [`prefilter`] - Vocabulary match over invoice text
//! - [`prompt`] - System prompt, user message layout, response parsing
//! - [`pipeline`] - [`EnrichmentPipeline::enrich_batch`]

pub mod openai;
pub mod pipeline;
pub mod prefilter;
pub mod prompt;

pub use openai::{Completion, ILanguageModel, LlmError, OpenAiClient, TokenCounts};
pub use pipeline::{EnrichResult, EnrichRunSummary, EnrichmentPipeline, TokenUsage};
pub use prefilter::Prefilter;

use thiserror::Error;

/// Errors that abort an enrichment batch
///
/// Failures of individual model calls are not errors here; the affected
/// invoices simply stay pending.
#[derive(Debug, Error)]
pub enum EnrichError {
    /// No API key or endpoint configured
    #[error("enrichment not configured: {0}")]
    NotConfigured(String),

    /// Selecting or writing invoices failed
    #[error("store error: {0:#}")]
    Store(#[source] anyhow::Error),

    /// Building the HTTP client failed
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}
