//! Ledgersync HTTP service
//!
//! Exposes the chunk orchestrator and the enrichment pipeline to a
//! caller that drives them one bounded invocation at a time:
//!
//! - [`routes`] - Method/path dispatch and JSON error mapping
//! - [`server`] - HTTP/1 accept loop with graceful shutdown
//! - [`state`] - Adapters wired from configuration

pub mod routes;
pub mod server;
pub mod state;

pub use routes::{route, EnrichRequest, Reply};
pub use server::{serve, shutdown_signal};
pub use state::AppState;
