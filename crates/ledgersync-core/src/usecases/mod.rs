//! Use cases (interactors) for Ledgersync
//!
//! This module contains the application use cases that orchestrate
//! domain entities and port interfaces. Use cases are thin coordinators
//! that delegate business rules to domain methods and I/O to ports.
//!
//! ## Use Cases
//!
//! - [`TokenLifecycle`] - Access-token validation, proactive refresh, connect/disconnect

pub mod token_lifecycle;

pub use token_lifecycle::{ConnectionStatus, TokenError, TokenLifecycle};
