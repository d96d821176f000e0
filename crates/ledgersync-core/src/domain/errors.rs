//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! mostly validation failures when building domain values from
//! upstream or stored data.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// External (upstream) identifier is empty or malformed
    #[error("Invalid external ID: {0}")]
    InvalidExternalId(String),

    /// User identifier is empty or malformed
    #[error("Invalid user ID: {0}")]
    InvalidUserId(String),

    /// Unknown entity kind name
    #[error("Unknown entity kind: {0}")]
    UnknownEntityKind(String),

    /// A wire value did not match any known variant of an enum
    #[error("Unknown {kind} value: {value}")]
    UnknownVariant {
        /// Name of the enum being parsed (e.g. "invoice status")
        kind: &'static str,
        /// The offending wire value
        value: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
