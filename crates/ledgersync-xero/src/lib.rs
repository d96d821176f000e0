//! Ledgersync Xero - Xero accounting API client
//!
//! Provides async client for:
//! - OAuth2 authentication (Authorization Code with PKCE, refresh-token exchange)
//! - Paged reads of contacts, invoices and bank transactions
//! - Bounded exponential back-off on HTTP 429
//! - Normalization of Xero payloads into domain records
//!
//! ## Modules
//!
//! - [`auth`] - OAuth2 login flow components and the token endpoint adapter
//! - [`client`] - Xero API HTTP client with retry handling
//! - [`pages`] - Per-entity page requests and response envelopes
//! - [`normalize`] - Domain rules applied to decoded records
//! - [`wire`] - Xero payload types and lenient field deserializers
//! - [`provider`] - `IAccountingProvider` implementation
//! - [`rate_limit`] - Retry policy and `Retry-After` parsing

pub mod auth;
pub mod client;
pub mod normalize;
pub mod pages;
pub mod provider;
pub mod rate_limit;
pub mod wire;

use ledgersync_core::ports::ProviderError;
use thiserror::Error;

/// Errors that can occur when communicating with the Xero API
#[derive(Debug, Error)]
pub enum XeroError {
    /// Authentication credentials are invalid, expired or lack access (401/403)
    #[error("Unauthorized ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// Still receiving 429 after every retry attempt
    #[error("Rate limited: gave up after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// Any other non-success status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<XeroError> for ProviderError {
    fn from(err: XeroError) -> Self {
        match err {
            XeroError::Unauthorized { status, message } => {
                ProviderError::Unauthorized { status, message }
            }
            XeroError::RateLimited { attempts } => ProviderError::RateLimited { attempts },
            XeroError::Http { status, message } => ProviderError::Http { status, message },
            XeroError::NetworkError(e) if e.is_decode() => ProviderError::Decode(e.to_string()),
            XeroError::NetworkError(e) => ProviderError::Network(e.to_string()),
            XeroError::InvalidResponse(msg) => ProviderError::Decode(msg),
        }
    }
}
