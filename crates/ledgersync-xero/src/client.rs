//! Xero accounting API client
//!
//! Provides a typed HTTP client for the Xero accounting API. Handles the
//! bearer and tenant headers, base URL construction, 429 back-off, and
//! mapping of error statuses.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ledgersync_core::domain::AccessGrant;
//! use ledgersync_xero::client::XeroClient;
//!
//! # async fn example() -> Result<(), ledgersync_xero::XeroError> {
//! let client = XeroClient::new();
//! let grant = AccessGrant {
//!     access_token: "token".into(),
//!     tenant_id: "tenant".into(),
//! };
//! let body = client
//!     .get_json(&grant, "/Contacts", &[("page", "1".to_string())])
//!     .await?;
//! println!("{body}");
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use ledgersync_core::domain::AccessGrant;
use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::rate_limit::{parse_retry_after, RetryPolicy};
use crate::XeroError;

/// Base URL for the Xero accounting API
pub const XERO_API_BASE_URL: &str = "https://api.xero.com/api.xro/2.0";

/// Header carrying the organisation a request targets
const TENANT_HEADER: &str = "xero-tenant-id";

/// Header naming which limit (minute/day/concurrent) a 429 hit
const RATE_LIMIT_PROBLEM_HEADER: &str = "x-rate-limit-problem";

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// Xero API response types
// ============================================================================

/// One entry of `GET /connections`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TenantConnection {
    pub tenant_id: String,
    #[serde(default)]
    pub tenant_name: Option<String>,
    #[serde(default)]
    pub tenant_type: Option<String>,
}

// ============================================================================
// XeroClient
// ============================================================================

/// HTTP client for Xero API calls
///
/// Credentials are passed per request so one client can serve requests
/// that carry their own access token.
#[derive(Debug, Clone)]
pub struct XeroClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl Default for XeroClient {
    fn default() -> Self {
        Self::new()
    }
}

impl XeroClient {
    /// Creates a client for the production API with the default retry policy
    pub fn new() -> Self {
        Self::with_base_url(XERO_API_BASE_URL)
    }

    /// Creates a client with a custom base URL (useful for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the 429 retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns a reference to the underlying reqwest Client
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    /// Builds an authenticated GET for `path` relative to the base URL
    pub fn request(
        &self,
        grant: &AccessGrant,
        path: &str,
        query: &[(&str, String)],
    ) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .get(url)
            .bearer_auth(&grant.access_token)
            .header(TENANT_HEADER, &grant.tenant_id)
            .header(header::ACCEPT, "application/json")
            .query(query)
    }

    // ========================================================================
    // execute_with_retry - 429 response handling
    // ========================================================================

    /// Sends a GET with bounded exponential back-off on HTTP 429.
    ///
    /// - 429: sleeps per [`RetryPolicy::delay_for`] (honouring a larger
    ///   `Retry-After`) and retries the same request, up to
    ///   `max_attempts` in total; then [`XeroError::RateLimited`].
    /// - 401/403: [`XeroError::Unauthorized`], never retried.
    /// - other non-2xx: [`XeroError::Http`], never retried.
    pub async fn execute_with_retry(
        &self,
        grant: &AccessGrant,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Response, XeroError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let response = self.request(grant, path, query).send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let problem = header_str(&response, RATE_LIMIT_PROBLEM_HEADER);
                let retry_after = header_str(&response, header::RETRY_AFTER.as_str())
                    .and_then(|v| parse_retry_after(&v));

                if !self.retry.should_retry(attempt) {
                    warn!(path, attempts = attempt, problem = ?problem, "429 retry limit exhausted");
                    return Err(XeroError::RateLimited { attempts: attempt });
                }

                let delay = self.retry.delay_for(attempt, retry_after);
                info!(
                    path,
                    attempt,
                    problem = ?problem,
                    delay_ms = delay.as_millis() as u64,
                    "Received 429, backing off"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if status.is_success() {
                if attempt > 1 {
                    info!(path, attempt, "Request succeeded after retry");
                }
                return Ok(response);
            }

            let message = error_message(response).await;
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                warn!(path, status = status.as_u16(), "Xero rejected credentials");
                return Err(XeroError::Unauthorized {
                    status: status.as_u16(),
                    message,
                });
            }

            warn!(path, status = status.as_u16(), %message, "Xero request failed");
            return Err(XeroError::Http {
                status: status.as_u16(),
                message,
            });
        }
    }

    /// GETs `path` and decodes the body as JSON
    pub async fn get_json(
        &self,
        grant: &AccessGrant,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, XeroError> {
        debug!(path, ?query, "GET");
        let response = self.execute_with_retry(grant, path, query).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| XeroError::InvalidResponse(format!("{path}: {e}")))
    }

    /// Lists the tenants an access token can reach (`GET /connections`)
    pub async fn get_connections(
        &self,
        connections_url: &str,
        access_token: &str,
    ) -> Result<Vec<TenantConnection>, XeroError> {
        let response = self
            .client
            .get(connections_url)
            .bearer_auth(access_token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(XeroError::Unauthorized {
                status: status.as_u16(),
                message: error_message(response).await,
            });
        }
        if !status.is_success() {
            return Err(XeroError::Http {
                status: status.as_u16(),
                message: error_message(response).await,
            });
        }

        response
            .json::<Vec<TenantConnection>>()
            .await
            .map_err(|e| XeroError::InvalidResponse(format!("connections: {e}")))
    }
}

fn header_str(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Best-effort error detail from a Xero error body
///
/// Xero returns `{"Detail": ...}` for auth failures and
/// `{"Message": ...}` for validation errors.
async fn error_message(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            ["Detail", "Message", "Title", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(str::to_string))
        })
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().chars().take(200).collect()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string())
}
