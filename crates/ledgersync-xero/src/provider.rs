//! XeroProvider - IAccountingProvider implementation for the Xero API
//!
//! Wraps the [`XeroClient`] and the page/normalize modules to fulfil the
//! [`IAccountingProvider`] port contract: one GET per page, 429 back-off
//! inside the client, then normalization into a [`RecordBatch`].
//!
//! ## Design Notes
//!
//! - The provider holds no credentials; every call receives an
//!   [`AccessGrant`] so chunk requests can carry their own token.
//! - `raw_count` reports the number of records Xero returned before any
//!   filtering, so an exhausted entity is detected even when a page
//!   normalizes to nothing.

use async_trait::async_trait;
use tracing::debug;

use ledgersync_core::config::Config;
use ledgersync_core::domain::{AccessGrant, EntityKind};
use ledgersync_core::ports::{FetchedPage, IAccountingProvider, ProviderError};

use crate::client::XeroClient;
use crate::normalize::normalize_page;
use crate::pages::{endpoint, records_from_envelope, PageFilters};
use crate::rate_limit::RetryPolicy;

/// Accounting provider backed by the Xero API
#[derive(Debug, Clone)]
pub struct XeroProvider {
    client: XeroClient,
    filters: PageFilters,
}

impl XeroProvider {
    /// Creates a provider from an existing client and page filters
    pub fn new(client: XeroClient, filters: PageFilters) -> Self {
        Self { client, filters }
    }

    /// Builds a provider from configuration (base URL, retry, filters)
    pub fn from_config(config: &Config) -> Self {
        let client = XeroClient::with_base_url(&config.xero.api_base_url)
            .with_retry_policy(RetryPolicy::from(&config.retry));
        Self::new(client, PageFilters::from(&config.sync))
    }

    pub fn client(&self) -> &XeroClient {
        &self.client
    }
}

#[async_trait]
impl IAccountingProvider for XeroProvider {
    async fn fetch_page(
        &self,
        grant: &AccessGrant,
        kind: EntityKind,
        page: u32,
        page_size: u32,
    ) -> Result<FetchedPage, ProviderError> {
        let query = self.filters.query(kind, page, page_size);
        let body = self.client.get_json(grant, endpoint(kind), &query).await?;
        let raw = records_from_envelope(kind, body)?;
        let records = normalize_page(kind, &raw);

        debug!(
            entity = %kind,
            page,
            raw = raw.len(),
            kept = records.len(),
            "Fetched page"
        );

        Ok(FetchedPage {
            page,
            raw_count: raw.len(),
            records,
        })
    }
}
