//! Shared service state
//!
//! Built once at startup and shared by every connection. Requests carry
//! no state between each other beyond what the store holds.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use ledgersync_core::config::Config;
use ledgersync_core::usecases::TokenLifecycle;
use ledgersync_enrich::{EnrichmentPipeline, OpenAiClient};
use ledgersync_store::{DatabasePool, SqliteRecordStore};
use ledgersync_sync::ChunkOrchestrator;
use ledgersync_xero::auth::{OAuth2Config, XeroTokenEndpoint};
use ledgersync_xero::provider::XeroProvider;

/// Everything a request handler needs
pub struct AppState {
    pub orchestrator: Arc<ChunkOrchestrator>,
    /// `None` when no model API key is configured
    pub enrichment: Option<Arc<EnrichmentPipeline>>,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<ChunkOrchestrator>,
        enrichment: Option<Arc<EnrichmentPipeline>>,
    ) -> Self {
        Self {
            orchestrator,
            enrichment,
        }
    }

    /// Opens the database and wires the Xero, sync and enrichment adapters
    pub async fn from_config(config: &Config) -> Result<(Self, DatabasePool)> {
        let pool = DatabasePool::open(&config.database)
            .await
            .context("Failed to open database")?;
        let store = Arc::new(SqliteRecordStore::new(pool.pool().clone()));

        let oauth = OAuth2Config::from_config(&config.xero)?;
        let endpoint = Arc::new(XeroTokenEndpoint::new(&oauth)?);
        let tokens = Arc::new(
            TokenLifecycle::from_config(store.clone(), endpoint, &config.auth)
                .context("Invalid auth settings")?,
        );

        let provider = Arc::new(XeroProvider::from_config(config));
        let orchestrator = Arc::new(ChunkOrchestrator::new(
            provider,
            store.clone(),
            tokens,
            &config.sync,
        ));

        let enrichment = match OpenAiClient::from_config(&config.enrichment) {
            Ok(model) => Some(Arc::new(EnrichmentPipeline::new(
                store,
                Arc::new(model),
                &config.enrichment,
            ))),
            Err(e) => {
                warn!(error = %e, "Enrichment disabled");
                None
            }
        };

        info!(
            database = %config.database.path.display(),
            enrichment = enrichment.is_some(),
            "Service state ready"
        );
        Ok((Self::new(orchestrator, enrichment), pool))
    }
}
