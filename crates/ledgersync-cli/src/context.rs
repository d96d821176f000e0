//! Configuration loading and adapter wiring shared by the commands

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use ledgersync_core::config::Config;
use ledgersync_core::ports::{ITokenEndpoint, ProviderError, RefreshedTokens};
use ledgersync_core::usecases::TokenLifecycle;
use ledgersync_enrich::{EnrichmentPipeline, OpenAiClient};
use ledgersync_store::{DatabasePool, SqliteRecordStore};
use ledgersync_sync::ChunkOrchestrator;
use ledgersync_xero::auth::{OAuth2Config, XeroTokenEndpoint};
use ledgersync_xero::provider::XeroProvider;

/// Resolves the configuration path: `--config`, then the default location
pub fn config_path(cli_path: Option<&Path>) -> PathBuf {
    cli_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::default_path)
}

/// Loads the file at `path` (defaults when absent) and overlays the
/// environment
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        Config::load(path).with_context(|| format!("Failed to load {}", path.display()))?
    } else {
        debug!(path = %path.display(), "No configuration file, using defaults");
        Config::default()
    };
    config.apply_env();
    Ok(config)
}

/// Token endpoint used when no Xero client is configured
///
/// Reading or deleting the stored connection never refreshes, so
/// `auth status` and `auth logout` work without client credentials.
struct UnconfiguredEndpoint;

#[async_trait]
impl ITokenEndpoint for UnconfiguredEndpoint {
    async fn refresh(&self, _refresh_token: &str) -> Result<RefreshedTokens, ProviderError> {
        Err(ProviderError::Unauthorized {
            status: 0,
            message: "xero.client_id is not configured".to_string(),
        })
    }
}

/// An open database plus the loaded configuration
pub struct CliContext {
    pub config: Config,
    pub pool: DatabasePool,
    pub store: Arc<SqliteRecordStore>,
}

impl CliContext {
    /// Opens (creating if needed) the configured database
    pub async fn open(config: Config) -> Result<Self> {
        let pool = DatabasePool::open(&config.database)
            .await
            .with_context(|| {
                format!("Failed to open database {}", config.database.path.display())
            })?;
        let store = Arc::new(SqliteRecordStore::new(pool.pool().clone()));
        Ok(Self {
            config,
            pool,
            store,
        })
    }

    /// Token lifecycle that can refresh against Xero
    pub fn tokens(&self) -> Result<Arc<TokenLifecycle>> {
        let oauth = OAuth2Config::from_config(&self.config.xero)?;
        let endpoint = Arc::new(XeroTokenEndpoint::new(&oauth)?);
        Ok(Arc::new(
            TokenLifecycle::from_config(self.store.clone(), endpoint, &self.config.auth)
                .context("Invalid auth settings")?,
        ))
    }

    /// Token lifecycle for reading or removing the stored connection;
    /// falls back to a refusing endpoint without client credentials
    pub fn stored_tokens(&self) -> Result<Arc<TokenLifecycle>> {
        if self.config.xero.client_id.is_some() {
            return self.tokens();
        }
        Ok(Arc::new(
            TokenLifecycle::from_config(
                self.store.clone(),
                Arc::new(UnconfiguredEndpoint),
                &self.config.auth,
            )
            .context("Invalid auth settings")?,
        ))
    }

    pub fn orchestrator(&self) -> Result<Arc<ChunkOrchestrator>> {
        let provider = Arc::new(XeroProvider::from_config(&self.config));
        Ok(Arc::new(ChunkOrchestrator::new(
            provider,
            self.store.clone(),
            self.tokens()?,
            &self.config.sync,
        )))
    }

    pub fn pipeline(&self) -> Result<EnrichmentPipeline> {
        let model = OpenAiClient::from_config(&self.config.enrichment)?;
        Ok(EnrichmentPipeline::new(
            self.store.clone(),
            Arc::new(model),
            &self.config.enrichment,
        ))
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.sync.page_size, Config::default().sync.page_size);
    }

    #[test]
    fn test_file_values_are_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "sync:\n  page_size: 250\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.sync.page_size, 250);
    }

    #[test]
    fn test_cli_path_wins() {
        let explicit = PathBuf::from("/tmp/ledgersync.yaml");
        assert_eq!(config_path(Some(&explicit)), explicit);
        assert_eq!(config_path(None), Config::default_path());
    }

    #[tokio::test]
    async fn test_stored_tokens_without_client_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.xero.client_id = None;
        config.database.path = dir.path().join("db").join("ledgersync.db");

        let ctx = CliContext::open(config).await.unwrap();
        assert!(ctx.tokens().is_err());
        let tokens = ctx.stored_tokens().unwrap();
        assert!(!tokens.disconnect().await.unwrap());
        ctx.close().await;
    }
}
