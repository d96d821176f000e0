//! A running server backed by an in-memory store and stub adapters

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use ledgersync_core::config::ConfigBuilder;
use ledgersync_core::domain::{AccessGrant, EntityKind, UserId};
use ledgersync_core::ports::{
    FetchedPage, IAccountingProvider, ITokenEndpoint, ProviderError, RecordBatch,
    RefreshedTokens,
};
use ledgersync_core::usecases::TokenLifecycle;
use ledgersync_enrich::{Completion, EnrichmentPipeline, ILanguageModel, LlmError, TokenCounts};
use ledgersync_server::{serve, AppState};
use ledgersync_store::{DatabasePool, SqliteRecordStore};
use ledgersync_sync::ChunkOrchestrator;

/// Provider whose every page is empty
pub struct EmptyProvider;

#[async_trait]
impl IAccountingProvider for EmptyProvider {
    async fn fetch_page(
        &self,
        _grant: &AccessGrant,
        kind: EntityKind,
        page: u32,
        _page_size: u32,
    ) -> Result<FetchedPage, ProviderError> {
        Ok(FetchedPage {
            page,
            raw_count: 0,
            records: RecordBatch::empty(kind),
        })
    }
}

pub struct RejectingEndpoint;

#[async_trait]
impl ITokenEndpoint for RejectingEndpoint {
    async fn refresh(&self, _refresh_token: &str) -> Result<RefreshedTokens, ProviderError> {
        Err(ProviderError::Unauthorized {
            status: 400,
            message: "invalid_grant".to_string(),
        })
    }
}

pub struct SilentModel;

#[async_trait]
impl ILanguageModel for SilentModel {
    async fn complete(&self, _system: &str, _user: &str) -> Result<Completion, LlmError> {
        Ok(Completion {
            content: "[]".to_string(),
            usage: TokenCounts::default(),
        })
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: CancellationToken,
    pub handle: JoinHandle<anyhow::Result<()>>,
    _pool: DatabasePool,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Starts a server on an ephemeral port
pub async fn start(with_enrichment: bool) -> TestServer {
    let pool = DatabasePool::in_memory().await.unwrap();
    let store = Arc::new(SqliteRecordStore::new(pool.pool().clone()));
    let tokens = Arc::new(TokenLifecycle::new(
        store.clone(),
        Arc::new(RejectingEndpoint),
        UserId::new("default").unwrap(),
    ));
    let config = ConfigBuilder::new().sync_page_delay_ms(0).build();
    let orchestrator = Arc::new(ChunkOrchestrator::new(
        Arc::new(EmptyProvider),
        store.clone(),
        tokens,
        &config.sync,
    ));
    let enrichment = with_enrichment.then(|| {
        Arc::new(EnrichmentPipeline::new(
            store.clone(),
            Arc::new(SilentModel),
            &config.enrichment,
        ))
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(serve(
        listener,
        Arc::new(AppState::new(orchestrator, enrichment)),
        shutdown.clone(),
    ));

    TestServer {
        addr,
        shutdown,
        handle,
        _pool: pool,
    }
}
