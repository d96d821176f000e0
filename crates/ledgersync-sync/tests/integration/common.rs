//! Shared helpers: a scripted provider, a fixed token endpoint and an
//! orchestrator wired to an in-memory store

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use ledgersync_core::config::ConfigBuilder;
use ledgersync_core::domain::{
    AccessGrant, ContactStatus, Customer, EntityKind, ExternalId, OAuthConnection, UserId,
};
use ledgersync_core::ports::{
    FetchedPage, IAccountingProvider, IRecordStore, ITokenEndpoint, ProviderError, RecordBatch,
    RefreshedTokens,
};
use ledgersync_core::usecases::TokenLifecycle;
use ledgersync_store::{DatabasePool, SqliteRecordStore};
use ledgersync_sync::ChunkOrchestrator;

pub const STORED_TOKEN: &str = "stored-access-token";

/// What the provider answers for one (entity, page)
#[derive(Debug, Clone)]
pub enum Script {
    Records(usize),
    Fail(ProviderError),
}

/// Provider that serves scripted pages; unscripted pages are empty
#[derive(Default)]
pub struct ScriptedProvider {
    pages: Mutex<HashMap<(EntityKind, u32), Script>>,
    calls: Mutex<Vec<(EntityKind, u32, String)>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, kind: EntityKind, page: u32, script: Script) {
        self.pages.lock().unwrap().insert((kind, page), script);
    }

    /// Scripts consecutive full pages starting at page 1
    pub fn pages(&self, kind: EntityKind, sizes: &[usize]) {
        for (i, &n) in sizes.iter().enumerate() {
            self.script(kind, i as u32 + 1, Script::Records(n));
        }
    }

    /// Pages requested so far for `kind`, in order
    pub fn calls_for(&self, kind: EntityKind) -> Vec<u32> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _, _)| *k == kind)
            .map(|(_, page, _)| *page)
            .collect()
    }

    /// Entity kind of every request, in order
    pub fn kinds_called(&self) -> Vec<EntityKind> {
        self.calls.lock().unwrap().iter().map(|(k, _, _)| *k).collect()
    }

    pub fn tokens_used(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, token)| token.clone())
            .collect()
    }
}

pub fn customer(xero_id: &str) -> Customer {
    Customer {
        external_id: ExternalId::new(xero_id).unwrap(),
        name: format!("Customer {xero_id}"),
        email: None,
        phones: Vec::new(),
        addresses: Vec::new(),
        status: ContactStatus::Active,
        is_supplier: false,
        is_customer: true,
        tracking_categories: Vec::new(),
    }
}

#[async_trait]
impl IAccountingProvider for ScriptedProvider {
    async fn fetch_page(
        &self,
        grant: &AccessGrant,
        kind: EntityKind,
        page: u32,
        _page_size: u32,
    ) -> Result<FetchedPage, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((kind, page, grant.access_token.clone()));

        let script = self
            .pages
            .lock()
            .unwrap()
            .get(&(kind, page))
            .cloned()
            .unwrap_or(Script::Records(0));

        match script {
            Script::Fail(e) => Err(e),
            Script::Records(0) => Ok(FetchedPage {
                page,
                raw_count: 0,
                records: RecordBatch::empty(kind),
            }),
            Script::Records(n) => {
                assert_eq!(kind, EntityKind::Customers, "only customer pages carry records");
                let records = (0..n).map(|i| customer(&format!("c-{page}-{i}"))).collect();
                Ok(FetchedPage {
                    page,
                    raw_count: n,
                    records: RecordBatch::Customers(records),
                })
            }
        }
    }
}

/// Token endpoint that always answers the same way
pub struct FixedEndpoint(pub Result<RefreshedTokens, ProviderError>);

#[async_trait]
impl ITokenEndpoint for FixedEndpoint {
    async fn refresh(&self, _refresh_token: &str) -> Result<RefreshedTokens, ProviderError> {
        self.0.clone()
    }
}

pub fn user() -> UserId {
    UserId::new("default").unwrap()
}

pub fn connection(access_valid_for: Duration) -> OAuthConnection {
    let now = Utc::now();
    OAuthConnection {
        user_id: user(),
        tenant_id: "tenant-1".to_string(),
        access_token: STORED_TOKEN.to_string(),
        refresh_token: "refresh-1".to_string(),
        access_expires_at: now + access_valid_for,
        refresh_expires_at: now + Duration::days(60),
        updated_at: now,
    }
}

pub struct Harness {
    pub pool: DatabasePool,
    pub store: Arc<SqliteRecordStore>,
    pub provider: Arc<ScriptedProvider>,
    pub orchestrator: Arc<ChunkOrchestrator>,
}

/// Orchestrator with zero page delay and `max_pages` per entity
pub async fn harness(max_pages: u32, endpoint: FixedEndpoint) -> Harness {
    let pool = DatabasePool::in_memory().await.unwrap();
    let store = Arc::new(SqliteRecordStore::new(pool.pool().clone()));
    let provider = Arc::new(ScriptedProvider::new());
    let tokens = Arc::new(TokenLifecycle::new(store.clone(), Arc::new(endpoint), user()));

    let config = ConfigBuilder::new()
        .sync_max_pages(max_pages)
        .sync_page_delay_ms(0)
        .build();
    let orchestrator = Arc::new(ChunkOrchestrator::new(
        provider.clone(),
        store.clone(),
        tokens,
        &config.sync,
    ));

    Harness {
        pool,
        store,
        provider,
        orchestrator,
    }
}

/// Harness with a stored, valid connection
pub async fn connected_harness(max_pages: u32) -> Harness {
    let h = harness(
        max_pages,
        FixedEndpoint(Err(ProviderError::Network("unused".to_string()))),
    )
    .await;
    h.store
        .save_connection(&connection(Duration::minutes(30)))
        .await
        .unwrap();
    h
}
