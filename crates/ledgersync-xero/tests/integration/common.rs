//! Shared test helpers for Xero API integration tests
//!
//! Each helper mounts mock endpoints on a wiremock server and returns a
//! provider or client pointed at it, with a zero-delay retry policy.

use ledgersync_core::config::SyncConfig;
use ledgersync_core::domain::AccessGrant;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ledgersync_xero::client::XeroClient;
use ledgersync_xero::pages::PageFilters;
use ledgersync_xero::provider::XeroProvider;
use ledgersync_xero::rate_limit::RetryPolicy;

pub const ACCESS_TOKEN: &str = "test-access-token";
pub const TENANT_ID: &str = "tenant-test-001";

pub fn grant() -> AccessGrant {
    AccessGrant {
        access_token: ACCESS_TOKEN.to_string(),
        tenant_id: TENANT_ID.to_string(),
    }
}

/// Client pointed at the mock server that never sleeps between retries
pub fn client_for(server: &MockServer, max_attempts: u32) -> XeroClient {
    XeroClient::with_base_url(server.uri()).with_retry_policy(RetryPolicy::immediate(max_attempts))
}

/// Provider with default page filters pointed at the mock server
pub async fn setup_provider() -> (MockServer, XeroProvider) {
    let server = MockServer::start().await;
    let provider = XeroProvider::new(
        client_for(&server, 3),
        PageFilters::from(&SyncConfig::default()),
    );
    (server, provider)
}

/// `count` contact records with ids `c-{page}-{i}`
pub fn contacts(page: u32, count: usize) -> Value {
    let records: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "ContactID": format!("c-{page}-{i}"),
                "Name": format!("Customer {page}-{i}"),
                "ContactStatus": "ACTIVE",
                "IsCustomer": true
            })
        })
        .collect();
    json!({ "Contacts": records })
}

/// Mounts one page of an entity endpoint, requiring auth and tenant headers
pub async fn mount_page(server: &MockServer, endpoint: &str, page: u32, body: Value) {
    Mock::given(method("GET"))
        .and(path(endpoint))
        .and(query_param("page", page.to_string()))
        .and(header("authorization", format!("Bearer {ACCESS_TOKEN}").as_str()))
        .and(header("xero-tenant-id", TENANT_ID))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}
