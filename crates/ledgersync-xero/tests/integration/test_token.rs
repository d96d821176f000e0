//! Refresh-token exchange and tenant lookup against mocked identity endpoints

use ledgersync_core::config::XeroConfig;
use ledgersync_core::ports::{ITokenEndpoint, ProviderError};
use ledgersync_xero::auth::{select_tenant, OAuth2Config, XeroTokenEndpoint};
use ledgersync_xero::client::XeroClient;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn oauth_config(server: &MockServer) -> OAuth2Config {
    OAuth2Config::from_config(&XeroConfig {
        client_id: Some("client-abc".to_string()),
        client_secret: Some("secret-xyz".to_string()),
        token_url: format!("{}/connect/token", server.uri()),
        connections_url: format!("{}/connections", server.uri()),
        ..XeroConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_refresh_exchanges_token_with_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/connect/token"))
        .and(header_exists("authorization"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-access",
            "refresh_token": "new-refresh",
            "token_type": "Bearer",
            "expires_in": 1800
        })))
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = XeroTokenEndpoint::new(&oauth_config(&server)).unwrap();
    let tokens = endpoint.refresh("old-refresh").await.unwrap();

    assert_eq!(tokens.access_token, "new-access");
    assert_eq!(tokens.refresh_token.as_deref(), Some("new-refresh"));
    assert_eq!(tokens.expires_in, 1800);
}

#[tokio::test]
async fn test_refresh_rejected_is_single_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/connect/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = XeroTokenEndpoint::new(&oauth_config(&server)).unwrap();
    let err = endpoint.refresh("revoked").await.unwrap_err();
    assert!(err.requires_reconnect());
    assert!(matches!(err, ProviderError::Unauthorized { .. }));
}

#[tokio::test]
async fn test_connections_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/connections"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "1", "tenantId": "practice-1", "tenantType": "PRACTICE", "tenantName": "Practice"},
            {"id": "2", "tenantId": "org-1", "tenantType": "ORGANISATION", "tenantName": "Demo Company (NZ)"}
        ])))
        .mount(&server)
        .await;

    let config = oauth_config(&server);
    let connections = XeroClient::new()
        .get_connections(&config.connections_url, "access-1")
        .await
        .unwrap();
    assert_eq!(connections.len(), 2);

    let tenant = select_tenant(&connections, None).unwrap();
    assert_eq!(tenant.tenant_id, "org-1");
    assert_eq!(tenant.tenant_name.as_deref(), Some("Demo Company (NZ)"));
}

#[tokio::test]
async fn test_connections_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/connections"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = XeroClient::new()
        .get_connections(&format!("{}/connections", server.uri()), "expired")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ledgersync_xero::XeroError::Unauthorized { status: 401, .. }
    ));
}
