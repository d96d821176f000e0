//! End-to-end HTTP tests

use serde_json::{json, Value};

use crate::common::start;

#[tokio::test]
async fn test_health() {
    let server = start(false).await;
    let response = reqwest::get(server.url("/health")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"],
        "application/json"
    );
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_chunk_with_inline_credentials() {
    let server = start(false).await;
    let response = reqwest::Client::new()
        .post(server.url("/sync/chunk"))
        .json(&json!({"accessToken": "token", "tenantId": "tenant-1"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["hasMore"], false);
    assert_eq!(body["totalCustomers"], 0);
    assert!(body["progress"].as_array().is_some_and(|p| !p.is_empty()));
}

#[tokio::test]
async fn test_chunk_without_connection_is_unauthorized() {
    let server = start(false).await;
    let response = reqwest::Client::new()
        .post(server.url("/sync/chunk"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let server = start(false).await;
    let response = reqwest::Client::new()
        .post(server.url("/sync/chunk"))
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_last_start_page_is_bad_request() {
    let server = start(false).await;
    let response = reqwest::Client::new()
        .post(server.url("/sync/chunk"))
        .json(&json!({
            "accessToken": "token",
            "tenantId": "tenant-1",
            "startInvoicePage": u32::MAX
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().is_some_and(|e| e.contains("start page")));
}

#[tokio::test]
async fn test_enrichment_disabled_is_unavailable() {
    let server = start(false).await;
    let response = reqwest::Client::new()
        .post(server.url("/enrich/batch"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 503);
}

#[tokio::test]
async fn test_enrich_batch_on_empty_store() {
    let server = start(true).await;
    let response = reqwest::Client::new()
        .post(server.url("/enrich/batch"))
        .json(&json!({"cursor": 7, "batchSize": 10}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["processed"], 0);
    assert_eq!(body["hasMore"], false);
    assert_eq!(body["nextCursor"], 7);
}

#[tokio::test]
async fn test_unknown_path_and_wrong_method() {
    let server = start(false).await;
    let client = reqwest::Client::new();

    let missing = client.get(server.url("/nope")).send().await.unwrap();
    assert_eq!(missing.status(), 404);

    let wrong = client.get(server.url("/sync/chunk")).send().await.unwrap();
    assert_eq!(wrong.status(), 405);
}

#[tokio::test]
async fn test_shutdown_stops_the_server() {
    let server = start(false).await;
    reqwest::get(server.url("/health")).await.unwrap();

    server.shutdown.cancel();
    let result = tokio::time::timeout(std::time::Duration::from_secs(5), server.handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}
