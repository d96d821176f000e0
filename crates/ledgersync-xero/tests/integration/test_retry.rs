//! HTTP 429 back-off behaviour of XeroClient

use ledgersync_xero::XeroError;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

fn too_many_requests() -> ResponseTemplate {
    ResponseTemplate::new(429)
        .insert_header("Retry-After", "1")
        .insert_header("X-Rate-Limit-Problem", "minute")
}

#[tokio::test]
async fn test_retries_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Contacts"))
        .respond_with(too_many_requests())
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Contacts": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::client_for(&server, 5);
    let body = client
        .get_json(&common::grant(), "/Contacts", &[])
        .await
        .expect("should succeed on the third attempt");
    assert_eq!(body, json!({"Contacts": []}));
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Invoices"))
        .respond_with(too_many_requests())
        .expect(3)
        .mount(&server)
        .await;

    let client = common::client_for(&server, 3);
    let err = client
        .get_json(&common::grant(), "/Invoices", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, XeroError::RateLimited { attempts: 3 }));
}

#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Contacts"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"Detail": "AuthorizationUnsuccessful"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::client_for(&server, 5);
    let err = client
        .get_json(&common::grant(), "/Contacts", &[])
        .await
        .unwrap_err();
    match err {
        XeroError::Unauthorized { status, message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "AuthorizationUnsuccessful");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
