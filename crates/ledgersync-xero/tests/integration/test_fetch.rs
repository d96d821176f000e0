//! Page fetching and normalization through XeroProvider

use ledgersync_core::domain::{EntityKind, InvoiceStatus, TransactionDirection};
use ledgersync_core::ports::{IAccountingProvider, ProviderError, RecordBatch};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_fetch_contacts_page() {
    let (server, provider) = common::setup_provider().await;
    common::mount_page(&server, "/Contacts", 1, common::contacts(1, 3)).await;

    let page = provider
        .fetch_page(&common::grant(), EntityKind::Customers, 1, 1000)
        .await
        .expect("fetch failed");

    assert_eq!(page.page, 1);
    assert_eq!(page.raw_count, 3);
    assert!(!page.is_exhausted());
    match page.records {
        RecordBatch::Customers(customers) => {
            assert_eq!(customers.len(), 3);
            assert_eq!(customers[0].external_id.as_str(), "c-1-0");
            assert!(customers[2].is_customer);
        }
        other => panic!("expected customers, got {:?}", other.kind()),
    }
}

#[tokio::test]
async fn test_fetch_sends_page_size() {
    let (server, provider) = common::setup_provider().await;
    Mock::given(method("GET"))
        .and(path("/Contacts"))
        .and(query_param("page", "2"))
        .and(query_param("pageSize", "250"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::contacts(2, 1)))
        .expect(1)
        .mount(&server)
        .await;

    let page = provider
        .fetch_page(&common::grant(), EntityKind::Customers, 2, 250)
        .await
        .unwrap();
    assert_eq!(page.raw_count, 1);
}

#[tokio::test]
async fn test_empty_page_is_exhausted() {
    let (server, provider) = common::setup_provider().await;
    common::mount_page(&server, "/Contacts", 4, json!({"Contacts": []})).await;

    let page = provider
        .fetch_page(&common::grant(), EntityKind::Customers, 4, 1000)
        .await
        .unwrap();
    assert!(page.is_exhausted());
    assert!(page.records.is_empty());
}

#[tokio::test]
async fn test_invoices_carry_where_and_order() {
    let (server, provider) = common::setup_provider().await;
    Mock::given(method("GET"))
        .and(path("/Invoices"))
        .and(query_param("where", "Status!=\"DELETED\""))
        .and(query_param("order", "UpdatedDateUTC ASC"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Invoices": [
                {
                    "InvoiceID": "inv-1",
                    "Type": "ACCREC",
                    "Status": "PAID",
                    "Contact": {"ContactID": "c-1-0"},
                    "Date": "/Date(1518685950940+0000)/",
                    "Total": "115.00",
                    "LineItems": [{"Description": "Switchboard upgrade", "LineAmount": 100}]
                },
                {
                    "InvoiceID": "inv-2",
                    "Type": "ACCREC",
                    "Status": "SOMETHING_NEW"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = provider
        .fetch_page(&common::grant(), EntityKind::Invoices, 1, 100)
        .await
        .unwrap();

    // The unknown status is skipped, but still counts as a fetched record.
    assert_eq!(page.raw_count, 2);
    assert_eq!(page.skipped(), 1);
    let RecordBatch::Invoices(invoices) = page.records else {
        panic!("expected invoices");
    };
    assert_eq!(invoices[0].status, InvoiceStatus::Paid);
    assert_eq!(invoices[0].total, 115.0);
    assert_eq!(
        invoices[0].issue_date.map(|d| d.to_string()).as_deref(),
        Some("2018-02-15")
    );
}

#[tokio::test]
async fn test_bank_transactions_filtered_client_side() {
    let (server, provider) = common::setup_provider().await;
    Mock::given(method("GET"))
        .and(path("/BankTransactions"))
        .and(query_param(
            "where",
            "(Type==\"RECEIVE\" OR Type==\"SPEND\") AND Contact.ContactID!=Guid.Empty",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "BankTransactions": [
                {"BankTransactionID": "bt-1", "Type": "RECEIVE", "Contact": {"ContactID": "c-1"}, "Total": 10},
                {"BankTransactionID": "bt-2", "Type": "RECEIVE-OVERPAYMENT", "Contact": {"ContactID": "c-1"}},
                {"BankTransactionID": "bt-3", "Type": "SPEND", "Contact": {"ContactID": "00000000-0000-0000-0000-000000000000"}}
            ]
        })))
        .mount(&server)
        .await;

    let page = provider
        .fetch_page(&common::grant(), EntityKind::BankTransactions, 1, 100)
        .await
        .unwrap();
    assert_eq!(page.raw_count, 3);
    let RecordBatch::BankTransactions(txns) = page.records else {
        panic!("expected bank transactions");
    };
    assert_eq!(txns.len(), 1);
    assert_eq!(txns[0].direction, TransactionDirection::Receive);
}

#[tokio::test]
async fn test_unauthorized_maps_to_reconnect() {
    let (server, provider) = common::setup_provider().await;
    Mock::given(method("GET"))
        .and(path("/Contacts"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "Title": "Unauthorized",
            "Status": 401,
            "Detail": "TokenExpired: token expired at 01/01/2024 00:00:00"
        })))
        .mount(&server)
        .await;

    let err = provider
        .fetch_page(&common::grant(), EntityKind::Customers, 1, 100)
        .await
        .unwrap_err();
    assert!(err.requires_reconnect());
    match err {
        ProviderError::Unauthorized { status, message } => {
            assert_eq!(status, 401);
            assert!(message.starts_with("TokenExpired"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_is_soft_http_error() {
    let (server, provider) = common::setup_provider().await;
    Mock::given(method("GET"))
        .and(path("/Invoices"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(1)
        .mount(&server)
        .await;

    let err = provider
        .fetch_page(&common::grant(), EntityKind::Invoices, 1, 100)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ProviderError::Http {
            status: 503,
            message: "maintenance".to_string()
        }
    );
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let (server, provider) = common::setup_provider().await;
    Mock::given(method("GET"))
        .and(path("/Contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = provider
        .fetch_page(&common::grant(), EntityKind::Customers, 1, 100)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Decode(_)));
}
