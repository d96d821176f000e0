//! Chunk orchestrator tests

use chrono::Duration;

use ledgersync_core::domain::EntityKind;
use ledgersync_core::ports::{IRecordStore, ProviderError, RefreshedTokens};
use ledgersync_sync::{ChunkRequest, SyncError};

use crate::common::{
    connected_harness, connection, harness, user, FixedEndpoint, Script, STORED_TOKEN,
};

fn from_page_one() -> ChunkRequest {
    ChunkRequest {
        start_customer_page: Some(1),
        start_invoice_page: Some(1),
        start_bank_transaction_page: Some(1),
        ..ChunkRequest::default()
    }
}

#[tokio::test]
async fn test_pages_until_empty_page() {
    let h = connected_harness(5).await;
    h.provider.pages(EntityKind::Customers, &[1000, 1000, 400]);

    let response = h.orchestrator.run_chunk(&from_page_one()).await.unwrap();

    assert!(response.success);
    assert_eq!(response.total_customers, 2400);
    assert!(!response.has_more);
    assert_eq!(response.next_start_page, None);
    assert_eq!(h.provider.calls_for(EntityKind::Customers), vec![1, 2, 3, 4]);
    assert_eq!(h.store.counts().await.unwrap().customers, 2400);

    let cursor = h
        .store
        .load_cursor(&user(), EntityKind::Customers)
        .await
        .unwrap()
        .unwrap();
    assert!(cursor.is_finished());
    assert_eq!(cursor.written, 2400);
}

#[tokio::test]
async fn test_entities_processed_in_fixed_order() {
    let h = connected_harness(5).await;

    h.orchestrator.run_chunk(&from_page_one()).await.unwrap();

    assert_eq!(
        h.provider.kinds_called(),
        vec![
            EntityKind::Customers,
            EntityKind::Invoices,
            EntityKind::BankTransactions
        ]
    );
}

#[tokio::test]
async fn test_page_bound_yields_continuation() {
    let h = connected_harness(2).await;
    h.provider.pages(EntityKind::Customers, &[10, 10, 10]);

    let response = h.orchestrator.run_chunk(&from_page_one()).await.unwrap();

    assert!(response.has_more);
    assert_eq!(response.total_customers, 20);
    assert_eq!(response.next_start_page, Some(3));
    assert_eq!(response.next_invoice_page, None);
    assert_eq!(h.provider.calls_for(EntityKind::Customers), vec![1, 2]);
}

#[tokio::test]
async fn test_resume_from_stored_cursor_matches_uninterrupted_run() {
    let interrupted = connected_harness(2).await;
    interrupted.provider.pages(EntityKind::Customers, &[10, 10, 10, 5]);

    let first = interrupted.orchestrator.run_chunk(&from_page_one()).await.unwrap();
    assert_eq!(first.next_start_page, Some(3));

    // No start pages: continue from the stored cursors
    let second = interrupted
        .orchestrator
        .run_chunk(&ChunkRequest::default())
        .await
        .unwrap();
    assert_eq!(second.total_customers, 15);
    assert_eq!(second.next_start_page, Some(5));
    let third = interrupted
        .orchestrator
        .run_chunk(&ChunkRequest::default())
        .await
        .unwrap();
    assert!(!third.has_more);

    let uninterrupted = connected_harness(10).await;
    uninterrupted.provider.pages(EntityKind::Customers, &[10, 10, 10, 5]);
    uninterrupted.orchestrator.run_chunk(&from_page_one()).await.unwrap();

    assert_eq!(
        interrupted.store.counts().await.unwrap(),
        uninterrupted.store.counts().await.unwrap()
    );
    assert_eq!(
        interrupted.provider.calls_for(EntityKind::Customers),
        vec![1, 2, 3, 4, 5]
    );
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let h = connected_harness(5).await;
    h.provider.pages(EntityKind::Customers, &[7, 3]);

    h.orchestrator.run_chunk(&from_page_one()).await.unwrap();
    h.orchestrator.run_chunk(&from_page_one()).await.unwrap();

    assert_eq!(h.store.counts().await.unwrap().customers, 10);
}

#[tokio::test]
async fn test_explicit_start_page_wins_over_cursor() {
    let h = connected_harness(1).await;
    h.provider.pages(EntityKind::Customers, &[5, 5, 5]);

    h.orchestrator.run_chunk(&from_page_one()).await.unwrap();
    let request = ChunkRequest {
        start_customer_page: Some(3),
        ..ChunkRequest::default()
    };
    let response = h.orchestrator.run_chunk(&request).await.unwrap();

    assert_eq!(h.provider.calls_for(EntityKind::Customers), vec![1, 3]);
    assert_eq!(response.next_start_page, Some(4));
}

#[tokio::test]
async fn test_zero_max_pages_skips_entity() {
    let h = connected_harness(5).await;
    let request = ChunkRequest {
        max_invoice_pages: Some(0),
        ..from_page_one()
    };

    let response = h.orchestrator.run_chunk(&request).await.unwrap();

    assert!(h.provider.calls_for(EntityKind::Invoices).is_empty());
    assert_eq!(response.next_invoice_page, None);
    assert!(!response.has_more);
    assert!(response.progress.iter().any(|l| l == "invoices: skipped"));
    assert!(h
        .store
        .load_cursor(&user(), EntityKind::Invoices)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_rate_limit_stops_entity_and_keeps_cursor() {
    let h = connected_harness(5).await;
    h.provider.script(EntityKind::Customers, 1, Script::Records(10));
    h.provider.script(
        EntityKind::Customers,
        2,
        Script::Fail(ProviderError::RateLimited { attempts: 5 }),
    );

    let response = h.orchestrator.run_chunk(&from_page_one()).await.unwrap();

    assert!(response.success);
    assert!(response.rate_limited);
    assert!(response.has_more);
    assert_eq!(response.total_customers, 10);
    assert_eq!(response.next_start_page, Some(2));
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].entity, EntityKind::Customers);
    assert!(response.progress.iter().any(|l| l.contains("try later")));

    // Invoices and bank transactions still ran
    assert_eq!(h.provider.calls_for(EntityKind::Invoices), vec![1]);

    let cursor = h
        .store
        .load_cursor(&user(), EntityKind::Customers)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cursor.resume_page(), 2);
}

#[tokio::test]
async fn test_http_error_is_soft_stop() {
    let h = connected_harness(5).await;
    h.provider.script(
        EntityKind::Invoices,
        1,
        Script::Fail(ProviderError::Http {
            status: 503,
            message: "unavailable".to_string(),
        }),
    );

    let response = h.orchestrator.run_chunk(&from_page_one()).await.unwrap();

    assert!(!response.rate_limited);
    assert!(response.has_more);
    assert_eq!(response.next_invoice_page, Some(1));
    assert_eq!(response.next_start_page, None);
    assert_eq!(response.errors[0].page, 1);
}

#[tokio::test]
async fn test_unauthorized_requires_reconnect() {
    let h = connected_harness(5).await;
    h.provider.script(
        EntityKind::Customers,
        1,
        Script::Fail(ProviderError::Unauthorized {
            status: 401,
            message: "token expired".to_string(),
        }),
    );

    let err = h.orchestrator.run_chunk(&from_page_one()).await.unwrap_err();
    assert!(matches!(err, SyncError::ReconnectRequired(_)));
    assert!(err.is_auth());
    assert!(h.provider.calls_for(EntityKind::Invoices).is_empty());
}

#[tokio::test]
async fn test_not_connected_without_credentials() {
    let h = harness(5, FixedEndpoint(Err(ProviderError::Network("unused".into())))).await;

    let err = h.orchestrator.run_chunk(&from_page_one()).await.unwrap_err();
    assert!(matches!(err, SyncError::NotConnected));
    assert!(h.provider.tokens_used().is_empty());
}

#[tokio::test]
async fn test_inline_credentials_bypass_stored_connection() {
    let h = harness(5, FixedEndpoint(Err(ProviderError::Network("unused".into())))).await;
    let request = ChunkRequest {
        access_token: Some("inline-token".to_string()),
        tenant_id: Some("tenant-9".to_string()),
        ..from_page_one()
    };

    h.orchestrator.run_chunk(&request).await.unwrap();
    assert!(h.provider.tokens_used().iter().all(|t| t == "inline-token"));
}

#[tokio::test]
async fn test_expiring_token_is_refreshed_before_fetching() {
    let h = harness(
        5,
        FixedEndpoint(Ok(RefreshedTokens {
            access_token: "fresh-token".to_string(),
            refresh_token: Some("refresh-2".to_string()),
            expires_in: 1800,
        })),
    )
    .await;
    h.store
        .save_connection(&connection(Duration::minutes(2)))
        .await
        .unwrap();

    h.orchestrator.run_chunk(&from_page_one()).await.unwrap();

    let used = h.provider.tokens_used();
    assert!(!used.is_empty());
    assert!(used.iter().all(|t| t == "fresh-token"));
    assert!(!used.iter().any(|t| t == STORED_TOKEN));
}

#[tokio::test]
async fn test_refresh_failure_requires_reconnect() {
    let h = harness(
        5,
        FixedEndpoint(Err(ProviderError::Unauthorized {
            status: 400,
            message: "invalid_grant".to_string(),
        })),
    )
    .await;
    h.store
        .save_connection(&connection(Duration::minutes(1)))
        .await
        .unwrap();

    let err = h.orchestrator.run_chunk(&from_page_one()).await.unwrap_err();
    assert!(matches!(err, SyncError::ReconnectRequired(_)));
}

#[tokio::test]
async fn test_store_failure_is_fatal() {
    let h = harness(5, FixedEndpoint(Err(ProviderError::Network("unused".into())))).await;
    h.provider.pages(EntityKind::Customers, &[3]);
    h.pool.close().await;

    let request = ChunkRequest {
        access_token: Some("inline-token".to_string()),
        tenant_id: Some("tenant-9".to_string()),
        ..from_page_one()
    };
    let err = h.orchestrator.run_chunk(&request).await.unwrap_err();
    assert!(matches!(err, SyncError::Store(_)));
    assert!(!err.is_auth());
}

#[tokio::test]
async fn test_last_page_number_is_rejected_before_fetching() {
    let h = connected_harness(5).await;
    h.provider.pages(EntityKind::Customers, &[3]);
    let request = ChunkRequest {
        start_invoice_page: Some(u32::MAX),
        ..from_page_one()
    };

    let err = h.orchestrator.run_chunk(&request).await.unwrap_err();
    assert!(matches!(err, SyncError::InvalidRequest(_)), "{err}");
    assert!(!err.is_auth());
    assert!(h.provider.calls_for(EntityKind::Customers).is_empty());
    assert!(h.provider.calls_for(EntityKind::Invoices).is_empty());
}
