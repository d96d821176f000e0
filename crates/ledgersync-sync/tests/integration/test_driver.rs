//! Sync driver tests

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use ledgersync_core::domain::{EntityKind, SyncCursor};
use ledgersync_core::ports::{IRecordStore, ProviderError};
use ledgersync_sync::{DriverOptions, DriverOutcome, ProgressThrottle, SyncDriver};

use crate::common::{connected_harness, user, Script};

fn driver(h: &crate::common::Harness) -> SyncDriver {
    SyncDriver::new(h.orchestrator.clone()).with_throttle(ProgressThrottle::new(Duration::ZERO))
}

#[tokio::test]
async fn test_runs_chunks_until_complete() {
    let h = connected_harness(1).await;
    h.provider.pages(EntityKind::Customers, &[10, 10, 10]);

    let summary = driver(&h)
        .run(&DriverOptions::default(), &CancellationToken::new())
        .await;

    assert_eq!(summary.outcome, DriverOutcome::Completed);
    assert!(summary.is_success());
    assert_eq!(summary.invocations, 4);
    assert_eq!(summary.totals.customers, 30);
    assert_eq!(h.provider.calls_for(EntityKind::Customers), vec![1, 2, 3, 4]);
    // Finished entities are not fetched again
    assert_eq!(h.provider.calls_for(EntityKind::Invoices), vec![1]);
    assert_eq!(h.store.counts().await.unwrap().customers, 30);
}

#[tokio::test]
async fn test_cancelled_before_first_chunk() {
    let h = connected_harness(1).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = driver(&h).run(&DriverOptions::default(), &cancel).await;

    assert_eq!(summary.outcome, DriverOutcome::Cancelled);
    assert_eq!(summary.invocations, 0);
    assert!(h.provider.kinds_called().is_empty());
}

#[tokio::test]
async fn test_persistent_rate_limit_stalls() {
    let h = connected_harness(5).await;
    h.provider.script(
        EntityKind::Customers,
        1,
        Script::Fail(ProviderError::RateLimited { attempts: 5 }),
    );

    let summary = driver(&h)
        .run(&DriverOptions::default(), &CancellationToken::new())
        .await;

    assert_eq!(summary.outcome, DriverOutcome::Stalled);
    assert_eq!(summary.invocations, 1);
    assert!(summary.rate_limited);
    assert_eq!(summary.errors.len(), 1);
}

#[tokio::test]
async fn test_reconnect_required_fails_run() {
    let h = connected_harness(5).await;
    h.provider.script(
        EntityKind::Customers,
        1,
        Script::Fail(ProviderError::Unauthorized {
            status: 403,
            message: "forbidden".to_string(),
        }),
    );

    let summary = driver(&h)
        .run(&DriverOptions::default(), &CancellationToken::new())
        .await;

    match summary.outcome {
        DriverOutcome::Failed {
            reconnect_required, ..
        } => assert!(reconnect_required),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_resume_starts_from_stored_cursor() {
    let h = connected_harness(5).await;
    h.provider.pages(EntityKind::Customers, &[10, 10, 10]);

    let mut cursor = SyncCursor::start(EntityKind::Customers);
    cursor.advance(1, 10).unwrap();
    cursor.advance(2, 10).unwrap();
    h.store.save_cursor(&user(), &cursor).await.unwrap();

    let options = DriverOptions {
        resume: true,
        ..DriverOptions::default()
    };
    let summary = driver(&h).run(&options, &CancellationToken::new()).await;

    assert!(summary.is_success());
    assert_eq!(h.provider.calls_for(EntityKind::Customers), vec![3, 4]);
    assert_eq!(summary.totals.customers, 10);
}

#[tokio::test]
async fn test_page_size_and_limits_pass_through() {
    let h = connected_harness(5).await;
    h.provider.pages(EntityKind::Customers, &[10, 10, 10]);

    let options = DriverOptions {
        max_customer_pages: Some(2),
        max_invoice_pages: Some(0),
        max_bank_transaction_pages: Some(0),
        ..DriverOptions::default()
    };
    let summary = driver(&h).run(&options, &CancellationToken::new()).await;

    assert!(summary.is_success());
    assert_eq!(summary.invocations, 2);
    assert!(h.provider.calls_for(EntityKind::Invoices).is_empty());
    assert!(summary.progress.iter().any(|l| l == "customers: continuing from page 3"));
}
