//! Enrichment pipeline tests

use wiremock::MockServer;

use ledgersync_core::ports::IRecordStore;

use crate::common::{answer, config, id, mount_completion, pipeline, store_with};

const MIXED: [&str; 10] = [
    "Install heat pump in lounge",
    "Stationery",
    "Parking",
    "Rewire kitchen circuits",
    "Travel costs",
    "Switchboard upgrade",
    "Office rent",
    "Catering",
    "Repair extractor fan",
    "Accounting",
];

#[tokio::test]
async fn test_prefilter_misses_skip_the_model() {
    let server = MockServer::start().await;
    let content = answer(&[
        ("Installed a heat pump in the lounge", &["heat pump", "install"]),
        ("Rewired kitchen circuits", &["rewire", "wiring"]),
        ("Upgraded the switchboard", &["switchboard"]),
        ("Repaired extractor fan", &["fan", "repair"]),
    ]);
    mount_completion(&server, &content, 1).await;

    let store = store_with(&MIXED).await;
    let result = pipeline(store.clone(), &config(&server))
        .enrich_batch(0, Some(50))
        .await
        .unwrap();

    assert_eq!(result.processed, 10);
    assert_eq!(result.prefiltered, 6);
    assert_eq!(result.llm_calls, 1);
    assert_eq!(result.updated, 10);
    assert!(!result.has_more);
    assert_eq!(result.next_cursor, 10);

    let stationery = store.get_invoice(&id("inv-1")).await.unwrap().unwrap();
    assert_eq!(stationery.service_keywords, Some(Vec::new()));
    assert_eq!(stationery.work_description, None);

    // Positional: the second model answer belongs to the second candidate
    let rewire = store.get_invoice(&id("inv-3")).await.unwrap().unwrap();
    assert_eq!(rewire.work_description.as_deref(), Some("Rewired kitchen circuits"));
    assert_eq!(
        rewire.service_keywords,
        Some(vec!["rewire".to_string(), "wiring".to_string()])
    );

    // Misses stay pending (empty keywords) but are behind the cursor
    assert_eq!(store.count_pending_enrichment(20).await.unwrap(), 6);
}

#[tokio::test]
async fn test_sub_batches_and_token_cost() {
    let server = MockServer::start().await;
    let one = answer(&[("Installed downlights in hallway", &["downlight"])]);
    let mut cfg = config(&server);
    cfg.sub_batch_size = 1;
    cfg.concurrency = 2;
    // 3 candidates, one per call
    mount_completion(&server, &one, 3).await;

    let store = store_with(&["Install downlights", "Fix light", "LED fitting"]).await;
    let result = pipeline(store.clone(), &cfg)
        .enrich_batch(0, None)
        .await
        .unwrap();

    assert_eq!(result.llm_calls, 3);
    assert_eq!(result.token_usage.prompt_tokens, 3000);
    assert_eq!(result.token_usage.completion_tokens, 600);
    // 3 * (1.0 * 0.5 + 0.2 * 1.5)
    assert!((result.token_usage.cost_usd - 2.4).abs() < 1e-9);
    assert_eq!(store.count_pending_enrichment(20).await.unwrap(), 0);
}

#[tokio::test]
async fn test_unparseable_answer_leaves_records_pending() {
    let server = MockServer::start().await;
    mount_completion(&server, "I could not find anything useful.", 1).await;

    let store = store_with(&["Install heat pump", "Stationery"]).await;
    let result = pipeline(store.clone(), &config(&server))
        .enrich_batch(0, None)
        .await
        .unwrap();

    assert_eq!(result.failed_sub_batches, 1);
    assert_eq!(result.updated, 1);
    let heat_pump = store.get_invoice(&id("inv-0")).await.unwrap().unwrap();
    assert_eq!(heat_pump.service_keywords, None);
    // Tokens spent on a bad answer still count
    assert_eq!(result.token_usage.prompt_tokens, 1000);
}

#[tokio::test]
async fn test_model_error_leaves_records_pending() {
    let server = MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .respond_with(wiremock::ResponseTemplate::new(500).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with(&["Install heat pump"]).await;
    let result = pipeline(store.clone(), &config(&server))
        .enrich_batch(0, None)
        .await
        .unwrap();

    assert_eq!(result.failed_sub_batches, 1);
    assert_eq!(result.updated, 0);
    assert_eq!(result.token_usage.cost_usd, 0.0);
}

#[tokio::test]
async fn test_keyset_pages_through_pending_rows() {
    let server = MockServer::start().await;
    let store = store_with(&["Stationery", "Parking", "Office rent", "Catering", "Travel"]).await;
    let pipeline = pipeline(store.clone(), &config(&server));

    let first = pipeline.enrich_batch(0, Some(2)).await.unwrap();
    assert_eq!(first.processed, 2);
    assert!(first.has_more);
    assert_eq!(first.next_cursor, 2);

    let second = pipeline.enrich_batch(first.next_cursor, Some(2)).await.unwrap();
    assert_eq!(second.next_cursor, 4);

    let third = pipeline.enrich_batch(second.next_cursor, Some(2)).await.unwrap();
    assert_eq!(third.processed, 1);
    assert!(!third.has_more);
    assert_eq!(third.next_cursor, 5);

    let empty = pipeline.enrich_batch(third.next_cursor, Some(2)).await.unwrap();
    assert_eq!(empty.processed, 0);
    assert_eq!(empty.next_cursor, 5);
}

#[tokio::test]
async fn test_run_stops_at_max_batches() {
    let server = MockServer::start().await;
    let store = store_with(&["Stationery", "Parking", "Office rent", "Catering", "Travel"]).await;
    let pipeline = pipeline(store, &config(&server));

    let summary = pipeline.run(0, Some(2), Some(2)).await.unwrap();
    assert_eq!(summary.batches, 2);
    assert_eq!(summary.processed, 4);
    assert!(summary.has_more);
    assert_eq!(summary.next_cursor, 4);

    let rest = pipeline.run(summary.next_cursor, Some(2), None).await.unwrap();
    assert_eq!(rest.processed, 1);
    assert!(!rest.has_more);
}

#[tokio::test]
async fn test_enriched_rows_are_not_reselected() {
    let server = MockServer::start().await;
    let content = answer(&[("Installed a heat pump in the lounge", &["heat pump"])]);
    mount_completion(&server, &content, 1).await;

    let store = store_with(&["Install heat pump"]).await;
    let pipeline = pipeline(store.clone(), &config(&server));
    pipeline.enrich_batch(0, None).await.unwrap();

    assert_eq!(pipeline.pending_count().await.unwrap(), 0);
    let again = pipeline.enrich_batch(0, None).await.unwrap();
    assert_eq!(again.processed, 0);
}
