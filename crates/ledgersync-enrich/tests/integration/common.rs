//! Shared helpers for enrichment tests

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ledgersync_core::config::EnrichmentConfig;
use ledgersync_core::domain::{ExternalId, Invoice, InvoiceStatus, InvoiceType, LineItem};
use ledgersync_core::ports::{IRecordStore, RecordBatch};
use ledgersync_enrich::{EnrichmentPipeline, OpenAiClient};
use ledgersync_store::{DatabasePool, SqliteRecordStore};

pub const API_KEY: &str = "sk-test";

pub fn id(s: &str) -> ExternalId {
    ExternalId::new(s).unwrap()
}

pub fn invoice(xero_id: &str, description: &str) -> Invoice {
    Invoice {
        external_id: id(xero_id),
        invoice_number: Some(format!("INV-{xero_id}")),
        reference: None,
        customer_id: None,
        invoice_type: InvoiceType::Receivable,
        status: InvoiceStatus::Authorised,
        currency_code: Some("NZD".to_string()),
        subtotal: 100.0,
        total_tax: 15.0,
        total: 115.0,
        total_discount: 0.0,
        amount_due: 0.0,
        amount_paid: 115.0,
        amount_credited: 0.0,
        issue_date: None,
        due_date: None,
        line_items: vec![LineItem {
            description: Some(description.to_string()),
            quantity: 1.0,
            unit_amount: 100.0,
            line_amount: 100.0,
            account_code: None,
        }],
    }
}

/// In-memory store seeded with one invoice per description, in order
pub async fn store_with(descriptions: &[&str]) -> Arc<SqliteRecordStore> {
    let pool = DatabasePool::in_memory().await.unwrap();
    let store = Arc::new(SqliteRecordStore::new(pool.pool().clone()));
    let invoices = descriptions
        .iter()
        .enumerate()
        .map(|(i, d)| invoice(&format!("inv-{i}"), d))
        .collect();
    store
        .upsert_batch(&RecordBatch::Invoices(invoices))
        .await
        .unwrap();
    store
}

/// Enrichment settings pointed at the mock server, with no delays
pub fn config(server: &MockServer) -> EnrichmentConfig {
    EnrichmentConfig {
        api_base_url: server.uri(),
        api_key: Some(API_KEY.to_string()),
        group_delay_ms: 0,
        input_cost_per_1k: 0.5,
        output_cost_per_1k: 1.5,
        ..EnrichmentConfig::default()
    }
}

pub fn pipeline(store: Arc<SqliteRecordStore>, config: &EnrichmentConfig) -> EnrichmentPipeline {
    let model = OpenAiClient::from_config(config).unwrap();
    EnrichmentPipeline::new(store, Arc::new(model), config)
}

/// Chat-completions body whose message content is `content`
pub fn completion_body(content: &str, prompt_tokens: u64, completion_tokens: u64) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": prompt_tokens,
            "completion_tokens": completion_tokens,
            "total_tokens": prompt_tokens + completion_tokens
        }
    })
}

/// Mounts a chat-completions endpoint answering `content` exactly `calls` times
pub async fn mount_completion(server: &MockServer, content: &str, calls: u64) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", format!("Bearer {API_KEY}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(content, 1000, 200)))
        .expect(calls)
        .mount(server)
        .await;
}

pub fn answer(items: &[(&str, &[&str])]) -> String {
    let items: Vec<Value> = items
        .iter()
        .map(|(d, k)| json!({"work_description": d, "service_keywords": k}))
        .collect();
    Value::Array(items).to_string()
}

pub const SHORT_TIMEOUT: Duration = Duration::from_secs(5);
