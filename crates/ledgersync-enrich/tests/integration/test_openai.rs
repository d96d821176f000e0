//! Chat-completions client tests

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ledgersync_enrich::{ILanguageModel, LlmError, OpenAiClient};

use crate::common::{completion_body, API_KEY, SHORT_TIMEOUT};

fn client(server: &MockServer) -> OpenAiClient {
    OpenAiClient::new(server.uri(), API_KEY, "gpt-4o-mini", SHORT_TIMEOUT)
        .unwrap()
        .with_sampling(0.0, 256)
}

#[tokio::test]
async fn test_complete_returns_content_and_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "max_tokens": 256,
            "messages": [
                {"role": "system", "content": "sys"},
                {"role": "user", "content": "hello"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("[]", 12, 3)))
        .expect(1)
        .mount(&server)
        .await;

    let completion = client(&server).complete("sys", "hello").await.unwrap();
    assert_eq!(completion.content, "[]");
    assert_eq!(completion.usage.prompt_tokens, 12);
    assert_eq!(completion.usage.completion_tokens, 3);
}

#[tokio::test]
async fn test_rate_limit_and_http_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let client = client(&server);
    assert_eq!(client.complete("s", "u").await.unwrap_err(), LlmError::RateLimited);
    assert_eq!(
        client.complete("s", "u").await.unwrap_err(),
        LlmError::Http {
            status: 401,
            message: "bad key".to_string(),
        }
    );
}

#[tokio::test]
async fn test_missing_choices_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = client(&server).complete("s", "u").await.unwrap_err();
    assert!(matches!(err, LlmError::Parse(_)));
}
