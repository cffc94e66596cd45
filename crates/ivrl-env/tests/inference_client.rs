//! Integration tests for the completion client
//!
//! These tests run the client against a mocked OpenAI-compatible server.

#![allow(clippy::doc_markdown)]

use std::time::{Duration, Instant};

use futures::future::join_all;
use ivrl_core::{IvrlError, Split};
use ivrl_env::{CompletionBackend, CompletionRequest, InferenceConfig, OpenAiCompletionClient};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> InferenceConfig {
    InferenceConfig {
        base_url: format!("{}/v1", server.uri()),
        model_name: "test-model".to_string(),
        api_key: "secret".to_string(),
        num_requests_for_eval: 4,
        timeout_seconds: 5,
    }
}

fn request(n: usize, split: Split) -> CompletionRequest {
    CompletionRequest {
        prompt: "<|begin_of_text|>hello".to_string(),
        n,
        max_tokens: 128,
        temperature: 0.8,
        split,
    }
}

/// Test the request body and bearer header
#[tokio::test]
async fn test_completion_request_shape() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .and(header("authorization", "Bearer secret"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "prompt": "<|begin_of_text|>hello",
            "n": 2,
            "max_tokens": 128
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cmpl-1",
            "choices": [
                {"index": 0, "text": "first"},
                {"index": 1, "text": "second"}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = OpenAiCompletionClient::new(&config(&mock_server)).unwrap();
    let completions = client.complete(request(2, Split::Train)).await.unwrap();

    assert_eq!(completions, vec!["first".to_string(), "second".to_string()]);
}

/// Test that a non-success status becomes an inference error
#[tokio::test]
async fn test_completion_error_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&mock_server)
        .await;

    let client = OpenAiCompletionClient::new(&config(&mock_server)).unwrap();
    let err = client.complete(request(1, Split::Eval)).await.unwrap_err();

    match err {
        IvrlError::Inference(msg) => {
            assert!(msg.contains("503"));
            assert!(msg.contains("overloaded"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

/// Test that a malformed body is reported, not silently empty
#[tokio::test]
async fn test_completion_malformed_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let client = OpenAiCompletionClient::new(&config(&mock_server)).unwrap();
    let result = client.complete(request(1, Split::Train)).await;

    assert!(matches!(result, Err(IvrlError::Inference(_))));
}

/// Test that an empty api key sends no authorization header
#[tokio::test]
async fn test_completion_without_api_key() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"text": "ok"}]
        })))
        .mount(&mock_server)
        .await;

    let mut cfg = config(&mock_server);
    cfg.api_key = String::new();
    let client = OpenAiCompletionClient::new(&cfg).unwrap();
    client.complete(request(1, Split::Eval)).await.unwrap();

    let received = mock_server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert!(!received[0].headers.contains_key("authorization"));
}

async fn delayed_server(delay: Duration) -> MockServer {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"choices": [{"text": "ok"}]}))
                .set_delay(delay),
        )
        .mount(&mock_server)
        .await;

    mock_server
}

/// Test that eval requests beyond `num_requests_for_eval` wait for a permit
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_eval_requests_serialized_by_limit() {
    let delay = Duration::from_millis(200);
    let mock_server = delayed_server(delay).await;

    let mut cfg = config(&mock_server);
    cfg.num_requests_for_eval = 1;
    let client = OpenAiCompletionClient::new(&cfg).unwrap();

    let started = Instant::now();
    let results = join_all((0..3).map(|_| client.complete(request(1, Split::Eval)))).await;
    let elapsed = started.elapsed();

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
    assert!(elapsed >= delay * 3, "eval requests overlapped: {elapsed:?}");
}

/// Test that train requests ignore the eval limit
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_train_requests_not_limited() {
    let delay = Duration::from_millis(300);
    let mock_server = delayed_server(delay).await;

    let mut cfg = config(&mock_server);
    cfg.num_requests_for_eval = 1;
    let client = OpenAiCompletionClient::new(&cfg).unwrap();

    let started = Instant::now();
    let results = join_all((0..3).map(|_| client.complete(request(1, Split::Train)))).await;
    let elapsed = started.elapsed();

    assert!(results.iter().all(Result::is_ok));
    assert!(elapsed < delay * 3, "train requests were serialized: {elapsed:?}");
}
