//! HTTP-level tests for the OpenAI-compatible backend and the invoker.

#![cfg(feature = "openai")]

use std::sync::Arc;
use std::time::Duration;

use saga_core::{AnalysisContext, ErrorKind, GenerationBackend};
use saga_inference::openai::{OpenAIBackend, OpenAIConfig};
use saga_inference::AnalysisInvoker;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "model": "test-gen",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    })
}

fn backend_for(server: &MockServer) -> OpenAIBackend {
    let config = OpenAIConfig::default()
        .with_base_url(server.uri())
        .with_api_key("test-key")
        .with_model("test-gen")
        .with_timeout_seconds(5);
    OpenAIBackend::new(config).expect("Failed to create backend")
}

#[tokio::test]
async fn test_json_mode_request_shape() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "test-gen",
            "max_tokens": 1500,
            "response_format": {"type": "json_object"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{\"events\": []}")))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let reply = backend.generate_json("system", "prompt").await.unwrap();
    assert_eq!(reply, "{\"events\": []}");
}

#[tokio::test]
async fn test_rate_limit_is_service_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "Rate limit reached", "type": "rate_limit_exceeded"}
        })))
        .mount(&server)
        .await;

    let err = backend_for(&server)
        .generate_json("s", "p")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
    assert!(err.to_string().contains("Rate limit reached"));
}

#[tokio::test]
async fn test_server_error_without_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = backend_for(&server).generate("p").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
}

#[tokio::test]
async fn test_unparseable_envelope_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = backend_for(&server).generate("p").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
}

#[tokio::test]
async fn test_empty_choices_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = backend_for(&server).generate("p").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
}

#[tokio::test]
async fn test_timeout_is_service_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("{}"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = OpenAIConfig::default()
        .with_base_url(server.uri())
        .with_timeout_seconds(1);
    let backend = OpenAIBackend::new(config).unwrap();
    let err = backend.generate("p").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
}

#[tokio::test]
async fn test_connection_refused_is_service_unavailable() {
    let config = OpenAIConfig::default()
        .with_base_url("http://127.0.0.1:1")
        .with_timeout_seconds(2);
    let backend = OpenAIBackend::new(config).unwrap();
    let err = backend.generate("p").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
}

#[tokio::test]
async fn test_health_check() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    assert!(backend_for(&server).health_check().await.unwrap());

    let down = OpenAIBackend::new(
        OpenAIConfig::default()
            .with_base_url("http://127.0.0.1:1")
            .with_timeout_seconds(2),
    )
    .unwrap();
    assert!(!down.health_check().await.unwrap());
}

#[tokio::test]
async fn test_invoker_over_http_strips_fences() {
    let server = MockServer::start().await;

    let content = "```json\n{\"events\": [{\"title\": \"Meeting\", \"characters\": [\"Alice\", \"Bob\"], \"locations\": [\"Tower\"], \"year\": 1, \"story_position\": 0}]}\n```";
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(content)))
        .expect(1)
        .mount(&server)
        .await;

    let invoker = AnalysisInvoker::new(Arc::new(backend_for(&server)));
    let out = invoker
        .invoke("Alice meets Bob at the Tower.", &AnalysisContext::default())
        .await
        .unwrap();
    assert_eq!(out.result.events.len(), 1);
    assert_eq!(out.result.events[0].characters, vec!["Alice", "Bob"]);
    assert_eq!(out.model_used, "test-gen");
}

#[tokio::test]
async fn test_invoker_over_http_rejects_prose() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(completion("Sure! Here are the events: ...")),
        )
        .mount(&server)
        .await;

    let invoker = AnalysisInvoker::new(Arc::new(backend_for(&server)));
    let err = invoker
        .invoke("text", &AnalysisContext::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
}
