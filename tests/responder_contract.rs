//! Chat-completions contract tests for the API response generator.
//!
//! These verify the request shape sent to an OpenAI-compatible server and the
//! mapping of its responses and errors.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use senseguide::VoiceError;
use senseguide::config::ResponderConfig;
use senseguide::responder::api::EMPTY_REPLY;
use senseguide::responder::{ApiResponseGenerator, ResponseGenerator, TopicHint, reply_or_apologize};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> ResponderConfig {
    ResponderConfig {
        api_url: server.uri(),
        api_key: Some("test-key".to_owned()),
        timeout_secs: 5,
        ..ResponderConfig::default()
    }
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "model": "llama-3.3-70b-versatile",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

#[tokio::test]
async fn request_carries_model_auth_and_user_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "llama-3.3-70b-versatile",
            "max_tokens": 150,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("A red door.")))
        .expect(1)
        .mount(&server)
        .await;

    let generator = ApiResponseGenerator::new(config_for(&server));
    let reply = generator
        .generate("what is in front of me", TopicHint::Scene)
        .await
        .unwrap();
    assert_eq!(reply, "A red door.");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let system = body["messages"][0]["content"].as_str().unwrap();
    assert!(system.ends_with("The user has just asked to describe a scene."));
    assert_eq!(body["messages"][1]["role"], "user");
    assert_eq!(body["messages"][1]["content"], "what is in front of me");
}

#[tokio::test]
async fn empty_content_gets_fallback_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("   ")))
        .mount(&server)
        .await;

    let generator = ApiResponseGenerator::new(config_for(&server));
    let reply = generator.generate("hi", TopicHint::General).await.unwrap();
    assert_eq!(reply, EMPTY_REPLY);
}

#[tokio::test]
async fn auth_error_maps_to_response_generator_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Invalid API Key", "type": "invalid_request_error"}
        })))
        .mount(&server)
        .await;

    let generator = ApiResponseGenerator::new(config_for(&server));
    match generator.generate("hi", TopicHint::General).await {
        Err(VoiceError::ResponseGenerator(msg)) => {
            assert!(msg.contains("authentication failed"), "got: {msg}");
            assert!(msg.contains("Invalid API Key"), "got: {msg}");
        }
        other => panic!("expected ResponseGenerator error, got {other:?}"),
    }
}

#[tokio::test]
async fn server_error_degrades_to_apology() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let generator = ApiResponseGenerator::new(config_for(&server));
    let reply = reply_or_apologize(&generator, "hi", TopicHint::Text, "sorry").await;
    assert_eq!(reply, "sorry");
}

#[tokio::test]
async fn unreachable_server_is_an_error_not_a_hang() {
    let generator = ApiResponseGenerator::new(ResponderConfig {
        api_url: "http://127.0.0.1:9".to_owned(),
        timeout_secs: 2,
        ..ResponderConfig::default()
    });
    assert!(matches!(
        generator.generate("hi", TopicHint::General).await,
        Err(VoiceError::ResponseGenerator(_))
    ));
}
