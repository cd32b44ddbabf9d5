//! `GeminiRestClient` against a local mock of the generative-language API.

use futures_util::StreamExt;
use serde_json::json;
use wiremock::matchers::{
    body_partial_json, header, method, path, query_param, query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

use aibridge_provider::gemini::wire::{Content, GenerateContentRequest};
use aibridge_provider::gemini::{GeminiApi, GeminiRestClient};
use aibridge_provider::{
    BridgeError, ChatInput, GeminiProvider, MemoryConfig, MemoryCredentialStore, OperationType,
    ProviderAdapter, ProviderContext,
};
use std::sync::Arc;

fn client(server: &MockServer) -> GeminiRestClient {
    GeminiRestClient::new("test-key".into(), reqwest::Client::new()).with_base_url(server.uri())
}

fn hello_request() -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content::text("user", "Hi")],
        generation_config: None,
    }
}

#[tokio::test]
async fn generate_content_posts_to_model_path_with_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-pro:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{ "role": "user", "parts": [{ "text": "Hi" }] }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Hello!" }] },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 2, "candidatesTokenCount": 2, "totalTokenCount": 4 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server)
        .generate_content("gemini-1.5-pro", &hello_request())
        .await
        .unwrap();
    assert_eq!(response.text(), "Hello!");
    assert_eq!(response.usage_metadata.unwrap().total_token_count, 4);
}

#[tokio::test]
async fn list_models_follows_page_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .and(query_param("pageSize", "1000"))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{ "name": "models/gemini-1.5-pro", "displayName": "Gemini 1.5 Pro" }],
            "nextPageToken": "page-2"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{ "name": "models/embedding-001", "displayName": "Embedding 001" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let listing = client(&server).list_models().await.unwrap();
    let names: Vec<_> = listing["models"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["models/gemini-1.5-pro", "models/embedding-001"]);
}

#[tokio::test]
async fn malformed_model_listing_is_protocol_error() {
    for body in [json!({ "unexpected": true }), json!(["models/gemini-1.5-pro"])] {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1beta/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
            .mount(&server)
            .await;

        let err = client(&server).list_models().await.unwrap_err();
        assert!(matches!(err, BridgeError::RemoteProtocol { .. }), "{body}");
    }
}

#[tokio::test]
async fn malformed_model_listing_fails_provider_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": true })))
        .mount(&server)
        .await;

    let mut provider = GeminiProvider::from_context(&ProviderContext::new(
        Arc::new(
            MemoryConfig::new()
                .with("api_key", "GEMINI_KEY")
                .with("base_url", server.uri()),
        ),
        Arc::new(MemoryCredentialStore::new().with("GEMINI_KEY", "secret")),
    ));
    let err = provider
        .list_models(Some(OperationType::Chat))
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::RemoteProtocol { .. }));
}

#[tokio::test]
async fn empty_model_listing_has_no_models() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let listing = client(&server).list_models().await.unwrap();
    assert_eq!(listing, json!({ "models": [] }));
}

#[tokio::test]
async fn stream_generate_content_decodes_sse_events() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"Hel\"}]}}]}\n\n",
        "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"lo\"}]},\"finishReason\":\"STOP\"}]}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-pro:streamGenerateContent"))
        .and(query_param("alt", "sse"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let chunks: Vec<_> = client(&server)
        .stream_generate_content("models/gemini-1.5-pro", &hello_request())
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(chunks.len(), 2);
    let first = chunks[0].as_ref().unwrap();
    let second = chunks[1].as_ref().unwrap();
    assert_eq!(first.text(), "Hel");
    assert_eq!(second.text(), "lo");
    assert_eq!(second.finish_reason(), Some("STOP"));
}

#[tokio::test]
async fn undecodable_stream_chunk_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-pro:streamGenerateContent"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string("data: {not json\n\n"),
        )
        .mount(&server)
        .await;

    let mut chunks = client(&server)
        .stream_generate_content("gemini-1.5-pro", &hello_request())
        .await
        .unwrap();
    let err = chunks.next().await.unwrap().unwrap_err();
    assert!(matches!(err, BridgeError::RemoteProtocol { .. }));
}

#[tokio::test]
async fn embed_content_sends_model_and_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/embedding-001:embedContent"))
        .and(body_partial_json(json!({
            "model": "models/embedding-001",
            "content": { "parts": [{ "text": "hello world" }] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": { "values": [0.1, 0.2, 0.3] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server)
        .embed_content("models/embedding-001", "hello world")
        .await
        .unwrap();
    assert_eq!(response.embedding.values, vec![0.1, 0.2, 0.3]);
}

#[tokio::test]
async fn http_failures_map_to_bridge_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/limited:generateContent"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/denied:generateContent"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/bad:generateContent"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "Please use a valid role: user, model." }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/garbled:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let client = client(&server);
    let request = hello_request();

    let err = client.generate_content("limited", &request).await.unwrap_err();
    assert!(matches!(err, BridgeError::RateLimited { .. }));
    assert!(err.is_retryable());

    let err = client.generate_content("denied", &request).await.unwrap_err();
    assert!(matches!(err, BridgeError::Auth { .. }));
    assert!(err.is_terminal());

    let err = client.generate_content("bad", &request).await.unwrap_err();
    assert!(err.to_string().contains("valid role"));
    assert!(!err.is_retryable());

    let err = client.generate_content("garbled", &request).await.unwrap_err();
    assert!(matches!(err, BridgeError::RemoteProtocol { .. }));
}

#[tokio::test]
async fn provider_from_context_talks_to_configured_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .and(header("x-goog-api-key", "secret-from-store"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                { "name": "models/gemini-1.5-flash", "displayName": "Gemini 1.5 Flash" },
                { "name": "models/text-embedding-004", "displayName": "Text Embedding 004" }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let ctx = ProviderContext::new(
        Arc::new(
            MemoryConfig::new()
                .with("api_key", "GEMINI_KEY")
                .with("base_url", server.uri()),
        ),
        Arc::new(MemoryCredentialStore::new().with("GEMINI_KEY", "secret-from-store")),
    );
    let mut provider = GeminiProvider::from_context(&ctx);

    let models = provider
        .list_models(Some(OperationType::Embeddings))
        .await
        .unwrap();
    assert_eq!(models.keys().collect::<Vec<_>>(), vec!["models/text-embedding-004"]);

    let output = provider
        .chat(ChatInput::from("Hi"), "models/gemini-1.5-flash")
        .await
        .unwrap();
    assert_eq!(output.text(), Some(""));
}
