//! HTTP-level tests for `VertexGeminiClient` against a local mock server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use captioner_abstraction::{GenerationClient, GenerationConfig, GenerationError, MediaPart};
use captioner_models::{AccessTokenSource, VertexGeminiClient, VertexSettings};
use mockito::{Matcher, Server};
use serde_json::json;

const GENERATE_PATH: &str =
    "/v1/projects/demo-project/locations/us-central1/publishers/google/models/gemini-test:generateContent";

fn settings_for(server: &Server) -> VertexSettings {
    VertexSettings {
        project_id: Some("demo-project".to_string()),
        region: Some("us-central1".to_string()),
        model_id: "gemini-test".to_string(),
        access_token: Some("test-token".to_string()),
        endpoint: Some(server.url()),
    }
}

fn client_for(server: &Server) -> VertexGeminiClient {
    VertexGeminiClient::new(settings_for(server))
}

fn success_body(text: &str) -> String {
    json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}, "finishReason": "STOP"}]})
        .to_string()
}

/// Issues `token-1`, `token-2`, ... like a provider refreshing short-lived tokens.
#[derive(Debug, Default)]
struct RotatingTokens {
    issued: AtomicUsize,
}

#[async_trait]
impl AccessTokenSource for RotatingTokens {
    async fn access_token(&self) -> Result<String, GenerationError> {
        Ok(format!("token-{}", self.issued.fetch_add(1, Ordering::SeqCst) + 1))
    }
}

#[derive(Debug)]
struct NoCredentials;

#[async_trait]
impl AccessTokenSource for NoCredentials {
    async fn access_token(&self) -> Result<String, GenerationError> {
        Err(GenerationError::Authentication("Application Default Credentials: not found".to_string()))
    }
}

#[tokio::test]
async fn test_generate_success() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", GENERATE_PATH)
        .match_header("authorization", "Bearer test-token")
        .match_body(Matcher::PartialJson(json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {"fileData": {"mimeType": "image/jpeg", "fileUri": "https://ex/a.jpg"}},
                    {"text": "<url>https://ex/a.jpg</url>\ndescribe"}
                ]
            }],
            "generationConfig": {"maxOutputTokens": 8192}
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "A cat."}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 270, "candidatesTokenCount": 3, "totalTokenCount": 273}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = client_for(&server);
    let response = client
        .generate(
            &MediaPart::from_locator("https://ex/a.jpg"),
            "<url>https://ex/a.jpg</url>\ndescribe",
            &GenerationConfig::default(),
        )
        .await
        .expect("generation should succeed");

    assert_eq!(response.text, "A cat.");
    assert_eq!(response.model_id.as_deref(), Some("gemini-test"));
    assert_eq!(response.usage.map(|u| u.completion_tokens), Some(3));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_generate_quota_exceeded() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", GENERATE_PATH)
        .with_status(429)
        .with_body(r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#)
        .create_async()
        .await;

    let err = client_for(&server)
        .generate(&MediaPart::from_locator("https://ex/a.jpg"), "x", &GenerationConfig::default())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        GenerationError::QuotaExceeded {
            provider: "vertex".to_string(),
            message: Some(r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#.to_string()),
        }
    );
}

#[tokio::test]
async fn test_generate_authentication_failure() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", GENERATE_PATH)
        .with_status(401)
        .with_body("invalid credentials")
        .create_async()
        .await;

    let err = client_for(&server)
        .generate(&MediaPart::from_locator("https://ex/a.jpg"), "x", &GenerationConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::Authentication(ref m) if m.contains("invalid credentials")));
}

#[tokio::test]
async fn test_generate_rejected_locator() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", GENERATE_PATH)
        .with_status(400)
        .with_body("Invalid fileUri")
        .create_async()
        .await;

    let err = client_for(&server)
        .generate(&MediaPart::from_locator("not-a-uri"), "x", &GenerationConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::ModelResponseError(ref m) if m.contains("Invalid fileUri")));
}

#[tokio::test]
async fn test_generate_unparseable_body() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", GENERATE_PATH)
        .with_status(200)
        .with_body("<html>not json</html>")
        .create_async()
        .await;

    let err = client_for(&server)
        .generate(&MediaPart::from_locator("https://ex/a.jpg"), "x", &GenerationConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::SerializationError(_)));
}

#[tokio::test]
async fn test_generate_network_failure() {
    let client = VertexGeminiClient::new(VertexSettings {
        project_id: Some("demo-project".to_string()),
        region: Some("us-central1".to_string()),
        access_token: Some("test-token".to_string()),
        endpoint: Some("http://127.0.0.1:1".to_string()),
        ..VertexSettings::default()
    });

    let err = client
        .generate(&MediaPart::from_locator("https://ex/a.jpg"), "x", &GenerationConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::RequestError(_)));
}

#[tokio::test]
async fn test_missing_region_fails_at_first_use() {
    let client = VertexGeminiClient::new(VertexSettings {
        project_id: Some("demo-project".to_string()),
        ..VertexSettings::default()
    });

    let err = client
        .generate(&MediaPart::from_locator("https://ex/a.jpg"), "x", &GenerationConfig::default())
        .await
        .unwrap_err();

    assert_eq!(err, GenerationError::Configuration("REGION environment variable not set".to_string()));
}

#[tokio::test]
async fn test_token_source_is_asked_on_every_call() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("POST", GENERATE_PATH)
        .match_header("authorization", "Bearer token-1")
        .with_status(200)
        .with_body(success_body("first"))
        .create_async()
        .await;
    let second = server
        .mock("POST", GENERATE_PATH)
        .match_header("authorization", "Bearer token-2")
        .with_status(200)
        .with_body(success_body("second"))
        .create_async()
        .await;

    let tokens = Arc::new(RotatingTokens::default());
    let client = VertexGeminiClient::with_token_source(
        VertexSettings { access_token: None, ..settings_for(&server) },
        tokens.clone(),
    );
    let media = MediaPart::from_locator("https://ex/a.jpg");

    let one = client.generate(&media, "x", &GenerationConfig::default()).await.unwrap();
    let two = client.generate(&media, "x", &GenerationConfig::default()).await.unwrap();

    assert_eq!(one.text, "first");
    assert_eq!(two.text, "second");
    assert_eq!(tokens.issued.load(Ordering::SeqCst), 2);
    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn test_token_failure_sends_no_request() {
    let mut server = Server::new_async().await;
    let mock = server.mock("POST", GENERATE_PATH).expect(0).create_async().await;

    let client = VertexGeminiClient::with_token_source(settings_for(&server), Arc::new(NoCredentials));
    let err = client
        .generate(&MediaPart::from_locator("https://ex/a.jpg"), "x", &GenerationConfig::default())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        GenerationError::Authentication("Application Default Credentials: not found".to_string())
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_configuration_error_precedes_token_lookup() {
    let tokens = Arc::new(RotatingTokens::default());
    let client = VertexGeminiClient::with_token_source(VertexSettings::default(), tokens.clone());

    let err = client
        .generate(&MediaPart::from_locator("https://ex/a.jpg"), "x", &GenerationConfig::default())
        .await
        .unwrap_err();

    assert!(err.is_configuration());
    assert_eq!(tokens.issued.load(Ordering::SeqCst), 0);
}
