//! HTTP trigger tests driven through the axum router.

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use captioner_abstraction::GenerationError;
use captioner_models::{MockClient, VertexGeminiClient, VertexSettings};
use captioner_orchestrator::BatchDispatcher;
use captioner_server::router;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;

const TWO_CALLS: &str =
    r#"{"calls": [["https://ex/a.jpg","describe"], ["https://ex/b.jpg","count objects"]]}"#;

async fn post(dispatcher: BatchDispatcher, uri: &str, body: impl Into<Body>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();

    let response = router(dispatcher).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn scripted() -> MockClient {
    MockClient::new("mock")
        .with_reply("https://ex/a.jpg", "A cat.")
        .with_reply("https://ex/b.jpg", "Three apples.")
}

#[tokio::test]
async fn test_successful_batch_returns_replies() {
    let dispatcher = BatchDispatcher::new(Arc::new(scripted()));

    let (status, body) = post(dispatcher, "/", TWO_CALLS).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"replies": ["A cat.", "Three apples."]}));
}

#[tokio::test]
async fn test_run_route_is_equivalent() {
    let dispatcher = BatchDispatcher::new(Arc::new(scripted()));

    let (status, body) = post(dispatcher, "/run", TWO_CALLS).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["replies"][1], "Three apples.");
}

#[tokio::test]
async fn test_failed_item_returns_single_error() {
    let client = MockClient::new("mock").with_reply("https://ex/a.jpg", "A cat.").with_failure(
        "https://ex/b.jpg",
        GenerationError::RequestError("Network error: connection reset".to_string()),
    );

    let (status, body) = post(BatchDispatcher::new(Arc::new(client)), "/", TWO_CALLS).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"errorMessage": "Item 1 failed: Request Error: Network error: connection reset"})
    );
    assert!(body.get("replies").is_none());
}

#[tokio::test]
async fn test_empty_batch_returns_empty_replies() {
    let client = Arc::new(MockClient::new("mock"));

    let (status, body) = post(BatchDispatcher::new(client.clone()), "/", r#"{"calls": []}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"replies": []}));
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_malformed_bodies_return_error_object() {
    for body in ["", "{not json", r#"{"rows": []}"#, r#"{"calls": [["only-locator"]]}"#] {
        let client = Arc::new(MockClient::new("mock"));
        let (status, response) = post(BatchDispatcher::new(client.clone()), "/", body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
        let message = response["errorMessage"].as_str().unwrap();
        assert!(message.starts_with("Malformed batch:"), "message: {message}");
        assert!(client.calls().is_empty());
    }
}

#[tokio::test]
async fn test_missing_project_is_reported_per_request() {
    let client = VertexGeminiClient::new(VertexSettings { region: Some("us-central1".to_string()), ..VertexSettings::default() });

    let (status, body) = post(BatchDispatcher::new(Arc::new(client)), "/", TWO_CALLS).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"errorMessage": "Item 0 failed: Configuration Error: PROJECT_ID environment variable not set"})
    );
}

#[tokio::test]
async fn test_batch_larger_than_two_mebibytes_is_accepted() {
    let calls: Vec<Value> = (0..12_000)
        .map(|i| json!([format!("https://ex/{i:05}.jpg"), "describe the scene in this picture in detail"]))
        .collect();
    let body = json!({ "calls": calls }).to_string();
    assert!(body.len() > 2 * 1024 * 1024, "body is only {} bytes", body.len());

    let mut client = MockClient::new("mock");
    for i in 0..12_000 {
        client = client.with_reply(format!("https://ex/{i:05}.jpg"), format!("reply-{i}"));
    }
    let client = Arc::new(client);

    let (status, response) = post(BatchDispatcher::new(client.clone()), "/", body).await;

    assert_eq!(status, StatusCode::OK);
    let replies = response["replies"].as_array().unwrap();
    assert_eq!(replies.len(), 12_000);
    assert_eq!(replies[0], "reply-0");
    assert_eq!(replies[11_999], "reply-11999");
    assert_eq!(client.calls().len(), 12_000);
}

#[tokio::test]
async fn test_health() {
    let dispatcher = BatchDispatcher::new(Arc::new(MockClient::new("mock")));
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let response = router(dispatcher).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
