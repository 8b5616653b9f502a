//! HTTP trigger for batch requests.
//!
//! Accepts `{"calls": [[locator, instruction], ...]}` and answers with
//! `{"replies": [...]}` (200) or `{"errorMessage": "..."}` (400).

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use captioner_orchestrator::{BatchDispatcher, BatchPhase};
use serde::Serialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::Result;

/// Body of a trigger response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TriggerResponse {
    /// One reply per call, in request order.
    Replies {
        /// Generated texts.
        replies: Vec<String>,
    },
    /// The batch failed as a whole.
    Error {
        /// Description of the failure.
        #[serde(rename = "errorMessage")]
        error_message: String,
    },
}

impl TriggerResponse {
    /// HTTP status paired with this body.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Replies { .. } => StatusCode::OK,
            Self::Error { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for TriggerResponse {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Decode and run one request body.
///
/// Transport independent: used by the HTTP route and the `once` command.
pub async fn handle_request(dispatcher: &BatchDispatcher, body: &[u8]) -> TriggerResponse {
    let response = match dispatcher.run_body(body).await {
        Ok(replies) => TriggerResponse::Replies { replies },
        Err(err) => {
            warn!(error = %err, "Batch request failed");
            TriggerResponse::Error { error_message: err.to_string() }
        }
    };

    info!(phase = %BatchPhase::Completed, status = %response.status(), "Batch response ready");
    response
}

async fn run_batch(State(dispatcher): State<BatchDispatcher>, body: Bytes) -> TriggerResponse {
    handle_request(&dispatcher, &body).await
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

/// Build the HTTP router around a dispatcher.
///
/// Request bodies are not size-limited: batch size is bounded by the caller.
pub fn router(dispatcher: BatchDispatcher) -> Router {
    Router::new()
        .route("/", post(run_batch))
        .route("/run", post(run_batch))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(dispatcher)
}

/// Serve the HTTP trigger until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve(config: &AppConfig, dispatcher: BatchDispatcher) -> Result<()> {
    let addr = config.listen_address();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(%addr, model_id = %dispatcher.model_id(), "Starting Captioner HTTP trigger");

    axum::serve(listener, router(dispatcher)).with_graceful_shutdown(shutdown_signal()).await?;

    info!("Captioner HTTP trigger stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
