//! Captioner server.
//!
//! Wires configuration, logging and the generation client into the HTTP
//! trigger that fronts the batch dispatcher.

pub mod config;
pub mod error;
pub mod logging;
pub mod server;

use std::sync::Arc;

use captioner_abstraction::GenerationClient;
use captioner_models::{MockClient, VertexGeminiClient};
use captioner_orchestrator::BatchDispatcher;

pub use config::AppConfig;
pub use error::{Result, ServerError};
pub use server::{TriggerResponse, handle_request, router, serve};

/// Build the dispatcher with its process-wide client.
///
/// `mock` swaps the Vertex AI client for the echoing [`MockClient`].
pub fn build_dispatcher(config: &AppConfig, mock: bool) -> BatchDispatcher {
    let client: Arc<dyn GenerationClient> = if mock {
        Arc::new(MockClient::new(format!("mock-{}", config.model_id)))
    } else {
        Arc::new(VertexGeminiClient::new(config.vertex_settings()))
    };

    BatchDispatcher::new(client)
}
