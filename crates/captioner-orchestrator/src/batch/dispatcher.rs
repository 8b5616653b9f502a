//! Concurrent fan-out of a batch to the generation client.

use crate::batch::decoder::decode;
use crate::batch::error::BatchError;
use crate::batch::types::{Batch, BatchPhase, WorkItem};
use captioner_abstraction::{GenerationClient, GenerationConfig, GenerationError, MediaPart};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Build the instruction text sent alongside the media.
///
/// Downstream consumers parse this layout; it must stay byte-exact.
pub fn compose_instruction(locator: &str, instruction: &str) -> String {
    format!("<url>{locator}</url>\n{instruction}")
}

/// Dispatches every item of a batch as its own task against one shared client.
///
/// All tasks run to completion, even after a failure. When several items
/// fail, the error of the lowest index is returned.
#[derive(Clone)]
pub struct BatchDispatcher {
    /// Shared, read-only client used by every item task.
    client: Arc<dyn GenerationClient>,
    /// Parameters applied to every call.
    config: GenerationConfig,
}

impl fmt::Debug for BatchDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchDispatcher")
            .field("model_id", &self.client.model_id())
            .field("config", &self.config)
            .finish()
    }
}

impl BatchDispatcher {
    /// Create a dispatcher using the default generation parameters.
    pub fn new(client: Arc<dyn GenerationClient>) -> Self {
        Self { client, config: GenerationConfig::default() }
    }

    /// Replace the generation parameters.
    #[must_use]
    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    /// The generation parameters applied to every call.
    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// The model the shared client is bound to.
    pub fn model_id(&self) -> &str {
        self.client.model_id()
    }

    /// Decode a raw request body and run it.
    ///
    /// A malformed body fails before any remote call is made.
    pub async fn run_body(&self, body: &[u8]) -> Result<Vec<String>, BatchError> {
        let batch = decode(body)?;
        self.run(batch).await
    }

    /// Run a batch and return one reply per item, in input order.
    ///
    /// # Returns
    /// The replies, or the first failure by item index. No partial replies
    /// are ever returned.
    pub async fn run(&self, batch: Batch) -> Result<Vec<String>, BatchError> {
        let start_time = Instant::now();
        let total = batch.len();

        info!(
            phase = %BatchPhase::Received,
            total_items = total,
            model_id = %self.client.model_id(),
            "Starting batch"
        );

        let handles: Vec<JoinHandle<Result<String, GenerationError>>> = batch
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let client = Arc::clone(&self.client);
                let config = self.config;
                tokio::spawn(async move {
                    let result = dispatch_item(client.as_ref(), &item, &config).await;
                    debug!(index = index, success = result.is_ok(), "Batch item completed");
                    result
                })
            })
            .collect();

        debug!(phase = %BatchPhase::Dispatching, in_flight = handles.len(), "Batch items dispatched");

        // Awaiting in spawn order puts every reply at its input index.
        let mut replies = Vec::with_capacity(total);
        let mut failure: Option<BatchError> = None;
        let mut failed = 0usize;

        for (index, handle) in handles.into_iter().enumerate() {
            let outcome = match handle.await {
                Ok(Ok(text)) => {
                    replies.push(text);
                    continue;
                }
                Ok(Err(source)) => {
                    warn!(index = index, error = %source, "Batch item failed");
                    BatchError::Generation { index, source }
                }
                Err(join_error) => {
                    error!(index = index, error = %join_error, "Batch item task join error");
                    BatchError::TaskFailed { index, reason: join_error.to_string() }
                }
            };

            failed += 1;
            if failure.is_none() {
                failure = Some(outcome);
            }
        }

        let duration_ms = start_time.elapsed().as_millis();

        if let Some(err) = failure {
            info!(
                phase = %BatchPhase::AnyFailed,
                total_items = total,
                failed = failed,
                duration_ms = duration_ms,
                error = %err,
                "Batch failed"
            );
            return Err(err);
        }

        info!(
            phase = %BatchPhase::AllSucceeded,
            total_items = total,
            duration_ms = duration_ms,
            "Batch completed"
        );

        Ok(replies)
    }
}

/// Issue the single generation call for one item.
async fn dispatch_item(
    client: &dyn GenerationClient,
    item: &WorkItem,
    config: &GenerationConfig,
) -> Result<String, GenerationError> {
    let media = MediaPart::from_locator(item.locator());
    let instruction = compose_instruction(item.locator(), item.instruction());

    client.generate(&media, &instruction, config).await.map(|response| response.text)
}
