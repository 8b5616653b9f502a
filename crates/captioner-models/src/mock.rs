//! Scripted generation client for tests and dry runs.

use async_trait::async_trait;
use captioner_abstraction::{
    GenerationClient, GenerationConfig, GenerationError, GenerationResponse, MediaPart,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// One call observed by a [`MockClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// The media reference that was sent.
    pub media: MediaPart,
    /// The instruction text that was sent.
    pub instruction: String,
    /// The generation parameters that were sent.
    pub config: GenerationConfig,
}

/// A mock implementation of the `GenerationClient` trait.
///
/// Replies are scripted per locator. Locators without a script are answered
/// with an echo of the instruction.
#[derive(Debug, Default)]
pub struct MockClient {
    id: String,
    replies: HashMap<String, Result<String, GenerationError>>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<RecordedCall>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockClient {
    /// Creates a new `MockClient` with the given model ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), ..Self::default() }
    }

    /// Scripts a successful reply for a locator.
    #[must_use]
    pub fn with_reply(mut self, locator: impl Into<String>, text: impl Into<String>) -> Self {
        self.replies.insert(locator.into(), Ok(text.into()));
        self
    }

    /// Scripts a failure for a locator.
    #[must_use]
    pub fn with_failure(mut self, locator: impl Into<String>, error: GenerationError) -> Self {
        self.replies.insert(locator.into(), Err(error));
        self
    }

    /// Delays the reply for a locator.
    #[must_use]
    pub fn with_delay(mut self, locator: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(locator.into(), delay);
        self
    }

    /// Returns every call received so far, in arrival order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns the highest number of calls that were in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationClient for MockClient {
    async fn generate(
        &self,
        media: &MediaPart,
        instruction: &str,
        config: &GenerationConfig,
    ) -> Result<GenerationResponse, GenerationError> {
        debug!(
            model_id = %self.id,
            media_uri = %media.uri,
            instruction_len = instruction.len(),
            "MockClient generating content"
        );

        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(RecordedCall {
            media: media.clone(),
            instruction: instruction.to_string(),
            config: *config,
        });

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(&media.uri) {
            tokio::time::sleep(*delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.replies.get(&media.uri) {
            Some(Ok(text)) => Ok(GenerationResponse {
                text: text.clone(),
                model_id: Some(self.id.clone()),
                usage: None,
            }),
            Some(Err(error)) => Err(error.clone()),
            None => Ok(GenerationResponse {
                text: format!("Mock response for: {instruction}"),
                model_id: Some(self.id.clone()),
                usage: None,
            }),
        }
    }

    fn model_id(&self) -> &str {
        &self.id
    }
}
