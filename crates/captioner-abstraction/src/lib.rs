//! Generation client abstraction for Captioner.
//!
//! This module defines the core trait and types for turning a media reference
//! plus an instruction into generated text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// MIME type used when a locator carries no recognizable media extension.
pub const DEFAULT_MEDIA_MIME_TYPE: &str = "image/jpeg";

/// Represents an error that can occur when calling the generation service.
///
/// Every variant except `Configuration` describes a failed remote call. All of
/// them are reported to batch callers the same way.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationError {
    /// Required deployment identifiers (project, region) were not supplied.
    #[error("Configuration Error: {0}")]
    Configuration(String),

    /// The request could not be delivered (e.g., DNS, connection reset).
    #[error("Request Error: {0}")]
    RequestError(String),

    /// The service rejected our credentials.
    #[error("Authentication Error: {0}")]
    Authentication(String),

    /// Provider quota exceeded or rate limit hit.
    #[error("Provider '{provider}' quota exceeded{}", message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default())]
    QuotaExceeded {
        /// The provider name (e.g., "vertex").
        provider: String,
        /// Optional error message from the provider.
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// The service answered with an error or an unusable response.
    #[error("Model Response Error: {0}")]
    ModelResponseError(String),

    /// The prompt or the candidate was blocked by content-safety filtering.
    #[error("Content Blocked: {0}")]
    Blocked(String),

    /// An error occurred during serialization or deserialization.
    #[error("Serialization Error: {0}")]
    SerializationError(String),
}

impl GenerationError {
    /// Returns true when the failure comes from local configuration rather than the remote call.
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// A reference to remote media the service fetches itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPart {
    /// The resource URI (e.g., `gs://bucket/a.jpg`, `https://host/b.png`).
    pub uri: String,
    /// The MIME type announced to the service.
    pub mime_type: String,
}

impl MediaPart {
    /// Creates a media part with an explicit MIME type.
    #[must_use]
    pub fn new(uri: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self { uri: uri.into(), mime_type: mime_type.into() }
    }

    /// Creates a media part from a locator, guessing the MIME type from its extension.
    ///
    /// Falls back to [`DEFAULT_MEDIA_MIME_TYPE`] when the extension is unknown
    /// or does not name an image, audio, video or PDF resource.
    #[must_use]
    pub fn from_locator(locator: &str) -> Self {
        Self { uri: locator.to_string(), mime_type: guess_media_type(locator).to_string() }
    }
}

fn guess_media_type(locator: &str) -> &'static str {
    let path = locator.split(['?', '#']).next().unwrap_or(locator);

    mime_guess::from_path(path)
        .first_raw()
        .filter(|mime| {
            mime.starts_with("image/")
                || mime.starts_with("video/")
                || mime.starts_with("audio/")
                || *mime == "application/pdf"
        })
        .unwrap_or(DEFAULT_MEDIA_MIME_TYPE)
}

/// Parameters applied uniformly to every call of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// The maximum number of tokens to generate.
    pub max_output_tokens: u32,

    /// Sampling temperature.
    pub temperature: f32,

    /// Nucleus sampling probability mass.
    pub top_p: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self { max_output_tokens: 8192, temperature: 1.0, top_p: 0.95 }
    }
}

/// The response from a single generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// The generated text.
    pub text: String,

    /// Optional: The ID of the model that produced the text.
    pub model_id: Option<String>,

    /// Optional: Usage statistics for the request.
    pub usage: Option<GenerationUsage>,
}

impl GenerationResponse {
    /// Creates a response carrying only text.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), model_id: None, usage: None }
    }
}

/// Usage statistics for a generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationUsage {
    /// Number of tokens in the prompt, media included.
    pub prompt_tokens: u32,

    /// Number of tokens in the candidate.
    pub completion_tokens: u32,

    /// Total number of tokens used.
    pub total_tokens: u32,
}

/// A handle to a multimodal generation service.
///
/// Implementations must be `Send + Sync`: one handle is shared by every
/// in-flight call of a batch, and by concurrent batches.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generates text for one media reference and instruction.
    ///
    /// # Arguments
    /// * `media` - The media the service should look at
    /// * `instruction` - The text sent alongside the media
    /// * `config` - Sampling and length parameters
    ///
    /// # Errors
    /// Returns a `GenerationError` if the call fails for any reason.
    async fn generate(
        &self,
        media: &MediaPart,
        instruction: &str,
        config: &GenerationConfig,
    ) -> Result<GenerationResponse, GenerationError>;

    /// Returns the ID of the model this client is bound to.
    fn model_id(&self) -> &str;
}
