//! Google Gemini on Vertex AI.
//!
//! This module provides an implementation of the `GenerationClient` trait for
//! the Vertex AI `generateContent` REST endpoint.

use async_trait::async_trait;
use captioner_abstraction::{
    GenerationClient, GenerationConfig, GenerationError, GenerationResponse, GenerationUsage,
    MediaPart,
};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

use crate::auth::{AccessTokenSource, ApplicationDefaultCredentials, StaticToken};

/// Model used when none is configured.
pub const DEFAULT_MODEL_ID: &str = "gemini-1.5-flash-002";

/// Finish reasons that mean the candidate was withheld by safety filtering.
const BLOCKING_FINISH_REASONS: &[&str] =
    &["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII", "RECITATION", "IMAGE_SAFETY"];

/// Deployment identity of the Vertex AI model.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct VertexSettings {
    /// Google Cloud project hosting the model.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Vertex AI location (e.g., "europe-west1").
    #[serde(default)]
    pub region: Option<String>,
    /// Publisher model ID.
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// Fixed OAuth2 access token. When unset, tokens come from
    /// Application Default Credentials.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Origin override for the regional endpoint (e.g., a local test server).
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

impl Default for VertexSettings {
    fn default() -> Self {
        Self {
            project_id: None,
            region: None,
            model_id: default_model_id(),
            access_token: None,
            endpoint: None,
        }
    }
}

impl fmt::Debug for VertexSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VertexSettings")
            .field("project_id", &self.project_id)
            .field("region", &self.region)
            .field("model_id", &self.model_id)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Gemini client bound to one project, region and model.
///
/// Construction never fails. Missing project or region is reported by the
/// first call as `GenerationError::Configuration`.
#[derive(Debug, Clone)]
pub struct VertexGeminiClient {
    settings: VertexSettings,
    /// HTTP client for making requests.
    client: Client,
    tokens: Arc<dyn AccessTokenSource>,
}

impl VertexGeminiClient {
    /// Creates a new client from deployment settings.
    ///
    /// Uses `settings.access_token` when present, Application Default
    /// Credentials otherwise.
    #[must_use]
    pub fn new(settings: VertexSettings) -> Self {
        let tokens: Arc<dyn AccessTokenSource> = match settings.access_token.as_deref() {
            Some(token) if !token.trim().is_empty() => Arc::new(StaticToken::new(token)),
            _ => Arc::new(ApplicationDefaultCredentials::new()),
        };
        Self::with_token_source(settings, tokens)
    }

    /// Creates a client that asks `tokens` for a bearer token on every call.
    #[must_use]
    pub fn with_token_source(settings: VertexSettings, tokens: Arc<dyn AccessTokenSource>) -> Self {
        Self { settings, client: Client::new(), tokens }
    }

    /// Returns the settings this client was built from.
    pub fn settings(&self) -> &VertexSettings {
        &self.settings
    }

    /// Builds the `generateContent` URL, validating the deployment identity.
    fn generate_url(&self) -> Result<String, GenerationError> {
        let project = required(self.settings.project_id.as_deref(), "PROJECT_ID")?;
        let region = required(self.settings.region.as_deref(), "REGION")?;

        let origin = self.settings.endpoint.as_deref().map_or_else(
            || format!("https://{region}-aiplatform.googleapis.com"),
            |endpoint| endpoint.trim_end_matches('/').to_string(),
        );

        Ok(format!(
            "{origin}/v1/projects/{project}/locations/{region}/publishers/google/models/{}:generateContent",
            self.settings.model_id
        ))
    }

    fn build_request(
        media: &MediaPart,
        instruction: &str,
        config: &GenerationConfig,
    ) -> VertexRequest {
        VertexRequest {
            contents: vec![VertexContent {
                role: "user".to_string(),
                parts: vec![
                    VertexPart::FileData {
                        file_data: VertexFileData {
                            mime_type: media.mime_type.clone(),
                            file_uri: media.uri.clone(),
                        },
                    },
                    VertexPart::Text { text: instruction.to_string() },
                ],
            }],
            generation_config: VertexGenerationConfig {
                max_output_tokens: config.max_output_tokens,
                temperature: config.temperature,
                top_p: config.top_p,
            },
        }
    }

    fn extract_response(&self, response: VertexResponse) -> Result<GenerationResponse, GenerationError> {
        if let Some(reason) = response.prompt_feedback.as_ref().and_then(|f| f.block_reason.as_ref()) {
            let detail = response
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason_message.as_deref())
                .map(|m| format!(" ({m})"))
                .unwrap_or_default();
            error!(block_reason = %reason, "Vertex AI blocked the prompt");
            return Err(GenerationError::Blocked(format!("prompt blocked: {reason}{detail}")));
        }

        let candidate = response.candidates.first().ok_or_else(|| {
            error!("No candidates in Vertex AI response");
            GenerationError::ModelResponseError("No candidates in API response".to_string())
        })?;

        let text: String = candidate
            .content
            .iter()
            .flat_map(|content| content.parts.iter())
            .filter_map(|part| part.text.as_deref())
            .collect();

        if text.is_empty() {
            return Err(match candidate.finish_reason.as_deref() {
                Some(reason) if BLOCKING_FINISH_REASONS.contains(&reason) => {
                    GenerationError::Blocked(format!("candidate finished with {reason}"))
                }
                _ => GenerationError::ModelResponseError(
                    "No text content in API response".to_string(),
                ),
            });
        }

        let usage = response.usage_metadata.map(|meta| GenerationUsage {
            prompt_tokens: meta.prompt_token_count.unwrap_or(0),
            completion_tokens: meta.candidates_token_count.unwrap_or(0),
            total_tokens: meta.total_token_count.unwrap_or(0),
        });

        Ok(GenerationResponse { text, model_id: Some(self.settings.model_id.clone()), usage })
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, GenerationError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| GenerationError::Configuration(format!("{name} environment variable not set")))
}

/// Maps a non-success HTTP status to the matching error kind.
fn status_error(status: StatusCode, body: String) -> GenerationError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            GenerationError::Authentication(format!("API error ({status}): {body}"))
        }
        StatusCode::PAYMENT_REQUIRED | StatusCode::TOO_MANY_REQUESTS => {
            GenerationError::QuotaExceeded { provider: "vertex".to_string(), message: Some(body) }
        }
        _ => GenerationError::ModelResponseError(format!("API error ({status}): {body}")),
    }
}

#[async_trait]
impl GenerationClient for VertexGeminiClient {
    async fn generate(
        &self,
        media: &MediaPart,
        instruction: &str,
        config: &GenerationConfig,
    ) -> Result<GenerationResponse, GenerationError> {
        let url = self.generate_url()?;

        debug!(
            model_id = %self.settings.model_id,
            media_uri = %media.uri,
            mime_type = %media.mime_type,
            instruction_len = instruction.len(),
            "VertexGeminiClient generating content"
        );

        let token = self.tokens.access_token().await?;
        let body = Self::build_request(media, instruction, config);

        let response = self.client.post(&url).bearer_auth(token).json(&body).send().await.map_err(|e| {
            error!(error = %e, "Failed to send request to Vertex AI");
            GenerationError::RequestError(format!("Network error: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, "Vertex AI returned error status");
            return Err(status_error(status, error_text));
        }

        let vertex_response: VertexResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse Vertex AI response");
            GenerationError::SerializationError(format!("Failed to parse response: {}", e))
        })?;

        self.extract_response(vertex_response)
    }

    fn model_id(&self) -> &str {
        &self.settings.model_id
    }
}

// Vertex AI request/response structures

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VertexRequest {
    contents: Vec<VertexContent>,
    generation_config: VertexGenerationConfig,
}

#[derive(Debug, Serialize)]
struct VertexContent {
    role: String,
    parts: Vec<VertexPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum VertexPart {
    Text {
        text: String,
    },
    FileData {
        #[serde(rename = "fileData")]
        file_data: VertexFileData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VertexFileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VertexGenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VertexResponse {
    #[serde(default)]
    candidates: Vec<VertexCandidate>,
    prompt_feedback: Option<VertexPromptFeedback>,
    usage_metadata: Option<VertexUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VertexCandidate {
    content: Option<VertexResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VertexResponseContent {
    #[serde(default)]
    parts: Vec<VertexResponsePart>,
}

// Non-text parts are ignored rather than rejected.
#[derive(Debug, Deserialize)]
struct VertexResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VertexPromptFeedback {
    block_reason: Option<String>,
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_field_names)] // Matches API naming
struct VertexUsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
    total_token_count: Option<u32>,
}
