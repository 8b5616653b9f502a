//! Access tokens for Vertex AI requests.
//!
//! By default tokens come from Google Application Default Credentials
//! (service account key, metadata server, or `gcloud` user credentials).
//! A fixed token can be supplied instead.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use captioner_abstraction::GenerationError;
use gcp_auth::TokenProvider;
use tokio::sync::OnceCell;
use tracing::{debug, error};

/// OAuth2 scope required by the Vertex AI API.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Source of bearer tokens, asked once per request.
#[async_trait]
pub trait AccessTokenSource: Send + Sync + fmt::Debug {
    /// Returns a token that is valid for the next request.
    async fn access_token(&self) -> Result<String, GenerationError>;
}

/// Fixed token, typically from `VERTEX_ACCESS_TOKEN`.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    /// Wraps a pre-issued access token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticToken(<redacted>)")
    }
}

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, GenerationError> {
        Ok(self.0.clone())
    }
}

/// Tokens from Application Default Credentials.
///
/// The credential provider is discovered on first use and reused afterwards;
/// a failed discovery is retried by the next request. Token caching and
/// refresh are handled by the provider.
#[derive(Default)]
pub struct ApplicationDefaultCredentials {
    provider: OnceCell<Arc<dyn TokenProvider>>,
}

impl ApplicationDefaultCredentials {
    /// Creates a source that discovers credentials lazily.
    pub fn new() -> Self {
        Self::default()
    }

    async fn provider(&self) -> Result<&Arc<dyn TokenProvider>, GenerationError> {
        self.provider.get_or_try_init(gcp_auth::provider).await.map_err(|e| {
            error!(error = %e, "No Application Default Credentials found");
            GenerationError::Authentication(format!("Application Default Credentials: {e}"))
        })
    }
}

impl fmt::Debug for ApplicationDefaultCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationDefaultCredentials")
            .field("initialized", &self.provider.initialized())
            .finish()
    }
}

#[async_trait]
impl AccessTokenSource for ApplicationDefaultCredentials {
    async fn access_token(&self) -> Result<String, GenerationError> {
        let provider = self.provider().await?;
        let token = provider.token(&[CLOUD_PLATFORM_SCOPE]).await.map_err(|e| {
            error!(error = %e, "Failed to obtain access token");
            GenerationError::Authentication(format!("Failed to obtain access token: {e}"))
        })?;

        debug!(scope = CLOUD_PLATFORM_SCOPE, "Obtained access token");
        Ok(token.as_str().to_string())
    }
}
