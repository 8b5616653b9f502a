//! Configuration module for the Captioner server.
//!
//! Values come from built-in defaults, an optional TOML file, and environment
//! variables, in increasing order of precedence.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;

use captioner_models::{DEFAULT_MODEL_ID, VertexSettings};
use config::{Environment, File};
use serde::Deserialize;

use crate::error::Result;

/// Root configuration for the server process.
#[derive(Clone, Deserialize)]
pub struct AppConfig {
    /// The address to bind the HTTP trigger to.
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,
    /// Port override for `bind_address` (set by most serverless platforms).
    #[serde(default)]
    pub port: Option<u16>,
    /// Google Cloud project hosting the model (`PROJECT_ID`).
    #[serde(default)]
    pub project_id: Option<String>,
    /// Vertex AI location (`REGION`).
    #[serde(default)]
    pub region: Option<String>,
    /// Publisher model ID (`MODEL_ID`).
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// Fixed OAuth2 access token (`VERTEX_ACCESS_TOKEN`), overriding
    /// Application Default Credentials.
    #[serde(default)]
    pub vertex_access_token: Option<String>,
    /// Endpoint origin override (`VERTEX_ENDPOINT`).
    #[serde(default)]
    pub vertex_endpoint: Option<String>,
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: None,
            project_id: None,
            region: None,
            model_id: default_model_id(),
            vertex_access_token: None,
            vertex_endpoint: None,
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_address", &self.bind_address)
            .field("port", &self.port)
            .field("project_id", &self.project_id)
            .field("region", &self.region)
            .field("model_id", &self.model_id)
            .field("vertex_access_token", &self.vertex_access_token.as_ref().map(|_| "<redacted>"))
            .field("vertex_endpoint", &self.vertex_endpoint)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from an optional file and the process environment.
    ///
    /// Missing `PROJECT_ID` or `REGION` is not an error here; the first
    /// generation call reports it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value has the wrong type.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::load_from(file, None)
    }

    /// Same as [`AppConfig::load`], reading variables from `env` instead of the process.
    pub fn load_from(file: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings = builder.add_source(Environment::default().source(env)).build()?;

        Ok(settings.try_deserialize()?)
    }

    /// The socket address to listen on, with the port override applied.
    pub fn listen_address(&self) -> SocketAddr {
        self.port.map_or(self.bind_address, |port| SocketAddr::new(self.bind_address.ip(), port))
    }

    /// Deployment settings for the Vertex AI client.
    pub fn vertex_settings(&self) -> VertexSettings {
        VertexSettings {
            project_id: self.project_id.clone(),
            region: self.region.clone(),
            model_id: self.model_id.clone(),
            access_token: self.vertex_access_token.clone(),
            endpoint: self.vertex_endpoint.clone(),
        }
    }
}
