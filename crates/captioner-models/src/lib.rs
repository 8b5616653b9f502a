//! Generation client implementations for Captioner.
//!
//! This crate provides concrete implementations of the `GenerationClient` trait.
//!
//! # Supported Providers
//!
//! - **Mock**: Testing and dry runs
//! - **Vertex**: Google's Gemini models on Vertex AI (project and region required)
//!
//! Vertex requests are authorized through [`auth::AccessTokenSource`].

pub mod auth;
pub mod mock;
pub mod vertex;

pub use auth::{AccessTokenSource, ApplicationDefaultCredentials, CLOUD_PLATFORM_SCOPE, StaticToken};
pub use mock::{MockClient, RecordedCall};
pub use vertex::{DEFAULT_MODEL_ID, VertexGeminiClient, VertexSettings};
