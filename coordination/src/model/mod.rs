//! Model capability: turn a prompt into text.
//!
//! Every bot holds exactly one capability, built at startup and passed into
//! the driver. Nothing is cached process-wide.

pub mod provider;
pub mod scripted;

use async_trait::async_trait;
use thiserror::Error;

pub use provider::{ChatModel, Persona, Provider};
pub use scripted::ScriptedModel;

/// Errors from model calls.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("{0} not set")]
    MissingApiKey(String),

    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("API error: {status}")]
    Api { status: u16, body: String },

    #[error("Response parse error: {0}")]
    ParseError(String),

    #[error("Empty response")]
    EmptyResponse,
}

/// Something that can answer a prompt.
#[async_trait]
pub trait ModelCapability: Send + Sync {
    /// Display name, used in logs.
    fn name(&self) -> &str;

    /// Ask for a completion. No retries happen at this layer.
    async fn ask(&self, prompt: &str) -> Result<String, ModelError>;
}
