//! Completion provider integration.
//!
//! The provider is a black-box remote service reachable through a narrow
//! call contract: ordered `{role, content}` pairs in, text out. The concrete
//! client (`OpenAiProvider`) speaks the OpenAI-compatible chat-completions
//! protocol; everything else in the crate depends only on the trait.

pub mod openai;

pub use openai::OpenAiProvider;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::LlmError;

/// A single chat message in a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A completion request with fixed sampling parameters.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// A completion response. `content` may be empty if the model produced no
/// usable text; callers decide whether that is an error.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
}

/// Abstraction over the completion provider.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Single best-effort completion call. No retries.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Model identifier, for logging.
    fn model_name(&self) -> &str;
}

/// Create the completion provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Arc<dyn CompletionProvider> {
    tracing::info!(model = %config.model, "Using OpenAI-compatible completion provider");
    Arc::new(OpenAiProvider::new(config.clone()))
}
