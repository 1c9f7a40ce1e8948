//! LLM provider trait for generating answers

use async_trait::async_trait;

use crate::error::Result;
use crate::types::TokenUsage;

/// Text returned by a chat model
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    /// Reply text, verbatim
    pub text: String,
    /// Token usage, when the backend reports it
    pub usage: Option<TokenUsage>,
}

impl Generation {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }
}

/// Trait for chat-style answer generation
///
/// Implementations:
/// - `OpenAiClient`: OpenAI-compatible `/v1/chat/completions`
/// - `OllamaClient`: Local Ollama server `/api/chat`
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send one system + user exchange and return the reply
    async fn chat(&self, system: &str, user: &str) -> Result<Generation>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
