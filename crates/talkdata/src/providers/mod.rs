//! Provider abstractions for embeddings, LLM and vector storage
//!
//! Trait-based so the pipeline can switch between a hosted OpenAI-compatible
//! API and a local Ollama server, and so tests can substitute stubs.

pub mod embedding;
pub mod llm;
pub mod memory;
pub mod ollama;
pub mod openai;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use llm::{Generation, LlmProvider};
pub use memory::InMemoryVectorStore;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use vector_store::{EmbeddedChunk, VectorSearchResult, VectorStoreProvider};

use reqwest::{Client, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{BackendProvider, RagConfig};
use crate::error::{Error, Result};

/// Embedder and chat model for the configured backend
pub fn from_config(config: &RagConfig) -> Result<(Arc<dyn EmbeddingProvider>, Arc<dyn LlmProvider>)> {
    match config.backend {
        BackendProvider::OpenAi => {
            let client = Arc::new(OpenAiClient::new(&config.llm, config.embeddings.dimensions)?);
            Ok((client.clone(), client))
        }
        BackendProvider::Ollama => {
            let client = Arc::new(OllamaClient::new(&config.llm, config.embeddings.dimensions)?);
            Ok((client.clone(), client))
        }
    }
}

/// Shared HTTP client; the hard limit backs up the per-attempt timeout
pub(crate) fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(5)
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Throttling and server-side failures are worth another attempt
pub(crate) fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Turn a non-success response into an error, keeping the body for context
pub(crate) async fn status_error(
    response: Response,
    what: &str,
    make: fn(String, bool) -> Error,
) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str().map(str::to_string))
        })
        .unwrap_or(body);

    tracing::error!(%status, "{} failed", what);
    make(
        format!("{} failed: HTTP {} - {}", what, status, detail),
        is_retryable_status(status),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_status() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_backend_selection() {
        let mut config = RagConfig::default();
        config.llm.api_key = Some("sk-test".to_string());
        let (embedder, llm) = from_config(&config).unwrap();
        assert_eq!(embedder.name(), "openai");
        assert_eq!(llm.model(), "gpt-4o");

        config.backend = BackendProvider::Ollama;
        let (embedder, _) = from_config(&config).unwrap();
        assert_eq!(embedder.name(), "ollama");
    }
}
