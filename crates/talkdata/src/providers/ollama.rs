//! Ollama client for embeddings and chat

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::types::TokenUsage;

use super::embedding::EmbeddingProvider;
use super::llm::{Generation, LlmProvider};
use super::{http_client, status_error};

/// Ollama API client serving both provider traits
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    base_url: String,
    chat_model: String,
    embed_model: String,
    temperature: f32,
    dimensions: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatReply,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct ChatReply {
    content: String,
}

impl ChatResponse {
    fn usage(&self) -> Option<TokenUsage> {
        match (self.prompt_eval_count, self.eval_count) {
            (None, None) => None,
            (prompt, completion) => {
                let prompt_tokens = prompt.unwrap_or(0);
                let completion_tokens = completion.unwrap_or(0);
                Some(TokenUsage {
                    prompt_tokens,
                    completion_tokens,
                    total_tokens: prompt_tokens + completion_tokens,
                })
            }
        }
    }
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(config: &LlmConfig, dimensions: usize) -> Result<Self> {
        let ceiling = Duration::from_secs(config.timeout_secs.max(config.embed_timeout_secs) + 5);

        Ok(Self {
            client: http_client(ceiling)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            chat_model: config.chat_model.clone(),
            embed_model: config.embed_model.clone(),
            temperature: config.temperature,
            dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest {
                model: &self.embed_model,
                prompt: text,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response, "Embedding", |m, r| Error::retrieval(m, r)).await);
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::retrieval(format!("Failed to parse embedding response: {}", e), false))?;

        Ok(embed_response.embedding)
    }

    // Ollama has no batch endpoint; the trait default embeds sequentially

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[async_trait]
impl LlmProvider for OllamaClient {
    async fn chat(&self, system: &str, user: &str) -> Result<Generation> {
        tracing::info!("Generating answer with model: {}", self.chat_model);

        let url = format!("{}/api/chat", self.base_url);
        let request = ChatRequest {
            model: &self.chat_model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(status_error(response, "Generation", |m, r| Error::generation(m, r)).await);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::generation(format!("Failed to parse chat response: {}", e), false))?;

        let usage = parsed.usage();
        Ok(Generation {
            text: parsed.message.content,
            usage,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        EmbeddingProvider::health_check(self).await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.chat_model
    }
}
