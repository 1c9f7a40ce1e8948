//! Configuration for the question-answering pipeline and server

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Main configuration, passed explicitly to every component at construction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    /// Which hosted backend serves embeddings and generation
    #[serde(default)]
    pub backend: BackendProvider,
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// LLM / embedding endpoint configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Embedding configuration
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Token pricing used for cost estimates
    #[serde(default)]
    pub pricing: PricingConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file and apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let mut config: RagConfig = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("Invalid config {}: {}", path.display(), e)))?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, else the user config file, else defaults
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Some(path) = Self::default_path().filter(|p| p.exists()) {
            tracing::info!(path = %path.display(), "Loading configuration");
            return Self::load(path);
        }

        let mut config = Self::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// `$CONFIG_DIR/talkdata/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("talkdata").join("config.toml"))
    }

    /// Apply environment variable overrides
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                self.llm.api_key = Some(key);
            }
        }
        if let Ok(backend) = std::env::var("TALKDATA_BACKEND") {
            match backend.to_lowercase().as_str() {
                "openai" => self.backend = BackendProvider::OpenAi,
                "ollama" => self.backend = BackendProvider::Ollama,
                other => tracing::warn!(backend = other, "Ignoring unknown TALKDATA_BACKEND"),
            }
        }
        if let Ok(host) = std::env::var("TALKDATA_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("TALKDATA_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(port = %port, "Ignoring invalid TALKDATA_PORT"),
            }
        }
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be at least 1".to_string()));
        }
        if self.retrieval.excerpt_chars == 0 {
            return Err(Error::Config("retrieval.excerpt_chars must be at least 1".to_string()));
        }
        if self.llm.timeout_secs == 0 || self.llm.embed_timeout_secs == 0 {
            return Err(Error::Config("llm timeouts must be non-zero".to_string()));
        }
        if self.embeddings.batch_size == 0 {
            return Err(Error::Config("embeddings.batch_size must be at least 1".to_string()));
        }
        if self.server.max_sessions == 0 {
            return Err(Error::Config("server.max_sessions must be at least 1".to_string()));
        }
        if self.server.session_sweep_secs == 0 {
            return Err(Error::Config("server.session_sweep_secs must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Backend provider selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendProvider {
    /// OpenAI-compatible REST API
    #[default]
    OpenAi,
    /// Local Ollama server
    Ollama,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 200MB)
    pub max_upload_size: usize,
    /// How long shutdown waits for in-flight requests
    pub shutdown_grace_secs: u64,
    /// Idle time after which a session is discarded; 0 keeps sessions until deleted
    pub session_ttl_secs: u64,
    /// Most live sessions; creating one more discards the least recently used
    pub max_sessions: usize,
    /// How often idle sessions are swept
    pub session_sweep_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            max_upload_size: 200 * 1024 * 1024,
            shutdown_grace_secs: 5,
            session_ttl_secs: 3600,
            max_sessions: 1000,
            session_sweep_secs: 60,
        }
    }
}

/// LLM endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API base URL (`https://api.openai.com/v1` or `http://localhost:11434`)
    pub base_url: String,
    /// API key (OpenAI backend only)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Chat model name
    pub chat_model: String,
    /// Embedding model name
    pub embed_model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Timeout for a single generation attempt, in seconds
    pub timeout_secs: u64,
    /// Timeout for a single embedding attempt, in seconds
    pub embed_timeout_secs: u64,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry
    pub retry_base_delay_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            chat_model: "gpt-4o".to_string(),
            embed_model: "text-embedding-3-small".to_string(),
            temperature: 0.3,
            timeout_secs: 60,
            embed_timeout_secs: 30,
            max_retries: 1,
            retry_base_delay_ms: 500,
        }
    }
}

impl LlmConfig {
    /// Retry policy for generation calls
    pub fn generation_policy(&self) -> crate::retrieval::RetryPolicy {
        crate::retrieval::RetryPolicy {
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }

    /// Retry policy for embedding calls
    pub fn embedding_policy(&self) -> crate::retrieval::RetryPolicy {
        crate::retrieval::RetryPolicy {
            timeout: Duration::from_secs(self.embed_timeout_secs),
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding dimensions (1536 for text-embedding-3-small, 768 for nomic-embed-text)
    pub dimensions: usize,
    /// Texts per embedding request
    pub batch_size: usize,
    /// Embedding requests in flight per document
    pub concurrent_batches: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: 1536,
            batch_size: 64,
            concurrent_batches: 4,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkingConfig {
    /// `chunk_size > 0` and `chunk_overlap < chunk_size`
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be at least 1".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunks sent to the generation step
    pub top_k: usize,
    /// Characters of chunk text kept in a citation excerpt
    pub excerpt_chars: usize,
    /// Reuse chunk embeddings for the same document across questions
    pub cache_enabled: bool,
    /// Maximum number of indexed documents kept in the cache
    pub cache_capacity: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 6,
            excerpt_chars: 300,
            cache_enabled: true,
            cache_capacity: 64,
        }
    }
}

/// Token pricing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// USD per 1000 tokens, applied to total usage
    pub usd_per_1k_tokens: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            usd_per_1k_tokens: 0.005,
        }
    }
}
