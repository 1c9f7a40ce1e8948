//! In-process collaborators for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use talkdata::providers::{EmbeddingProvider, Generation, InMemoryVectorStore, LlmProvider};
use talkdata::{Error, QaPipeline, RagConfig, Result, TokenUsage};

pub const SAMPLE: &str = "Alice likes apples. Bob likes oranges. Carol likes pears.";

const VOCABULARY: [&str; 6] = ["alice", "apples", "bob", "oranges", "carol", "pears"];

/// Bag-of-keywords embedder with a constant bias dimension
#[derive(Default)]
pub struct KeywordEmbedder {
    pub batch_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
    pub fail: bool,
    /// Delay per batch, to widen race windows
    pub delay: Option<Duration>,
}

impl KeywordEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let mut vector: Vec<f32> = VOCABULARY
            .iter()
            .map(|term| words.iter().filter(|w| *w == term).count() as f32)
            .collect();
        vector.push(1.0);
        vector
    }

    pub fn batches(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Internal("connection refused".to_string()));
        }
        Ok(Self::vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(Error::Internal("connection refused".to_string()));
        }
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        VOCABULARY.len() + 1
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.fail)
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// What the scripted chat model does when called
pub enum Script {
    Reply(String),
    ReplyWithUsage(String, TokenUsage),
    Hang,
}

/// Chat model that follows a script and records every prompt
pub struct ScriptedLlm {
    script: Script,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(Script::Reply(text.to_string()))
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn chat(&self, _system: &str, user: &str) -> Result<Generation> {
        self.prompts.lock().push(user.to_string());
        match &self.script {
            Script::Reply(text) => Ok(Generation::new(text.clone())),
            Script::ReplyWithUsage(text, usage) => Ok(Generation {
                text: text.clone(),
                usage: Some(*usage),
            }),
            Script::Hang => std::future::pending().await,
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }
}

/// Small chunks so the sample sentences land in separate chunks
pub fn sample_config() -> RagConfig {
    let mut config = RagConfig::default();
    config.chunking.chunk_size = 20;
    config.chunking.chunk_overlap = 5;
    config.llm.timeout_secs = 2;
    config.llm.embed_timeout_secs = 2;
    config.llm.retry_base_delay_ms = 10;
    config
}

pub fn pipeline(
    config: &RagConfig,
    embedder: Arc<KeywordEmbedder>,
    llm: Arc<ScriptedLlm>,
) -> QaPipeline {
    pipeline_with_store(config, embedder, llm, Arc::new(InMemoryVectorStore::new()))
}

pub fn pipeline_with_store(
    config: &RagConfig,
    embedder: Arc<KeywordEmbedder>,
    llm: Arc<ScriptedLlm>,
    store: Arc<InMemoryVectorStore>,
) -> QaPipeline {
    QaPipeline::new(embedder, store, llm, config).expect("valid test configuration")
}
