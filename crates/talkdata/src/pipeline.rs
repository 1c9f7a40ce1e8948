//! Question-answering pipeline: retrieve, compose, report

use std::sync::Arc;
use std::time::Instant;

use crate::config::RagConfig;
use crate::error::Result;
use crate::generation::AnswerComposer;
use crate::providers::{self, EmbeddingProvider, InMemoryVectorStore, LlmProvider, VectorStoreProvider};
use crate::retrieval::Retriever;
use crate::types::query::validate_question;
use crate::types::{Answer, Document};

/// The session-boundary surface
///
/// Owns one Retriever and one Answer Composer built from an explicit
/// configuration. Cheap to share behind an `Arc`; concurrent questions on
/// different documents do not contend.
pub struct QaPipeline {
    config: RagConfig,
    retriever: Retriever,
    composer: AnswerComposer,
}

impl QaPipeline {
    /// Assemble a pipeline from explicit collaborators
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStoreProvider>,
        llm: Arc<dyn LlmProvider>,
        config: &RagConfig,
    ) -> Result<Self> {
        let retriever = Retriever::new(embedder, store, config)?;
        let composer = AnswerComposer::new(
            llm,
            config.llm.generation_policy(),
            config.retrieval.excerpt_chars,
        );

        Ok(Self {
            config: config.clone(),
            retriever,
            composer,
        })
    }

    /// Build the configured backend with an in-process vector index
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let (embedder, llm) = providers::from_config(config)?;
        tracing::info!(
            backend = ?config.backend,
            embedder = embedder.name(),
            llm = llm.name(),
            model = llm.model(),
            "Pipeline initialized"
        );
        Self::new(embedder, Arc::new(InMemoryVectorStore::new()), llm, config)
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn composer(&self) -> &AnswerComposer {
        &self.composer
    }

    /// Answer a question against raw document text
    pub async fn answer_question(&self, document_text: &str, question: &str) -> Result<Answer> {
        let document = Document::from_text(document_text);
        self.answer(&document, question).await
    }

    /// Answer a question against a document
    ///
    /// Fails with `InvalidRequest` for a blank question and `EmptyDocument`
    /// for a blank document, in both cases before any collaborator is
    /// called. Collaborator failures surface as `RetrievalUnavailable` or
    /// `GenerationUnavailable`.
    pub async fn answer(&self, document: &Document, question: &str) -> Result<Answer> {
        let start = Instant::now();
        let question = validate_question(question)?;

        let context = self.retriever.retrieve(document, question).await?;
        let composed = self.composer.compose(question, &context).await?;

        let estimated_cost_usd = composed
            .usage
            .map(|usage| usage.estimated_cost(self.config.pricing.usd_per_1k_tokens));
        let processing_time_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            document_id = %document.id,
            context_size = composed.context_size,
            citations = composed.citations.len(),
            total_tokens = composed.usage.map(|u| u.total_tokens),
            processing_time_ms,
            "Answered question"
        );

        Ok(Answer {
            answer: composed.answer,
            citations: composed.citations,
            dropped_references: composed.dropped_references,
            context_size: composed.context_size,
            usage: composed.usage,
            estimated_cost_usd,
            processing_time_ms,
        })
    }

    /// Drop any cached index for `document`
    pub async fn invalidate(&self, document: &Document) -> bool {
        self.retriever.invalidate(document).await
    }

    /// Release every cached index
    pub async fn close(&self) {
        self.retriever.close().await;
    }
}
