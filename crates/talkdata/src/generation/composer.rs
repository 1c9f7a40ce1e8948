//! Answer Composer: numbered context in, cited answer out

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::LlmProvider;
use crate::retrieval::{RetrievedChunk, RetryPolicy};
use crate::types::{Citation, TokenUsage};

use super::citation::build_citations;
use super::prompt::PromptBuilder;

/// Generated answer with its parsed citation table
#[derive(Debug, Clone)]
pub struct ComposedAnswer {
    pub answer: String,
    pub citations: BTreeMap<u32, Citation>,
    pub dropped_references: Vec<u32>,
    pub context_size: usize,
    pub usage: Option<TokenUsage>,
}

/// Builds the prompt, calls the chat model and parses references
pub struct AnswerComposer {
    llm: Arc<dyn LlmProvider>,
    policy: RetryPolicy,
    excerpt_chars: usize,
}

impl AnswerComposer {
    pub fn new(llm: Arc<dyn LlmProvider>, policy: RetryPolicy, excerpt_chars: usize) -> Self {
        Self {
            llm,
            policy,
            excerpt_chars,
        }
    }

    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.llm
    }

    /// Answer `question` from `context`, numbered from 1 in the given order
    ///
    /// Fails with `GenerationUnavailable` when the chat call fails or exceeds
    /// the policy timeout after its bounded retries.
    pub async fn compose(&self, question: &str, context: &[RetrievedChunk]) -> Result<ComposedAnswer> {
        if context.is_empty() {
            return Err(Error::EmptyDocument);
        }

        let context_block = PromptBuilder::build_context(context);
        let user = PromptBuilder::build_user_prompt(&context_block, question);

        let generation = self
            .policy
            .run("generation", || self.llm.chat(PromptBuilder::SYSTEM_PROMPT, &user))
            .await
            .map_err(Error::into_generation)?;

        let (citations, dropped_references) =
            build_citations(&generation.text, context, self.excerpt_chars, question);

        tracing::info!(
            model = self.llm.model(),
            context_size = context.len(),
            citations = citations.len(),
            dropped = dropped_references.len(),
            "Composed answer"
        );

        Ok(ComposedAnswer {
            answer: generation.text,
            citations,
            dropped_references,
            context_size: context.len(),
            usage: generation.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Generation;
    use crate::types::{Chunk, Document};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    struct ScriptedLlm {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn chat(&self, _system: &str, user: &str) -> Result<Generation> {
            self.prompts.lock().push(user.to_string());
            Ok(Generation::new(self.reply.clone()))
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    fn composer(reply: &str) -> (AnswerComposer, Arc<ScriptedLlm>) {
        let llm = Arc::new(ScriptedLlm {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        });
        let composer = AnswerComposer::new(llm.clone(), RetryPolicy::once(Duration::from_secs(5)), 300);
        (composer, llm)
    }

    #[tokio::test]
    async fn test_citations_only_from_context() {
        let doc = Document::from_text("Bob likes oranges. ");
        let context = vec![RetrievedChunk {
            chunk: Chunk::from_span(&doc, 0, 0..doc.text.len()),
            score: 0.8,
        }];
        let (composer, llm) = composer("Bob likes oranges [1], see also [4].");

        let composed = composer.compose("What does Bob like?", &context).await.unwrap();

        assert_eq!(composed.citations.keys().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(composed.dropped_references, vec![4]);
        assert_eq!(composed.context_size, 1);
        assert!(llm.prompts.lock()[0].contains("[1] Bob likes oranges."));
    }

    #[tokio::test]
    async fn test_empty_context_is_rejected_before_generation() {
        let (composer, llm) = composer("anything [1]");
        let result = composer.compose("q", &[]).await;

        assert!(matches!(result, Err(Error::EmptyDocument)));
        assert!(llm.prompts.lock().is_empty());
    }
}
