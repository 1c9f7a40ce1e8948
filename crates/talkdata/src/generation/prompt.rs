//! Prompt templates for cited answers

use crate::retrieval::RetrievedChunk;

use super::language::AnswerLanguage;

/// Prompt builder for numbered-context questions
pub struct PromptBuilder;

impl PromptBuilder {
    /// System message sent with every question
    pub const SYSTEM_PROMPT: &'static str = "You are a helpful assistant that answers questions \
        using only the numbered context provided. Cite the context entries you rely on with \
        their bracketed numbers, like [1] or [2], exactly as they are numbered in the context. \
        Do not cite numbers that do not appear in the context. If the context does not contain \
        the answer, say so.";

    /// Number retrieved chunks from 1 in retrieval order
    pub fn build_context(results: &[RetrievedChunk]) -> String {
        results
            .iter()
            .enumerate()
            .map(|(i, result)| format!("[{}] {}", i + 1, result.chunk.content.trim()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Question plus an answer-language instruction chosen from its script
    pub fn frame_question(question: &str) -> String {
        let language = AnswerLanguage::detect(question);
        format!("{}\n{}", question, language.instruction())
    }

    /// User message: numbered context followed by the framed question
    pub fn build_user_prompt(context: &str, question: &str) -> String {
        format!(
            "Context:\n{context}\n\nQuestion: {question}",
            context = context,
            question = Self::frame_question(question),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, Document};

    #[test]
    fn test_context_numbering() {
        let doc = Document::from_text("Alice likes apples. Bob likes oranges. ");
        let results = vec![
            RetrievedChunk {
                chunk: Chunk::from_span(&doc, 1, 20..39),
                score: 0.9,
            },
            RetrievedChunk {
                chunk: Chunk::from_span(&doc, 0, 0..20),
                score: 0.5,
            },
        ];

        assert_eq!(
            PromptBuilder::build_context(&results),
            "[1] Bob likes oranges.\n\n[2] Alice likes apples."
        );
    }

    #[test]
    fn test_user_prompt_layout() {
        let prompt = PromptBuilder::build_user_prompt("[1] a", "What does Bob like?");
        assert_eq!(
            prompt,
            "Context:\n[1] a\n\nQuestion: What does Bob like?\n\
             Answer in English. Use bullets or numbered format where appropriate."
        );
    }

    #[test]
    fn test_system_prompt_mentions_numbering() {
        assert!(PromptBuilder::SYSTEM_PROMPT.contains("[1]"));
    }
}
