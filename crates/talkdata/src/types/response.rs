//! Answer, citation and session response types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::document::FileType;

/// A reference marker in the answer linked back to the chunk that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Reference number as it appears in the answer (`[n]`)
    pub reference: u32,
    /// Index of the cited chunk in the document's chunk sequence
    pub chunk_index: u32,
    /// Page/slide/sheet number, when known
    pub page_number: Option<u32>,
    /// Source filename, when known
    pub filename: Option<String>,
    /// Bounded-length prefix of the chunk text
    pub excerpt: String,
    /// Excerpt with question terms wrapped in `<mark>` tags
    pub excerpt_highlighted: String,
    /// Retrieval relevance score of the chunk
    pub score: f32,
}

/// Token usage reported by the generation backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Estimated cost at a flat per-1K-token rate
    pub fn estimated_cost(&self, usd_per_1k_tokens: f64) -> f64 {
        self.total_tokens as f64 / 1000.0 * usd_per_1k_tokens
    }
}

/// Result of answering one question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// Generated answer, verbatim
    pub answer: String,
    /// Citation table keyed by reference number
    pub citations: BTreeMap<u32, Citation>,
    /// Reference numbers found in the answer with no matching context entry
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropped_references: Vec<u32>,
    /// Number of context entries sent to generation
    pub context_size: usize,
    /// Token usage, when the backend reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    /// Estimated cost in USD, when usage is known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_cost_usd: Option<f64>,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

/// HTTP payload for an answered question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    #[serde(flatten)]
    pub answer: Answer,
    /// Answer with `[n]` markers wrapped in clickable spans
    pub answer_html: String,
}

impl From<Answer> for AnswerResponse {
    fn from(answer: Answer) -> Self {
        let answer_html = crate::generation::citation::link_references(&answer.answer);
        Self { answer, answer_html }
    }
}

/// A file that made it into the session document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedFile {
    pub filename: String,
    pub file_type: FileType,
    /// Pages, slides or sheets found
    pub sections: usize,
    /// Characters of extracted text
    pub characters: usize,
}

/// A file left out of the session document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedFile {
    pub filename: String,
    pub reason: String,
}

/// Response from creating a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCreated {
    /// Session ID, `None` when every file was skipped
    pub session_id: Option<Uuid>,
    pub accepted: Vec<AcceptedFile>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedFile>,
    /// Characters in the combined document
    pub characters: usize,
}
