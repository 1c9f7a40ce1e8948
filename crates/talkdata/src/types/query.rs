//! Question request types

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Stateless question against a document given inline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRequest {
    /// Full document text
    pub document_text: String,
    /// The question to answer
    pub question: String,
}

/// Question against a session's uploaded document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRequest {
    /// The question to answer
    pub question: String,
}

/// Reject empty questions before any collaborator is called
pub fn validate_question(question: &str) -> Result<&str> {
    let question = question.trim();
    if question.is_empty() {
        return Err(Error::InvalidRequest("question must not be empty".to_string()));
    }
    Ok(question)
}
