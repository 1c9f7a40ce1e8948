//! Error types for the question-answering pipeline

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for talkdata operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline errors
///
/// Every variant is scoped to a single question or upload; none of them is
/// fatal to the process.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// An uploaded artifact could not be turned into text
    #[error("Failed to extract text from '{filename}': {message}")]
    Extraction { filename: String, message: String },

    /// Unsupported file type
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// The document has no text to answer from
    #[error("Document is empty")]
    EmptyDocument,

    /// Malformed request (empty question, bad payload)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Embedder or vector index could not be reached
    #[error("Retrieval unavailable: {message}")]
    RetrievalUnavailable { message: String, retryable: bool },

    /// Generation collaborator failed or timed out
    #[error("Generation unavailable: {message}")]
    GenerationUnavailable { message: String, retryable: bool },

    /// A collaborator call exceeded its time limit
    #[error("{0}")]
    Timeout(String),

    /// Unknown session id
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an extraction error
    pub fn extraction(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create a retrieval error
    pub fn retrieval(message: impl Into<String>, retryable: bool) -> Self {
        Self::RetrievalUnavailable {
            message: message.into(),
            retryable,
        }
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>, retryable: bool) -> Self {
        Self::GenerationUnavailable {
            message: message.into(),
            retryable,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the caller may retry the same request
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::RetrievalUnavailable { retryable, .. }
            | Error::GenerationUnavailable { retryable, .. } => *retryable,
            Error::Timeout(_) => true,
            Error::Http(err) => err.is_timeout() || err.is_connect(),
            _ => false,
        }
    }

    /// Re-tag a collaborator error as a retrieval failure
    pub fn into_retrieval(self) -> Self {
        match self {
            err @ Error::RetrievalUnavailable { .. } => err,
            other => {
                let retryable = other.is_retryable();
                Error::retrieval(other.to_string(), retryable)
            }
        }
    }

    /// Re-tag a collaborator error as a generation failure
    pub fn into_generation(self) -> Self {
        match self {
            err @ Error::GenerationUnavailable { .. } => err,
            other => {
                let retryable = other.is_retryable();
                Error::generation(other.to_string(), retryable)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let retryable = self.is_retryable();
        let (status, error_type, message) = match &self {
            Error::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error", msg.clone()),
            Error::Extraction { filename, message } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "extraction_error",
                format!("Failed to extract '{}': {}", filename, message),
            ),
            Error::UnsupportedFileType(ext) => (
                StatusCode::BAD_REQUEST,
                "unsupported_type",
                format!("Unsupported file type: {}", ext),
            ),
            Error::EmptyDocument => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "empty_document",
                "Document contains no text".to_string(),
            ),
            Error::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_request", msg.clone()),
            Error::RetrievalUnavailable { message, .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "retrieval_unavailable",
                message.clone(),
            ),
            Error::GenerationUnavailable { message, retryable } => (
                if *retryable {
                    StatusCode::GATEWAY_TIMEOUT
                } else {
                    StatusCode::BAD_GATEWAY
                },
                "generation_unavailable",
                message.clone(),
            ),
            Error::Timeout(what) => (
                StatusCode::GATEWAY_TIMEOUT,
                "timeout",
                what.clone(),
            ),
            Error::SessionNotFound(id) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("Session not found: {}", id),
            ),
            Error::Io(err) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error", err.to_string()),
            Error::Json(err) => (StatusCode::BAD_REQUEST, "json_error", err.to_string()),
            Error::Http(err) => (StatusCode::BAD_GATEWAY, "http_error", err.to_string()),
            Error::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.clone())
            }
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "retryable": retryable,
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::retrieval("timed out", true).is_retryable());
        assert!(!Error::generation("bad api key", false).is_retryable());
        assert!(!Error::EmptyDocument.is_retryable());
    }

    #[test]
    fn test_retag_preserves_retryability() {
        let err = Error::generation("upstream 503", true).into_retrieval();
        match err {
            Error::RetrievalUnavailable { retryable, message } => {
                assert!(retryable);
                assert!(message.contains("upstream 503"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::retrieval("down", true).into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            Error::generation("timeout", true).into_response().status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            Error::SessionNotFound("x".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
    }
}
