//! Core types for the question-answering pipeline

pub mod document;
pub mod query;
pub mod response;

pub use document::{Chunk, Document, FileType, Section};
pub use query::{AnswerRequest, QuestionRequest};
pub use response::{Answer, AnswerResponse, Citation, SessionCreated, SkippedFile, TokenUsage};
