//! talkdata: document question answering with source citations
//!
//! Uploaded files are reduced to plain text, split into overlapping chunks,
//! embedded, and searched per question. The most relevant chunks are sent to
//! a chat model as numbered context, and the `[n]` markers in its reply are
//! parsed back into a citation table.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use pipeline::QaPipeline;
pub use types::{
    document::{Chunk, Document, FileType, Section},
    response::{Answer, Citation, TokenUsage},
};
