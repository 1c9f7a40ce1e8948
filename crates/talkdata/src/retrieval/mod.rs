//! Retrieval: chunk indexing, similarity search and collaborator retry

pub mod cache;
pub mod retriever;
pub mod retry;

pub use cache::{CacheStats, IndexCache, IndexedDocument};
pub use retriever::{RetrievedChunk, Retriever};
pub use retry::RetryPolicy;
