//! Vector store provider trait for storing and searching embeddings

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Chunk;

/// A chunk paired with its embedding
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// Search result from vector store
#[derive(Debug, Clone)]
pub struct VectorSearchResult {
    /// The matched chunk
    pub chunk: Chunk,
    /// Cosine similarity, higher is more similar
    pub similarity: f32,
}

/// Trait for vector storage and similarity search
///
/// Each indexed document lives in its own collection, so a search can never
/// return chunks from another document.
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Add chunks to a collection, creating it if needed
    async fn insert_chunks(&self, collection: &str, chunks: Vec<EmbeddedChunk>) -> Result<()>;

    /// Search one collection; results sorted by similarity, best first
    async fn search(
        &self,
        collection: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorSearchResult>>;

    /// Remove a collection, returning how many vectors it held
    async fn delete_collection(&self, collection: &str) -> Result<usize>;

    /// Number of vectors in a collection
    async fn len(&self, collection: &str) -> Result<usize>;

    /// Check if a collection is empty
    async fn is_empty(&self, collection: &str) -> Result<bool> {
        Ok(self.len(collection).await? == 0)
    }

    /// Check if the provider is healthy
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// Get provider name for logging
    fn name(&self) -> &str;
}
