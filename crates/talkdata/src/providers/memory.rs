//! In-memory vector store using cosine similarity
//!
//! Collections map a name to the embedded chunks of one document. Suitable for
//! per-process caching of uploaded documents.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::{Error, Result};

use super::vector_store::{EmbeddedChunk, VectorSearchResult, VectorStoreProvider};

/// Vector store backed by a `HashMap` behind a `tokio::sync::RwLock`
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Vec<EmbeddedChunk>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of collections currently held
    pub async fn collection_count(&self) -> usize {
        self.collections.read().await.len()
    }
}

/// Cosine similarity; 0.0 if either vector has zero magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStoreProvider for InMemoryVectorStore {
    async fn insert_chunks(&self, collection: &str, chunks: Vec<EmbeddedChunk>) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.entry(collection.to_string()).or_default().extend(chunks);
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorSearchResult>> {
        let collections = self.collections.read().await;
        let entries = collections.get(collection).ok_or_else(|| {
            Error::retrieval(format!("collection '{}' does not exist", collection), false)
        })?;

        let mut scored: Vec<VectorSearchResult> = entries
            .iter()
            .map(|entry| VectorSearchResult {
                chunk: entry.chunk.clone(),
                similarity: cosine_similarity(&entry.embedding, query_embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then(a.chunk.index.cmp(&b.chunk.index))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete_collection(&self, collection: &str) -> Result<usize> {
        let mut collections = self.collections.write().await;
        Ok(collections.remove(collection).map(|c| c.len()).unwrap_or(0))
    }

    async fn len(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map(|c| c.len()).unwrap_or(0))
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, Document};

    fn embedded(doc: &Document, index: u32, embedding: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk {
            chunk: Chunk::from_span(doc, index, 0..doc.text.len()),
            embedding,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity_then_index() {
        let doc = Document::from_text("text");
        let store = InMemoryVectorStore::new();
        store
            .insert_chunks(
                "doc",
                vec![
                    embedded(&doc, 0, vec![0.0, 1.0]),
                    embedded(&doc, 1, vec![1.0, 0.0]),
                    embedded(&doc, 2, vec![1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let results = store.search("doc", &[1.0, 0.0], 2).await.unwrap();
        let indices: Vec<u32> = results.iter().map(|r| r.chunk.index).collect();
        assert_eq!(indices, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_nan_similarity_does_not_break_ordering() {
        let doc = Document::from_text("text");
        let store = InMemoryVectorStore::new();
        let mut chunks: Vec<EmbeddedChunk> = (0..12)
            .map(|i| embedded(&doc, i, vec![1.0, i as f32]))
            .collect();
        chunks.push(embedded(&doc, 12, vec![f32::NAN, 1.0]));
        chunks.push(embedded(&doc, 13, vec![1.0, f32::NAN]));
        store.insert_chunks("doc", chunks).await.unwrap();

        let results = store.search("doc", &[1.0, 0.0], 14).await.unwrap();
        assert_eq!(results.len(), 14);

        let finite: Vec<u32> = results
            .iter()
            .filter(|r| !r.similarity.is_nan())
            .map(|r| r.chunk.index)
            .collect();
        assert_eq!(finite, (0..12).collect::<Vec<u32>>());
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let a = Document::from_text("a");
        let b = Document::from_text("b");
        let store = InMemoryVectorStore::new();
        store.insert_chunks("a", vec![embedded(&a, 0, vec![1.0])]).await.unwrap();
        store.insert_chunks("b", vec![embedded(&b, 0, vec![1.0])]).await.unwrap();

        let results = store.search("a", &[1.0], 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.document_id, a.id);

        assert_eq!(store.delete_collection("a").await.unwrap(), 1);
        assert!(store.search("a", &[1.0], 10).await.is_err());
        assert_eq!(store.collection_count().await, 1);
    }
}
