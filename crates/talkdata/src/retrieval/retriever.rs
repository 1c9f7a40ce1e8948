//! Retriever: chunk, embed, index and rank one document against a question

use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::ingestion::TextChunker;
use crate::providers::{EmbeddedChunk, EmbeddingProvider, VectorStoreProvider};
use crate::types::{Chunk, Document};

use super::cache::{CacheStats, IndexCache, IndexedDocument};
use super::retry::RetryPolicy;

/// A retrieved chunk with its relevance score
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    /// Similarity to the question, higher is more relevant
    pub score: f32,
}

/// Orchestrates the Chunker, Embedder and Vector Index for one question
pub struct Retriever {
    chunker: TextChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStoreProvider>,
    policy: RetryPolicy,
    top_k: usize,
    batch_size: usize,
    concurrent_batches: usize,
    cache: Option<IndexCache>,
}

impl Retriever {
    /// Create a retriever from configuration
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStoreProvider>,
        config: &RagConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            chunker: TextChunker::from_config(&config.chunking)?,
            embedder,
            store,
            policy: config.llm.embedding_policy(),
            top_k: config.retrieval.top_k,
            batch_size: config.embeddings.batch_size,
            concurrent_batches: config.embeddings.concurrent_batches.max(1),
            cache: config
                .retrieval
                .cache_enabled
                .then(|| IndexCache::new(config.retrieval.cache_capacity)),
        })
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn chunker(&self) -> &TextChunker {
        &self.chunker
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn store(&self) -> &Arc<dyn VectorStoreProvider> {
        &self.store
    }

    /// Cache statistics, `None` when caching is disabled
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(IndexCache::stats)
    }

    /// Return at most `top_k` chunks of `document`, most relevant first
    ///
    /// Ties keep document order. Fails with `EmptyDocument` before any
    /// collaborator is called when the document is blank, and with
    /// `RetrievalUnavailable` when the embedder or index fails.
    pub async fn retrieve(&self, document: &Document, question: &str) -> Result<Vec<RetrievedChunk>> {
        if document.is_blank() {
            return Err(Error::EmptyDocument);
        }

        match &self.cache {
            Some(cache) => {
                let key = document.cache_key();
                let prefix = format!("doc-{}", key);
                let result = match cache
                    .get_or_index(&key, || self.index(document, collection_name(&prefix)))
                    .await
                {
                    Ok(indexed) => self.search(&indexed, question).await,
                    Err(e) => Err(e),
                };

                self.release(cache.reap()).await;
                result
            }
            None => {
                let indexed = self.index(document, collection_name("req")).await?;
                let result = self.search(&indexed, question).await;
                self.drop_collection(&indexed.collection).await;
                result
            }
        }
    }

    /// Forget the cached index for a document; returns whether one existed
    ///
    /// Its collection is released once no in-flight question is using it.
    pub async fn invalidate(&self, document: &Document) -> bool {
        let Some(cache) = &self.cache else {
            return false;
        };

        let removed = cache.invalidate(&document.cache_key());
        self.release(cache.reap()).await;
        removed
    }

    /// Release every cached index not currently in use
    pub async fn close(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
            self.release(cache.reap()).await;
            if cache.retired_len() > 0 {
                tracing::warn!(
                    pending = cache.retired_len(),
                    "Cached collections still in use at close"
                );
            }
        }
    }

    async fn release(&self, collections: Vec<String>) {
        for collection in collections {
            self.drop_collection(&collection).await;
        }
    }

    /// Chunk, embed and store a document under `collection`
    async fn index(&self, document: &Document, collection: String) -> Result<IndexedDocument> {
        let chunks = self.chunker.chunk_document(document);
        let chunk_count = chunks.len();

        tracing::info!(
            document_id = %document.id,
            chunks = chunk_count,
            collection = %collection,
            "Indexing document"
        );

        let batches: Vec<Vec<Chunk>> = chunks
            .chunks(self.batch_size)
            .map(<[Chunk]>::to_vec)
            .collect();

        let embedded: Vec<Vec<EmbeddedChunk>> = stream::iter(batches)
            .map(|batch| self.embed_chunks(batch))
            .buffered(self.concurrent_batches)
            .try_collect()
            .await?;

        self.store
            .insert_chunks(&collection, embedded.into_iter().flatten().collect())
            .await
            .map_err(Error::into_retrieval)?;

        Ok(IndexedDocument {
            collection,
            chunk_count,
        })
    }

    async fn embed_chunks(&self, batch: Vec<Chunk>) -> Result<Vec<EmbeddedChunk>> {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();

        let embeddings = self
            .policy
            .run("embedding", || self.embedder.embed_batch(&texts))
            .await
            .map_err(Error::into_retrieval)?;

        if embeddings.len() != batch.len() {
            return Err(Error::retrieval(
                format!(
                    "{} returned {} embeddings for {} chunks",
                    self.embedder.name(),
                    embeddings.len(),
                    batch.len()
                ),
                false,
            ));
        }

        Ok(batch
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding })
            .collect())
    }

    async fn search(&self, indexed: &IndexedDocument, question: &str) -> Result<Vec<RetrievedChunk>> {
        let query = self
            .policy
            .run("query embedding", || self.embedder.embed(question))
            .await
            .map_err(Error::into_retrieval)?;

        let k = self.top_k.min(indexed.chunk_count);
        let hits = self
            .store
            .search(&indexed.collection, &query, k)
            .await
            .map_err(Error::into_retrieval)?;

        if hits.is_empty() && indexed.chunk_count > 0 {
            return Err(Error::retrieval(
                format!("{} returned no results for an indexed document", self.store.name()),
                false,
            ));
        }

        let mut results: Vec<RetrievedChunk> = hits
            .into_iter()
            .map(|hit| RetrievedChunk {
                chunk: hit.chunk,
                score: hit.similarity,
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.chunk.index.cmp(&b.chunk.index))
        });
        results.truncate(k);

        tracing::debug!(
            collection = %indexed.collection,
            results = results.len(),
            top_score = ?results.first().map(|r| r.score),
            "Retrieved chunks"
        );

        Ok(results)
    }

    async fn drop_collection(&self, collection: &str) {
        if let Err(e) = self.store.delete_collection(collection).await {
            tracing::warn!(collection = %collection, error = %e, "Failed to drop collection");
        }
    }
}

/// A collection name no other indexing run will use
fn collection_name(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::InMemoryVectorStore;
    use async_trait::async_trait;

    /// Every text maps to the same vector, so every score ties
    struct FlatEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FlatEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 1.0])
        }

        fn dimensions(&self) -> usize {
            2
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "flat"
        }
    }

    fn retriever(top_k: usize, cache_enabled: bool) -> (Retriever, Arc<InMemoryVectorStore>) {
        retriever_with_capacity(top_k, cache_enabled, RagConfig::default().retrieval.cache_capacity)
    }

    fn retriever_with_capacity(
        top_k: usize,
        cache_enabled: bool,
        cache_capacity: usize,
    ) -> (Retriever, Arc<InMemoryVectorStore>) {
        let mut config = RagConfig::default();
        config.retrieval.cache_capacity = cache_capacity;
        config.chunking.chunk_size = 20;
        config.chunking.chunk_overlap = 5;
        config.retrieval.top_k = top_k;
        config.retrieval.cache_enabled = cache_enabled;
        config.embeddings.batch_size = 2;

        let store = Arc::new(InMemoryVectorStore::new());
        let retriever = Retriever::new(Arc::new(FlatEmbedder), store.clone(), &config).unwrap();
        (retriever, store)
    }

    #[tokio::test]
    async fn test_ties_keep_document_order() {
        let (retriever, _) = retriever(2, true);
        let doc = Document::from_text("Alice likes apples. Bob likes oranges. Carol likes pears.");

        let results = retriever.retrieve(&doc, "anything").await.unwrap();

        let indices: Vec<u32> = results.iter().map(|r| r.chunk.index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_uncached_collections_are_dropped() {
        let (retriever, store) = retriever(6, false);
        let doc = Document::from_text("Alice likes apples. Bob likes oranges.");

        let results = retriever.retrieve(&doc, "anything").await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(store.collection_count().await, 0);
    }

    #[tokio::test]
    async fn test_close_releases_cached_collections() {
        let (retriever, store) = retriever(6, true);
        retriever
            .retrieve(&Document::from_text("Alice likes apples."), "q")
            .await
            .unwrap();
        assert_eq!(store.collection_count().await, 1);

        retriever.close().await;
        assert_eq!(store.collection_count().await, 0);
    }

    #[tokio::test]
    async fn test_evicted_and_invalidated_collections_are_released() {
        let (retriever, store) = retriever_with_capacity(6, true, 1);
        let alice = Document::from_text("Alice likes apples.");
        let bob = Document::from_text("Bob likes oranges.");

        retriever.retrieve(&alice, "q").await.unwrap();
        retriever.retrieve(&bob, "q").await.unwrap();
        assert_eq!(store.collection_count().await, 1);

        // alice was evicted, so this indexes into a fresh collection
        let results = retriever.retrieve(&alice, "q").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(store.collection_count().await, 1);

        assert!(retriever.invalidate(&alice).await);
        assert_eq!(store.collection_count().await, 0);
    }

    #[tokio::test]
    async fn test_reindexing_uses_a_new_collection() {
        let (retriever, store) = retriever(6, true);
        let doc = Document::from_text("Alice likes apples. Bob likes oranges.");

        retriever.retrieve(&doc, "q").await.unwrap();
        assert!(retriever.invalidate(&doc).await);
        let results = retriever.retrieve(&doc, "q").await.unwrap();

        let indices: Vec<u32> = results.iter().map(|r| r.chunk.index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(store.collection_count().await, 1);
    }

    #[tokio::test]
    async fn test_blank_document() {
        let (retriever, store) = retriever(6, true);
        let err = retriever.retrieve(&Document::from_text(" \n"), "q").await.unwrap_err();

        assert!(matches!(err, Error::EmptyDocument));
        assert_eq!(store.collection_count().await, 0);
    }
}
