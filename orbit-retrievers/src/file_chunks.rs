//! ABOUTME: Retrieval over the Chunk entity - similarity search honoring the chunk cache TTL
//! ABOUTME: Uniqueness of (source_url, chunk_id) is enforced by deriving the vector record id from both

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use orbit_core::{Adapter, ContextItem, GatewayError, RetrieveOptions};
use orbit_providers::EmbeddingProvider;
use orbit_vectorstore::{VectorRecord, VectorStore};
use serde_json::Value;
use tracing::debug;

/// Default cache lifetime for an indexed chunk before it's treated as stale.
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_K: usize = 10;

/// One chunk ready for indexing - the ingestion-side shape of the Chunk
/// entity. The file-upload/chunking pipeline that produces these is an
/// external collaborator; this adapter only indexes and retrieves them.
#[derive(Debug, Clone)]
pub struct ChunkInput {
    pub chunk_id: String,
    pub source_url: String,
    pub content: String,
    pub token_count: usize,
    pub position: usize,
    pub hierarchy: Vec<String>,
    pub metadata: serde_json::Map<String, Value>,
}

/// Derives the vector record id enforcing the `(source_url, chunk_id)`
/// uniqueness invariant - re-indexing the same pair overwrites in place
/// rather than creating a duplicate.
#[must_use]
fn chunk_record_id(source_url: &str, chunk_id: &str) -> String {
    format!("{source_url}::{chunk_id}")
}

/// Similarity search over a chunk collection, honoring a cache TTL: chunks
/// older than `cache_ttl` are excluded from results as if already evicted,
/// since this crate has no background eviction sweep of its own.
pub struct FileChunksAdapter {
    name: String,
    store: Arc<dyn VectorStore>,
    embedding: Arc<dyn EmbeddingProvider>,
    collection: String,
    relevance_threshold: f32,
    cache_ttl: Duration,
    default_k: usize,
}

impl FileChunksAdapter {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn VectorStore>,
        embedding: Arc<dyn EmbeddingProvider>,
        collection: impl Into<String>,
        relevance_threshold: f32,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            embedding,
            collection: collection.into(),
            relevance_threshold,
            cache_ttl: DEFAULT_CACHE_TTL,
            default_k: DEFAULT_K,
        }
    }

    #[must_use]
    pub fn with_cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    /// Embeds and upserts one chunk. Overwrites any prior vector for the
    /// same `(source_url, chunk_id)` pair and stamps `indexed_at` so
    /// staleness can be judged at retrieval time.
    pub async fn upsert_chunk(&self, chunk: ChunkInput) -> Result<(), GatewayError> {
        let vectors = self.embedding.embed(&[chunk.content.clone()]).await?;
        let vector = vectors.into_iter().next().ok_or_else(|| GatewayError::internal("embedding returned no vector"))?;

        let mut metadata = chunk.metadata;
        metadata.insert("chunk_id".to_string(), Value::String(chunk.chunk_id.clone()));
        metadata.insert("source_url".to_string(), Value::String(chunk.source_url.clone()));
        metadata.insert("content".to_string(), Value::String(chunk.content));
        metadata.insert("token_count".to_string(), Value::from(chunk.token_count));
        metadata.insert("position".to_string(), Value::from(chunk.position));
        metadata.insert("hierarchy".to_string(), Value::from(chunk.hierarchy));
        metadata.insert("indexed_at".to_string(), Value::from(Utc::now().timestamp()));

        self.store
            .insert(
                &self.collection,
                vec![VectorRecord {
                    id: chunk_record_id(&chunk.source_url, &chunk.chunk_id),
                    vector,
                    metadata: Value::Object(metadata),
                }],
            )
            .await?;
        Ok(())
    }

    fn is_stale(&self, metadata: &Value, now: i64) -> bool {
        let Some(indexed_at) = metadata.get("indexed_at").and_then(Value::as_i64) else {
            return false;
        };
        now.saturating_sub(indexed_at) > self.cache_ttl.as_secs() as i64
    }
}

#[async_trait]
impl Adapter for FileChunksAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn retrieve(&self, query: &str, options: &RetrieveOptions) -> Result<Vec<ContextItem>, GatewayError> {
        let k = options.limit.unwrap_or(self.default_k);
        let vectors = self.embedding.embed(&[query.to_string()]).await?;
        let query_vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::internal("embedding returned no vector for query"))?;

        let hits = self.store.search(&self.collection, &query_vector, k).await?;
        let now = Utc::now().timestamp();

        let items: Vec<ContextItem> = hits
            .into_iter()
            .filter(|hit| hit.score >= self.relevance_threshold)
            .filter(|hit| {
                let stale = self.is_stale(&hit.metadata, now);
                if stale {
                    debug!(adapter = %self.name, chunk = %hit.id, "dropping stale chunk past cache ttl");
                }
                !stale
            })
            .map(|hit| {
                let content = hit.metadata.get("content").and_then(Value::as_str).unwrap_or_default().to_string();
                let source_url = hit.metadata.get("source_url").and_then(Value::as_str).map(str::to_string);
                let chunk_id = hit.metadata.get("chunk_id").and_then(Value::as_str).map(str::to_string);

                let mut item = ContextItem::new(content, hit.score)
                    .with_metadata(hit.metadata.as_object().cloned().unwrap_or_default().into_iter().collect())
                    .with_source_adapter(self.name.clone());
                if let Some(url) = source_url {
                    item = item.with_source_url(url);
                }
                if let Some(id) = chunk_id {
                    item = item.with_chunk_id(id);
                }
                item
            })
            .collect();

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_vectorstore::LocalVectorStore;

    struct StubEmbedding;

    #[async_trait]
    impl EmbeddingProvider for StubEmbedding {
        fn name(&self) -> &str {
            "stub"
        }
        fn model(&self) -> &str {
            "stub-model"
        }
        fn dimensions(&self) -> usize {
            3
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, GatewayError> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 0.0, 1.0]).collect())
        }
        async fn validate(&self) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    fn adapter(dir: &std::path::Path) -> FileChunksAdapter {
        let store = Arc::new(LocalVectorStore::new("local", dir.join("chunks.db"), 3, 100));
        FileChunksAdapter::new("chunks", store, Arc::new(StubEmbedding), "docs", 0.0)
    }

    fn chunk(source_url: &str, chunk_id: &str) -> ChunkInput {
        ChunkInput {
            chunk_id: chunk_id.to_string(),
            source_url: source_url.to_string(),
            content: "the quick brown fox".to_string(),
            token_count: 4,
            position: 0,
            hierarchy: vec!["doc".to_string()],
            metadata: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn reindexing_same_source_and_chunk_id_overwrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let a = adapter(dir.path());
        a.upsert_chunk(chunk("https://x/doc", "c1")).await.unwrap();
        a.upsert_chunk(chunk("https://x/doc", "c1")).await.unwrap();

        let items = a.retrieve("fox", &RetrieveOptions::default()).await.unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn distinct_chunk_ids_from_the_same_source_both_survive() {
        let dir = tempfile::tempdir().unwrap();
        let a = adapter(dir.path());
        a.upsert_chunk(chunk("https://x/doc", "c1")).await.unwrap();
        a.upsert_chunk(chunk("https://x/doc", "c2")).await.unwrap();

        let items = a.retrieve("fox", &RetrieveOptions::default()).await.unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn chunk_older_than_ttl_is_marked_stale() {
        let dir = std::env::temp_dir();
        let a = adapter(&dir).with_cache_ttl(Duration::from_secs(60));
        let stale_metadata = serde_json::json!({ "indexed_at": Utc::now().timestamp() - 3600 });
        assert!(a.is_stale(&stale_metadata, Utc::now().timestamp()));
    }

    #[test]
    fn chunk_within_ttl_is_not_stale() {
        let dir = std::env::temp_dir();
        let a = adapter(&dir).with_cache_ttl(Duration::from_secs(3600));
        let fresh_metadata = serde_json::json!({ "indexed_at": Utc::now().timestamp() });
        assert!(!a.is_stale(&fresh_metadata, Utc::now().timestamp()));
    }
}
