//! ABOUTME: Direct vector-similarity retrieval over a single collection
//! ABOUTME: Backs both the chroma-style remote and sqlite-style local descriptor variants - the
//! ABOUTME: difference is entirely in which VectorStore implementation is wired into `store`

use std::sync::Arc;

use async_trait::async_trait;
use orbit_core::{Adapter, ContextItem, GatewayError, RetrieveOptions};
use orbit_providers::EmbeddingProvider;
use orbit_vectorstore::VectorStore;
use serde_json::Value;

/// Default number of nearest neighbours pulled before relevance filtering.
const DEFAULT_K: usize = 10;

/// A single-collection similarity retriever: embed the query, search one
/// vector store collection, drop hits under `relevance_threshold`.
pub struct VectorSimilarityAdapter {
    name: String,
    store: Arc<dyn VectorStore>,
    embedding: Arc<dyn EmbeddingProvider>,
    collection: String,
    relevance_threshold: f32,
    default_k: usize,
}

impl VectorSimilarityAdapter {
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
            default_k: DEFAULT_K,
        }
    }

    #[must_use]
    pub fn with_default_k(mut self, k: usize) -> Self {
        self.default_k = k.max(1);
        self
    }
}

#[async_trait]
impl Adapter for VectorSimilarityAdapter {
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

        let items: Vec<ContextItem> = hits
            .into_iter()
            .filter(|hit| hit.score >= self.relevance_threshold)
            .map(|hit| {
                let content = content_from_metadata(&hit.metadata);
                ContextItem::new(content, hit.score)
                    .with_metadata(metadata_map(&hit.metadata))
                    .with_source_adapter(self.name.clone())
            })
            .collect();

        Ok(items)
    }
}

fn content_from_metadata(metadata: &Value) -> String {
    metadata
        .get("content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| metadata.to_string())
}

fn metadata_map(metadata: &Value) -> std::collections::HashMap<String, Value> {
    match metadata {
        Value::Object(map) => map.clone().into_iter().collect(),
        other => std::collections::HashMap::from([("raw".to_string(), other.clone())]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_vectorstore::{CollectionStats, VectorHit, VectorRecord};

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
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, GatewayError> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
        async fn validate(&self) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    struct StubStore {
        hits: Vec<VectorHit>,
    }

    #[async_trait]
    impl VectorStore for StubStore {
        fn name(&self) -> &str {
            "stub"
        }
        async fn insert(&self, _collection: &str, _records: Vec<VectorRecord>) -> Result<Vec<String>, GatewayError> {
            Ok(Vec::new())
        }
        async fn search(&self, _collection: &str, _query: &[f32], _k: usize) -> Result<Vec<VectorHit>, GatewayError> {
            Ok(self.hits.clone())
        }
        async fn delete(&self, _collection: &str, _ids: &[String]) -> Result<(), GatewayError> {
            Ok(())
        }
        async fn stats(&self, _collection: &str) -> Result<CollectionStats, GatewayError> {
            Ok(CollectionStats::default())
        }
        async fn delete_collection(&self, _collection: &str) -> Result<(), GatewayError> {
            Ok(())
        }
        async fn list_collections(&self) -> Result<Vec<String>, GatewayError> {
            Ok(Vec::new())
        }
    }

    fn hit(id: &str, score: f32) -> VectorHit {
        VectorHit { id: id.to_string(), score, metadata: serde_json::json!({ "content": format!("doc-{id}") }) }
    }

    #[tokio::test]
    async fn hits_below_relevance_threshold_are_dropped() {
        let store = Arc::new(StubStore { hits: vec![hit("a", 0.9), hit("b", 0.2)] });
        let adapter = VectorSimilarityAdapter::new("kb", store, Arc::new(StubEmbedding), "docs", 0.5);
        let items = adapter.retrieve("q", &RetrieveOptions::default()).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].content, "doc-a");
    }

    #[tokio::test]
    async fn surviving_items_are_stamped_with_source_adapter() {
        let store = Arc::new(StubStore { hits: vec![hit("a", 0.9)] });
        let adapter = VectorSimilarityAdapter::new("kb", store, Arc::new(StubEmbedding), "docs", 0.5);
        let items = adapter.retrieve("q", &RetrieveOptions::default()).await.unwrap();
        assert_eq!(items[0].source_adapter.as_deref(), Some("kb"));
    }
}
