//! ABOUTME: In-process HNSW-backed VectorStore - one vectorlite-rs index per collection
//! ABOUTME: vectorlite-rs is synchronous; every call is dispatched to spawn_blocking

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use orbit_core::GatewayError;

use vectorlite_rs::{SearchHit, VectorIndex, VectorRecord as VlRecord, VectorliteError};

use crate::{CollectionStats, VectorHit, VectorRecord, VectorStore};

/// Backs every collection with its own table in the same SQLite file at
/// `path` and its own in-memory HNSW graph, rebuilt from that table at
/// first access.
pub struct LocalVectorStore {
    name: String,
    path: PathBuf,
    dims: usize,
    max_elements: usize,
    indexes: DashMap<String, Arc<VectorIndex>>,
}

impl LocalVectorStore {
    #[must_use]
    pub fn new(name: impl Into<String>, path: PathBuf, dims: usize, max_elements: usize) -> Self {
        Self { name: name.into(), path, dims, max_elements, indexes: DashMap::new() }
    }

    fn index_for(&self, collection: &str) -> Result<Arc<VectorIndex>, GatewayError> {
        if let Some(existing) = self.indexes.get(collection) {
            return Ok(existing.clone());
        }
        let index = VectorIndex::open(&self.path, collection, self.dims, self.max_elements)
            .map_err(|e| to_gateway_error(&self.name, e))?;
        let index = Arc::new(index);
        self.indexes.insert(collection.to_string(), index.clone());
        Ok(index)
    }
}

fn to_gateway_error(backend: &str, err: VectorliteError) -> GatewayError {
    GatewayError::backend(backend, err.to_string())
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert(&self, collection: &str, records: Vec<VectorRecord>) -> Result<Vec<String>, GatewayError> {
        let index = self.index_for(collection)?;
        let backend = self.name.clone();
        let collection = collection.to_string();
        let vl_records: Vec<VlRecord> = records
            .into_iter()
            .map(|r| VlRecord { id: r.id, vector: r.vector, metadata: r.metadata })
            .collect();

        tokio::task::spawn_blocking(move || {
            index.insert(&collection, vl_records).map_err(|e| to_gateway_error(&backend, e))
        })
        .await
        .map_err(|e| GatewayError::backend(&self.name, format!("vectorstore task panicked: {e}")))?
    }

    async fn search(&self, collection: &str, query: &[f32], k: usize) -> Result<Vec<VectorHit>, GatewayError> {
        let index = self.index_for(collection)?;
        let backend = self.name.clone();
        let collection = collection.to_string();
        let query = query.to_vec();

        let hits: Vec<SearchHit> = tokio::task::spawn_blocking(move || {
            index.search(&collection, &query, k).map_err(|e| to_gateway_error(&backend, e))
        })
        .await
        .map_err(|e| GatewayError::backend(&self.name, format!("vectorstore task panicked: {e}")))??;

        Ok(hits
            .into_iter()
            .map(|h| VectorHit { id: h.id, score: 1.0 - h.distance, metadata: h.metadata })
            .collect())
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<(), GatewayError> {
        let index = self.index_for(collection)?;
        let backend = self.name.clone();
        let collection = collection.to_string();
        let ids = ids.to_vec();

        tokio::task::spawn_blocking(move || index.delete(&collection, &ids).map_err(|e| to_gateway_error(&backend, e)))
            .await
            .map_err(|e| GatewayError::backend(&self.name, format!("vectorstore task panicked: {e}")))?
    }

    async fn stats(&self, collection: &str) -> Result<CollectionStats, GatewayError> {
        let index = self.index_for(collection)?;
        Ok(CollectionStats { vector_count: index.len() })
    }

    async fn delete_collection(&self, collection: &str) -> Result<(), GatewayError> {
        let Some((_, index)) = self.indexes.remove(collection) else {
            return Ok(());
        };
        let backend = self.name.clone();
        let collection = collection.to_string();
        tokio::task::spawn_blocking(move || index.drop_collection(&collection).map_err(|e| to_gateway_error(&backend, e)))
            .await
            .map_err(|e| GatewayError::backend(&self.name, format!("vectorstore task panicked: {e}")))?
    }

    async fn list_collections(&self) -> Result<Vec<String>, GatewayError> {
        Ok(self.indexes.iter().map(|e| e.key().clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, v: [f32; 3]) -> VectorRecord {
        VectorRecord { id: id.to_string(), vector: v.to_vec(), metadata: json!({"id": id}) }
    }

    #[tokio::test]
    async fn insert_then_search_finds_the_nearest_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::new("local", dir.path().join("vec.db"), 3, 100);

        store
            .insert("docs", vec![record("a", [1.0, 0.0, 0.0]), record("b", [0.0, 1.0, 0.0])])
            .await
            .unwrap();

        let hits = store.search("docs", &[1.0, 0.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].id, "a");
    }

    #[tokio::test]
    async fn stats_reflects_inserted_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::new("local", dir.path().join("vec.db"), 3, 100);
        store.insert("docs", vec![record("a", [1.0, 0.0, 0.0])]).await.unwrap();
        let stats = store.stats("docs").await.unwrap();
        assert_eq!(stats.vector_count, 1);
    }

    #[tokio::test]
    async fn delete_collection_drops_it_from_the_listing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::new("local", dir.path().join("vec.db"), 3, 100);
        store.insert("docs", vec![record("a", [1.0, 0.0, 0.0])]).await.unwrap();
        store.delete_collection("docs").await.unwrap();
        assert!(store.list_collections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn collections_are_listed_after_first_access() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::new("local", dir.path().join("vec.db"), 3, 100);
        store.insert("docs", vec![record("a", [1.0, 0.0, 0.0])]).await.unwrap();
        let collections = store.list_collections().await.unwrap();
        assert_eq!(collections, vec!["docs".to_string()]);
    }
}
