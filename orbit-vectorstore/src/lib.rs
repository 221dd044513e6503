//! ABOUTME: Vector store capability trait - insert/search/delete/stats plus collection management
//! ABOUTME: Two backends: an in-process HNSW store and a thin HTTP adapter for an external vector db

mod local;
mod remote;

pub use local::LocalVectorStore;
pub use remote::{RemoteVectorStore, RemoteVectorStoreConfig};

use async_trait::async_trait;
use orbit_core::GatewayError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One stored embedding plus its source metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: Value,
}

/// A search hit, ordered by descending similarity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorHit {
    pub id: String,
    pub score: f32,
    pub metadata: Value,
}

/// Aggregate counters for a single collection.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    pub vector_count: usize,
}

/// Capability trait implemented by every vector backend: an in-process
/// HNSW store (used by C3's template index and by sqlite-variant
/// retrievers) or a remote vector database reachable over HTTP (used by
/// chroma-variant retrievers). `collection` names a logical namespace -
/// callers pass the adapter/template owner's identifier.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn name(&self) -> &str;

    async fn insert(&self, collection: &str, records: Vec<VectorRecord>) -> Result<Vec<String>, GatewayError>;

    async fn search(&self, collection: &str, query: &[f32], k: usize) -> Result<Vec<VectorHit>, GatewayError>;

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<(), GatewayError>;

    async fn stats(&self, collection: &str) -> Result<CollectionStats, GatewayError>;

    /// Drops a collection and everything in it. A no-op if it doesn't exist.
    async fn delete_collection(&self, collection: &str) -> Result<(), GatewayError>;

    async fn list_collections(&self) -> Result<Vec<String>, GatewayError>;
}
