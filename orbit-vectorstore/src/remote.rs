//! ABOUTME: Thin HTTP adapter for an external vector database (Chroma-style REST API)
//! ABOUTME: One tenant/database pair per client; collections are created lazily on first insert

use async_trait::async_trait;
use orbit_core::GatewayError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{CollectionStats, VectorHit, VectorRecord, VectorStore};

#[derive(Debug, Clone)]
pub struct RemoteVectorStoreConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

/// A vector store backed by an external service reachable over HTTP,
/// shaped after Chroma's `/collections/{name}/{add,query,delete,get}`
/// REST surface. Collections map 1:1 onto the remote's own collections.
pub struct RemoteVectorStore {
    name: String,
    config: RemoteVectorStoreConfig,
    client: Client,
}

impl RemoteVectorStore {
    #[must_use]
    pub fn new(name: impl Into<String>, config: RemoteVectorStoreConfig) -> Self {
        Self { name: name.into(), config, client: Client::new() }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, format!("{}{}", self.config.base_url, path));
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    async fn ensure_collection(&self, collection: &str) -> Result<(), GatewayError> {
        let body = json!({ "name": collection, "get_or_create": true });
        let response = self
            .request(reqwest::Method::POST, "/collections")
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::backend(&self.name, format!("create collection failed: {e}")))?;
        if !response.status().is_success() {
            return Err(GatewayError::backend(
                &self.name,
                format!("create collection http {}", response.status()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for RemoteVectorStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert(&self, collection: &str, records: Vec<VectorRecord>) -> Result<Vec<String>, GatewayError> {
        self.ensure_collection(collection).await?;

        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let embeddings: Vec<Vec<f32>> = records.iter().map(|r| r.vector.clone()).collect();
        let metadatas: Vec<Value> = records.into_iter().map(|r| r.metadata).collect();

        let body = AddRequest { ids: ids.clone(), embeddings, metadatas };
        let response = self
            .request(reqwest::Method::POST, &format!("/collections/{collection}/add"))
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::backend(&self.name, format!("insert failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::backend(&self.name, format!("insert http {status}: {text}")));
        }
        Ok(ids)
    }

    async fn search(&self, collection: &str, query: &[f32], k: usize) -> Result<Vec<VectorHit>, GatewayError> {
        let body = QueryRequest { query_embeddings: vec![query.to_vec()], n_results: k };
        let response = self
            .request(reqwest::Method::POST, &format!("/collections/{collection}/query"))
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::backend(&self.name, format!("search failed: {e}")))?;

        if !response.status().is_success() {
            if response.status().as_u16() == 404 {
                return Ok(Vec::new());
            }
            return Err(GatewayError::backend(&self.name, format!("search http {}", response.status())));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::backend(&self.name, format!("failed to parse search response: {e}")))?;

        let ids = parsed.ids.into_iter().next().unwrap_or_default();
        let distances = parsed.distances.into_iter().next().unwrap_or_default();
        let metadatas = parsed.metadatas.into_iter().next().unwrap_or_default();

        Ok(ids
            .into_iter()
            .zip(distances)
            .zip(metadatas.into_iter().chain(std::iter::repeat(Value::Null)))
            .map(|((id, distance), metadata)| VectorHit { id, score: 1.0 - distance, metadata })
            .collect())
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<(), GatewayError> {
        let body = json!({ "ids": ids });
        let response = self
            .request(reqwest::Method::POST, &format!("/collections/{collection}/delete"))
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::backend(&self.name, format!("delete failed: {e}")))?;
        if !response.status().is_success() && response.status().as_u16() != 404 {
            return Err(GatewayError::backend(&self.name, format!("delete http {}", response.status())));
        }
        Ok(())
    }

    async fn stats(&self, collection: &str) -> Result<CollectionStats, GatewayError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/collections/{collection}/count"))
            .send()
            .await
            .map_err(|e| GatewayError::backend(&self.name, format!("stats failed: {e}")))?;
        if !response.status().is_success() {
            return Ok(CollectionStats::default());
        }
        let count: u64 = response
            .json()
            .await
            .map_err(|e| GatewayError::backend(&self.name, format!("failed to parse count response: {e}")))?;
        Ok(CollectionStats { vector_count: count as usize })
    }

    async fn delete_collection(&self, collection: &str) -> Result<(), GatewayError> {
        let response = self
            .request(reqwest::Method::DELETE, &format!("/collections/{collection}"))
            .send()
            .await
            .map_err(|e| GatewayError::backend(&self.name, format!("delete collection failed: {e}")))?;
        if !response.status().is_success() && response.status().as_u16() != 404 {
            return Err(GatewayError::backend(&self.name, format!("delete collection http {}", response.status())));
        }
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>, GatewayError> {
        let response = self
            .request(reqwest::Method::GET, "/collections")
            .send()
            .await
            .map_err(|e| GatewayError::backend(&self.name, format!("list collections failed: {e}")))?;
        if !response.status().is_success() {
            return Err(GatewayError::backend(&self.name, format!("list collections http {}", response.status())));
        }
        let collections: Vec<CollectionSummary> = response
            .json()
            .await
            .map_err(|e| GatewayError::backend(&self.name, format!("failed to parse collections list: {e}")))?;
        Ok(collections.into_iter().map(|c| c.name).collect())
    }
}

#[derive(Debug, Serialize)]
struct AddRequest {
    ids: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    metadatas: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct QueryRequest {
    query_embeddings: Vec<Vec<f32>>,
    n_results: usize,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    distances: Vec<Vec<f32>>,
    metadatas: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct CollectionSummary {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_auth_header_is_attached_when_api_key_is_set() {
        let store = RemoteVectorStore::new(
            "remote",
            RemoteVectorStoreConfig { base_url: "http://localhost:8000/api/v1".to_string(), api_key: Some("secret".to_string()) },
        );
        let request = store.request(reqwest::Method::GET, "/collections").build().unwrap();
        assert!(request.headers().get("authorization").is_some());
    }

    #[test]
    fn no_api_key_means_no_auth_header() {
        let store = RemoteVectorStore::new(
            "remote",
            RemoteVectorStoreConfig { base_url: "http://localhost:8000/api/v1".to_string(), api_key: None },
        );
        let request = store.request(reqwest::Method::GET, "/collections").build().unwrap();
        assert!(request.headers().get("authorization").is_none());
    }
}
