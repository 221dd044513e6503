//! ABOUTME: OpenAI-compatible embedding backend for the embed() capability in embedding.rs

use async_trait::async_trait;
use orbit_core::GatewayError;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::abstraction::ProviderConfig;
use crate::embedding::EmbeddingProvider;

/// Talks to `POST {endpoint}/embeddings`. Works against OpenAI directly and
/// against any OpenAI-compatible endpoint (Azure OpenAI, local servers)
/// given a different `config.endpoint`.
pub struct OpenAiEmbeddingProvider {
    name: String,
    model: String,
    api_key: String,
    base_url: String,
    dimensions: usize,
    client: Client,
}

impl OpenAiEmbeddingProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, GatewayError> {
        let api_key = config
            .api_key
            .ok_or_else(|| GatewayError::config(format!("embedding provider '{}' requires an api_key", config.name)))?;
        let dimensions = config
            .custom_config
            .get("dimensions")
            .and_then(serde_json::Value::as_u64)
            .map(|d| d as usize)
            .unwrap_or_else(|| default_dimensions(&config.model));

        Ok(Self {
            name: config.name,
            base_url: config.endpoint.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: config.model,
            api_key,
            dimensions,
            client: Client::new(),
        })
    }
}

fn default_dimensions(model: &str) -> usize {
    match model {
        "text-embedding-3-large" => 3072,
        "text-embedding-3-small" | "text-embedding-ada-002" => 1536,
        _ => 1536,
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, GatewayError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            input: texts.to_vec(),
            model: self.model.clone(),
            encoding_format: "float".to_string(),
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::backend(&self.name, format!("embedding request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::backend(&self.name, format!("http {status}: {body}")));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::backend(&self.name, format!("failed to parse embedding response: {e}")))?;

        parsed.data.sort_by_key(|e| e.index);
        Ok(parsed.data.into_iter().map(|e| e.embedding).collect())
    }

    async fn validate(&self) -> Result<(), GatewayError> {
        self.embed(&["health check".to_string()]).await.map(|_| ())
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    input: Vec<String>,
    model: String,
    encoding_format: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

pub fn create_openai_embedding_provider(config: ProviderConfig) -> Result<Box<dyn EmbeddingProvider>, GatewayError> {
    Ok(Box::new(OpenAiEmbeddingProvider::new(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_dimensions_match_known_models() {
        assert_eq!(default_dimensions("text-embedding-3-large"), 3072);
        assert_eq!(default_dimensions("text-embedding-3-small"), 1536);
        assert_eq!(default_dimensions("unknown-model"), 1536);
    }

    #[test]
    fn new_fails_without_api_key() {
        let config = ProviderConfig::new("openai", "text-embedding-3-small");
        let err = OpenAiEmbeddingProvider::new(config).unwrap_err();
        assert!(matches!(err, GatewayError::Config { .. }));
    }

    #[test]
    fn custom_config_dimensions_override_model_default() {
        let mut config = ProviderConfig::new("openai", "text-embedding-3-small");
        config.api_key = Some("test-key".to_string());
        config.custom_config.insert("dimensions".to_string(), serde_json::json!(256));
        let provider = OpenAiEmbeddingProvider::new(config).unwrap();
        assert_eq!(provider.dimensions(), 256);
    }
}
