//! ABOUTME: Serializable provider entries, converted into orbit_providers::ProviderConfig at startup

use std::collections::HashMap;

use orbit_providers::ProviderConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderEntryConfig {
    pub name: String,
    pub model: String,
    pub endpoint: Option<String>,
    /// Name of the environment variable holding the API key - never stored
    /// in config files directly.
    pub api_key_env: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub custom_config: HashMap<String, serde_json::Value>,
}

impl Default for ProviderEntryConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            model: "default".to_string(),
            endpoint: None,
            api_key_env: None,
            timeout_secs: Some(30),
            max_retries: Some(3),
            custom_config: HashMap::new(),
        }
    }
}

impl ProviderEntryConfig {
    #[must_use]
    pub fn resolve(&self) -> ProviderConfig {
        let api_key = self
            .api_key_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok());
        ProviderConfig {
            name: self.name.clone(),
            model: self.model.clone(),
            endpoint: self.endpoint.clone(),
            api_key,
            timeout_secs: self.timeout_secs,
            max_retries: self.max_retries,
            custom_config: self.custom_config.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderManagerConfig {
    pub inference: Vec<ProviderEntryConfig>,
    pub embedding: Vec<ProviderEntryConfig>,
    pub default_inference: Option<String>,
    pub default_embedding: Option<String>,
}
