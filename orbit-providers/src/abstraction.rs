//! ABOUTME: Provider capability and config types shared by inference and embedding backends

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a provider instance can do, used to pick a model for a task (e.g.
/// parameter extraction needs low-temperature structured output support).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProviderCapabilities {
    pub supports_streaming: bool,
    pub max_context_tokens: Option<usize>,
    pub max_output_tokens: Option<usize>,
    pub available_models: Vec<String>,
    pub custom_features: HashMap<String, serde_json::Value>,
}

/// Configuration for one provider instance, keyed by `name` in the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub custom_config: HashMap<String, serde_json::Value>,
}

impl ProviderConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            endpoint: None,
            api_key: None,
            timeout_secs: Some(30),
            max_retries: Some(3),
            custom_config: HashMap::new(),
        }
    }

    /// Loads `{name}_API_KEY` / `{name}_ENDPOINT` / `{name}_MODEL` style env
    /// vars, falling back to sensible defaults when absent.
    #[must_use]
    pub fn from_env(name: &str) -> Self {
        let prefix = format!("ORBIT_{}_", name.to_uppercase());
        Self {
            name: name.to_string(),
            endpoint: std::env::var(format!("{prefix}ENDPOINT")).ok(),
            api_key: std::env::var(format!("{prefix}API_KEY")).ok(),
            model: std::env::var(format!("{prefix}MODEL")).unwrap_or_else(|_| "default".to_string()),
            timeout_secs: std::env::var(format!("{prefix}TIMEOUT"))
                .ok()
                .and_then(|s| s.parse().ok())
                .or(Some(30)),
            max_retries: std::env::var(format!("{prefix}MAX_RETRIES"))
                .ok()
                .and_then(|s| s.parse().ok())
                .or(Some(3)),
            custom_config: HashMap::new(),
        }
    }
}
