//! ABOUTME: The Adapter capability - retrieval components fanned out over by the executor
//! ABOUTME: Replaces dynamic-dispatch "adapter objects" with one narrow async trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use crate::context_item::ContextItem;
use crate::error::GatewayError;

/// Options threaded through to an adapter's `retrieve` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrieveOptions {
    /// Caller-supplied session identifier, if any (used by adapters that keep
    /// short-lived per-session state, e.g. chat history aware retrievers).
    pub session_id: Option<String>,
    /// Maximum number of context items the adapter should return.
    pub limit: Option<usize>,
    /// Free-form per-call overrides (e.g. a collection name override).
    pub params: HashMap<String, serde_json::Value>,
}

/// The capability every retrieval component implements: given a query,
/// return zero or more `ContextItem`s. Concrete variants are intent-driven
/// (match NL -> template -> backend operation) or direct (similarity search
/// over a vector collection) - see `orbit-intent` and `orbit-retrievers`.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Stable, unique adapter name as referenced by descriptors and requests.
    fn name(&self) -> &str;

    /// Fetch context for `query`. Must never panic; backend failures are
    /// converted to `GatewayError::BackendError` (or a more specific
    /// variant) and returned as `Err`, letting the executor's circuit
    /// breaker account for the failure.
    async fn retrieve(
        &self,
        query: &str,
        options: &RetrieveOptions,
    ) -> Result<Vec<ContextItem>, GatewayError>;
}

/// Outcome of fanning a single adapter out through the executor. The
/// executor always returns exactly one of these per requested adapter name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterResult {
    pub adapter_name: String,
    pub success: bool,
    pub data: Vec<ContextItem>,
    pub error: Option<String>,
    pub execution_time: Duration,
}

impl AdapterResult {
    #[must_use]
    pub fn success(adapter_name: impl Into<String>, data: Vec<ContextItem>, elapsed: Duration) -> Self {
        Self {
            adapter_name: adapter_name.into(),
            success: true,
            data,
            error: None,
            execution_time: elapsed,
        }
    }

    #[must_use]
    pub fn failure(adapter_name: impl Into<String>, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            adapter_name: adapter_name.into(),
            success: false,
            data: Vec::new(),
            error: Some(error.into()),
            execution_time: elapsed,
        }
    }

    #[must_use]
    pub fn cancelled(adapter_name: impl Into<String>) -> Self {
        Self {
            adapter_name: adapter_name.into(),
            success: false,
            data: Vec::new(),
            error: Some("cancelled".to_string()),
            execution_time: Duration::ZERO,
        }
    }
}

/// Adapter type discriminant - currently only `retriever` is defined, kept
/// as an enum so new adapter types are additive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterType {
    Retriever,
}

impl Default for AdapterType {
    fn default() -> Self {
        Self::Retriever
    }
}

/// Per-adapter overrides of the process-wide circuit breaker defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FaultToleranceOverrides {
    pub failure_threshold: Option<u32>,
    pub success_threshold: Option<u32>,
    pub recovery_timeout_ms: Option<u64>,
    pub operation_timeout_ms: Option<u64>,
}

/// Configuration record for one adapter.
///
/// Loaded at startup and on hot-reload; mutated only by the reload path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterDescriptor {
    pub name: String,
    pub adapter_type: AdapterType,
    /// Symbolic backend name, e.g. "postgres-orders", "chroma-kb".
    pub datasource: String,
    /// Symbolic implementation class, e.g. "intent-sql", "file-chunks".
    pub implementation: String,
    pub enabled: bool,
    /// Free-form config: thresholds, collection, template paths, etc.
    pub config: HashMap<String, serde_json::Value>,
    pub inference_provider: Option<String>,
    pub embedding_provider: Option<String>,
    pub fault_tolerance: Option<FaultToleranceOverrides>,
}

impl AdapterDescriptor {
    /// Stable hash of everything that would require rebuilding a cached
    /// adapter instance. Two descriptors that are `==` produce the same
    /// hash; any field change changes it. Used by the adapter instance
    /// cache (`orbit-retrievers`) to decide whether to invalidate on reload.
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        let mut hasher = DefaultHasher::new();
        self.name.hash(&mut hasher);
        (self.adapter_type as u8 as u32).hash(&mut hasher);
        self.datasource.hash(&mut hasher);
        self.implementation.hash(&mut hasher);
        self.enabled.hash(&mut hasher);
        self.inference_provider.hash(&mut hasher);
        self.embedding_provider.hash(&mut hasher);
        // serde_json::Value doesn't implement Hash; hash its canonical string form.
        if let Ok(canonical) = serde_json::to_string(&self.config) {
            canonical.hash(&mut hasher);
        }
        if let Some(ft) = &self.fault_tolerance {
            ft.failure_threshold.hash(&mut hasher);
            ft.success_threshold.hash(&mut hasher);
            ft.recovery_timeout_ms.hash(&mut hasher);
            ft.operation_timeout_ms.hash(&mut hasher);
        }
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(config_value: &str) -> AdapterDescriptor {
        let mut config = HashMap::new();
        config.insert(
            "collection".to_string(),
            serde_json::Value::String(config_value.to_string()),
        );
        AdapterDescriptor {
            name: "kb".to_string(),
            adapter_type: AdapterType::Retriever,
            datasource: "chroma".to_string(),
            implementation: "chroma".to_string(),
            enabled: true,
            config,
            inference_provider: None,
            embedding_provider: None,
            fault_tolerance: None,
        }
    }

    #[test]
    fn content_hash_is_stable_for_identical_descriptors() {
        assert_eq!(descriptor("docs").content_hash(), descriptor("docs").content_hash());
    }

    #[test]
    fn content_hash_changes_when_config_changes() {
        assert_ne!(descriptor("docs").content_hash(), descriptor("other").content_hash());
    }

    #[test]
    fn adapter_result_cancelled_has_zero_duration_and_no_success() {
        let result = AdapterResult::cancelled("slow");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("cancelled"));
        assert_eq!(result.execution_time, Duration::ZERO);
    }
}
