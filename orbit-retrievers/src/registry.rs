//! ABOUTME: Adapter instance cache/registry - lazy construction, cached by name, hash-invalidated
//! ABOUTME: Implements orbit_executor::AdapterSource so this registry is what the executor fans out over

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use orbit_breaker::{BreakerConfig, Isolation};
use orbit_core::{Adapter, AdapterDescriptor, GatewayError};
use orbit_executor::{AdapterSource, ResolvedAdapter};
use tracing::warn;

/// Builds one adapter instance from its descriptor. Registered per
/// `implementation` name (e.g. "chroma", "sqlite", "mongo-direct",
/// "file-chunks", or an Intent Engine variant registered by the crate that
/// owns it). Closures capture whatever already-connected shared resource
/// (vector store, Mongo client, provider handle) the instance needs -
/// building an instance is cheap wrapper construction, not a new connection.
pub type AdapterFactory = Arc<dyn Fn(&AdapterDescriptor) -> Result<Arc<dyn Adapter>, GatewayError> + Send + Sync>;

/// Outcome of one `load_descriptors` call, matching the admin reload-adapters
/// summary contract: which adapter names were added, removed, had their
/// content hash change ("updated"), or were re-submitted unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
}

struct CachedInstance {
    hash: u64,
    adapter: Arc<dyn Adapter>,
}

/// Owns the current adapter descriptor set and every adapter instance built
/// from it. Read-mostly: `resolve` (called once per fan-out, per adapter) is
/// lock-free on the happy path via `DashMap`; only `load_descriptors` takes
/// the descriptor write lock, which it holds only long enough to swap the map.
pub struct AdapterRegistry {
    factories: RwLock<HashMap<String, AdapterFactory>>,
    descriptors: RwLock<HashMap<String, AdapterDescriptor>>,
    instances: DashMap<String, CachedInstance>,
    default_breaker: BreakerConfig,
}

impl AdapterRegistry {
    #[must_use]
    pub fn new(default_breaker: BreakerConfig) -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
            descriptors: RwLock::new(HashMap::new()),
            instances: DashMap::new(),
            default_breaker,
        }
    }

    pub fn register_factory<F>(&self, implementation: impl Into<String>, factory: F)
    where
        F: Fn(&AdapterDescriptor) -> Result<Arc<dyn Adapter>, GatewayError> + Send + Sync + 'static,
    {
        self.factories
            .write()
            .expect("registry factories lock poisoned")
            .insert(implementation.into(), Arc::new(factory));
    }

    /// Replaces the current descriptor set, diffing by name and content
    /// hash against what was previously loaded. Instances whose descriptor
    /// was removed or changed are dropped from the cache so the next
    /// `resolve` rebuilds them; unchanged adapters keep their cached
    /// instance untouched.
    pub fn load_descriptors(&self, next: Vec<AdapterDescriptor>) -> ReloadSummary {
        let mut summary = ReloadSummary::default();
        let next_by_name: HashMap<String, AdapterDescriptor> = next.into_iter().map(|d| (d.name.clone(), d)).collect();

        let mut descriptors = self.descriptors.write().expect("registry descriptors lock poisoned");

        for name in descriptors.keys() {
            if !next_by_name.contains_key(name) {
                summary.removed.push(name.clone());
            }
        }
        for removed in &summary.removed {
            descriptors.remove(removed);
            self.instances.remove(removed);
        }

        for (name, descriptor) in &next_by_name {
            match descriptors.get(name) {
                None => summary.added.push(name.clone()),
                Some(existing) if existing.content_hash() != descriptor.content_hash() => {
                    summary.updated.push(name.clone());
                    self.instances.remove(name);
                }
                Some(_) => summary.unchanged.push(name.clone()),
            }
        }

        *descriptors = next_by_name;
        summary
    }

    #[must_use]
    pub fn descriptor(&self, name: &str) -> Option<AdapterDescriptor> {
        self.descriptors.read().expect("registry descriptors lock poisoned").get(name).cloned()
    }

    #[must_use]
    pub fn descriptor_names(&self) -> Vec<String> {
        self.descriptors.read().expect("registry descriptors lock poisoned").keys().cloned().collect()
    }

    fn build(&self, descriptor: &AdapterDescriptor) -> Result<Arc<dyn Adapter>, GatewayError> {
        let factories = self.factories.read().expect("registry factories lock poisoned");
        let factory = factories
            .get(&descriptor.implementation)
            .ok_or_else(|| GatewayError::config(format!("no adapter factory registered for implementation '{}'", descriptor.implementation)))?;
        factory(descriptor)
    }

    fn isolation_for(descriptor: &AdapterDescriptor) -> Isolation {
        match descriptor.config.get("isolation").and_then(serde_json::Value::as_str) {
            Some("dedicated_runtime") => Isolation::DedicatedRuntime,
            Some("worker_pool") => {
                let max_workers = descriptor
                    .config
                    .get("max_workers")
                    .and_then(serde_json::Value::as_u64)
                    .unwrap_or(4) as usize;
                Isolation::WorkerPool { max_workers }
            }
            _ => Isolation::None,
        }
    }

    fn breaker_config_for(&self, descriptor: &AdapterDescriptor) -> BreakerConfig {
        let mut config = self.default_breaker;
        let Some(overrides) = &descriptor.fault_tolerance else {
            return config;
        };
        if let Some(v) = overrides.failure_threshold {
            config.failure_threshold = v;
        }
        if let Some(v) = overrides.success_threshold {
            config.success_threshold = v;
        }
        if let Some(v) = overrides.recovery_timeout_ms {
            config.recovery_timeout = std::time::Duration::from_millis(v);
        }
        if let Some(v) = overrides.operation_timeout_ms {
            config.operation_timeout = std::time::Duration::from_millis(v);
        }
        config
    }
}

impl AdapterSource for AdapterRegistry {
    fn resolve(&self, name: &str) -> Option<ResolvedAdapter> {
        let descriptor = self.descriptor(name).filter(|d| d.enabled)?;
        let hash = descriptor.content_hash();

        if let Some(cached) = self.instances.get(name) {
            if cached.hash == hash {
                return Some(ResolvedAdapter {
                    adapter: cached.adapter.clone(),
                    isolation: Self::isolation_for(&descriptor),
                    breaker_config: self.breaker_config_for(&descriptor),
                });
            }
        }

        let adapter = match self.build(&descriptor) {
            Ok(adapter) => adapter,
            Err(err) => {
                warn!(adapter = name, error = %err, "failed to build adapter instance");
                return None;
            }
        };
        self.instances.insert(name.to_string(), CachedInstance { hash, adapter: adapter.clone() });

        Some(ResolvedAdapter {
            adapter,
            isolation: Self::isolation_for(&descriptor),
            breaker_config: self.breaker_config_for(&descriptor),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use orbit_core::{AdapterType, ContextItem, RetrieveOptions};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAdapter {
        name: String,
        builds: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Adapter for CountingAdapter {
        fn name(&self) -> &str {
            &self.name
        }
        async fn retrieve(&self, _query: &str, _options: &RetrieveOptions) -> Result<Vec<ContextItem>, GatewayError> {
            Ok(vec![])
        }
    }

    fn descriptor(name: &str, config_value: &str) -> AdapterDescriptor {
        let mut config = HashMap::new();
        config.insert("value".to_string(), serde_json::Value::String(config_value.to_string()));
        AdapterDescriptor {
            name: name.to_string(),
            adapter_type: AdapterType::Retriever,
            datasource: "stub".to_string(),
            implementation: "stub".to_string(),
            enabled: true,
            config,
            inference_provider: None,
            embedding_provider: None,
            fault_tolerance: None,
        }
    }

    #[test]
    fn unknown_adapter_name_resolves_to_none() {
        let registry = AdapterRegistry::new(BreakerConfig::default());
        assert!(registry.resolve("ghost").is_none());
    }

    #[test]
    fn disabled_adapter_resolves_to_none() {
        let registry = AdapterRegistry::new(BreakerConfig::default());
        let mut d = descriptor("kb", "a");
        d.enabled = false;
        registry.load_descriptors(vec![d]);
        assert!(registry.resolve("kb").is_none());
    }

    #[test]
    fn same_descriptor_reuses_the_cached_instance() {
        let registry = AdapterRegistry::new(BreakerConfig::default());
        let builds = Arc::new(AtomicUsize::new(0));
        let builds_clone = builds.clone();
        registry.register_factory("stub", move |d| {
            builds_clone.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(CountingAdapter { name: d.name.clone(), builds: builds_clone.clone() }))
        });

        registry.load_descriptors(vec![descriptor("kb", "a")]);
        registry.resolve("kb");
        registry.resolve("kb");
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn changed_content_hash_rebuilds_the_instance() {
        let registry = AdapterRegistry::new(BreakerConfig::default());
        let builds = Arc::new(AtomicUsize::new(0));
        let builds_clone = builds.clone();
        registry.register_factory("stub", move |d| {
            builds_clone.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(CountingAdapter { name: d.name.clone(), builds: builds_clone.clone() }))
        });

        registry.load_descriptors(vec![descriptor("kb", "a")]);
        registry.resolve("kb");
        registry.load_descriptors(vec![descriptor("kb", "b")]);
        registry.resolve("kb");
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reload_summary_reports_added_removed_updated_unchanged() {
        let registry = AdapterRegistry::new(BreakerConfig::default());
        registry.register_factory("stub", |d| Ok(Arc::new(CountingAdapter { name: d.name.clone(), builds: Arc::new(AtomicUsize::new(0)) })));

        registry.load_descriptors(vec![descriptor("kb", "a"), descriptor("files", "a")]);
        let summary = registry.load_descriptors(vec![descriptor("kb", "b"), descriptor("new", "a")]);

        assert_eq!(summary.added, vec!["new".to_string()]);
        assert_eq!(summary.removed, vec!["files".to_string()]);
        assert_eq!(summary.updated, vec!["kb".to_string()]);
        assert!(summary.unchanged.is_empty());
    }

    #[test]
    fn isolation_defaults_to_none_without_config() {
        let descriptor = descriptor("kb", "a");
        assert!(matches!(AdapterRegistry::isolation_for(&descriptor), Isolation::None));
    }

    #[test]
    fn fault_tolerance_overrides_are_applied_over_the_default() {
        let registry = AdapterRegistry::new(BreakerConfig::default());
        let mut d = descriptor("kb", "a");
        d.fault_tolerance = Some(orbit_core::FaultToleranceOverrides {
            failure_threshold: Some(9),
            success_threshold: None,
            recovery_timeout_ms: None,
            operation_timeout_ms: None,
        });
        let config = registry.breaker_config_for(&d);
        assert_eq!(config.failure_threshold, 9);
        assert_eq!(config.success_threshold, BreakerConfig::default().success_threshold);
    }
}
