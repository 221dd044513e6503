//! ABOUTME: Registries and managers for inference and embedding provider instances
//! ABOUTME: Providers are created lazily from factories and cached by "name:model"

use std::collections::HashMap;
use std::sync::Arc;

use orbit_core::GatewayError;
use tokio::sync::RwLock;

use crate::abstraction::ProviderConfig;
use crate::embedding::EmbeddingProvider;
use crate::inference::InferenceProvider;

type InferenceFactory = Box<dyn Fn(ProviderConfig) -> Result<Box<dyn InferenceProvider>, GatewayError> + Send + Sync>;
type EmbeddingFactory = Box<dyn Fn(ProviderConfig) -> Result<Box<dyn EmbeddingProvider>, GatewayError> + Send + Sync>;

/// Manages LLM inference providers: registers factories by vendor name,
/// instantiates and caches them by `"{name}:{model}"`, tracks a default.
pub struct InferenceProviderManager {
    factories: RwLock<HashMap<String, InferenceFactory>>,
    instances: RwLock<HashMap<String, Arc<dyn InferenceProvider>>>,
    default: RwLock<Option<String>>,
}

impl InferenceProviderManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
            instances: RwLock::new(HashMap::new()),
            default: RwLock::new(None),
        }
    }

    pub async fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(ProviderConfig) -> Result<Box<dyn InferenceProvider>, GatewayError> + Send + Sync + 'static,
    {
        self.factories.write().await.insert(name.into(), Box::new(factory));
    }

    /// Instantiates and validates a provider, making it available under
    /// `"{config.name}:{config.model}"`. The first provider registered
    /// becomes the default used when callers don't name one explicitly.
    pub async fn init_provider(&self, config: ProviderConfig) -> Result<(), GatewayError> {
        let instance_key = format!("{}:{}", config.name, config.model);
        let provider = {
            let factories = self.factories.read().await;
            let factory = factories
                .get(&config.name)
                .ok_or_else(|| GatewayError::config(format!("no inference provider factory registered for '{}'", config.name)))?;
            factory(config)?
        };
        provider.validate().await?;

        self.instances.write().await.insert(instance_key.clone(), Arc::from(provider));
        let mut default = self.default.write().await;
        if default.is_none() {
            *default = Some(instance_key);
        }
        Ok(())
    }

    pub async fn get(&self, name: Option<&str>) -> Result<Arc<dyn InferenceProvider>, GatewayError> {
        let key = match name {
            Some(n) => n.to_string(),
            None => self
                .default
                .read()
                .await
                .clone()
                .ok_or_else(|| GatewayError::config("no default inference provider configured"))?,
        };
        self.instances
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| GatewayError::config(format!("inference provider '{key}' not initialized")))
    }
}

impl Default for InferenceProviderManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Same shape as [`InferenceProviderManager`] for the embedding capability -
/// kept as a separate, non-generic type to mirror how the rest of this
/// workspace favors concrete types over trait-generic plumbing.
pub struct EmbeddingProviderManager {
    factories: RwLock<HashMap<String, EmbeddingFactory>>,
    instances: RwLock<HashMap<String, Arc<dyn EmbeddingProvider>>>,
    default: RwLock<Option<String>>,
}

impl EmbeddingProviderManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
            instances: RwLock::new(HashMap::new()),
            default: RwLock::new(None),
        }
    }

    pub async fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(ProviderConfig) -> Result<Box<dyn EmbeddingProvider>, GatewayError> + Send + Sync + 'static,
    {
        self.factories.write().await.insert(name.into(), Box::new(factory));
    }

    pub async fn init_provider(&self, config: ProviderConfig) -> Result<(), GatewayError> {
        let instance_key = format!("{}:{}", config.name, config.model);
        let provider = {
            let factories = self.factories.read().await;
            let factory = factories
                .get(&config.name)
                .ok_or_else(|| GatewayError::config(format!("no embedding provider factory registered for '{}'", config.name)))?;
            factory(config)?
        };
        provider.validate().await?;

        self.instances.write().await.insert(instance_key.clone(), Arc::from(provider));
        let mut default = self.default.write().await;
        if default.is_none() {
            *default = Some(instance_key);
        }
        Ok(())
    }

    pub async fn get(&self, name: Option<&str>) -> Result<Arc<dyn EmbeddingProvider>, GatewayError> {
        let key = match name {
            Some(n) => n.to_string(),
            None => self
                .default
                .read()
                .await
                .clone()
                .ok_or_else(|| GatewayError::config("no default embedding provider configured"))?,
        };
        self.instances
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| GatewayError::config(format!("embedding provider '{key}' not initialized")))
    }
}

impl Default for EmbeddingProviderManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstraction::ProviderCapabilities;
    use async_trait::async_trait;

    struct StubInference {
        name: String,
        model: String,
        caps: ProviderCapabilities,
    }

    #[async_trait]
    impl InferenceProvider for StubInference {
        fn name(&self) -> &str {
            &self.name
        }
        fn model(&self) -> &str {
            &self.model
        }
        fn capabilities(&self) -> &ProviderCapabilities {
            &self.caps
        }
        async fn complete(&self, request: &crate::inference::CompletionRequest) -> Result<String, GatewayError> {
            Ok(format!("echo:{}", request.prompt))
        }
        async fn validate(&self) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn first_registered_provider_becomes_the_default() {
        let manager = InferenceProviderManager::new();
        manager
            .register("stub", |config| {
                Ok(Box::new(StubInference {
                    name: config.name,
                    model: config.model,
                    caps: ProviderCapabilities::default(),
                }))
            })
            .await;
        manager
            .init_provider(ProviderConfig::new("stub", "v1"))
            .await
            .unwrap();

        let provider = manager.get(None).await.unwrap();
        assert_eq!(provider.model(), "v1");
    }

    #[tokio::test]
    async fn unregistered_provider_name_is_a_config_error() {
        let manager = InferenceProviderManager::new();
        let err = manager.init_provider(ProviderConfig::new("ghost", "v1")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Config { .. }));
    }
}
