//! ABOUTME: Typed configuration tree for the ORBIT gateway
//! ABOUTME: TOML-first loading, ORBIT_<SECTION>_<KEY> environment overrides, warn-not-crash on unknown keys

pub mod breaker;
pub mod datasources;
pub mod debug;
mod error;
pub mod executor;
pub mod providers;
pub mod quota;
pub mod templates;

pub use breaker::BreakerConfigToml;
pub use datasources::{DatasourceConfig, DatasourceKind, DatasourcesConfig};
pub use debug::DebugConfig;
pub use error::ConfigError;
pub use executor::ExecutorConfigToml;
pub use orbit_core::{AdapterDescriptor, FaultToleranceOverrides};
pub use providers::{ProviderEntryConfig, ProviderManagerConfig};
pub use quota::{DelayCurve, QuotaConfig, ThrottleConfig};
pub use templates::TemplateStoreConfig;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// The gateway's whole configuration, composed the way
/// `LLMSpellConfig` composes `ProviderManagerConfig`/`RAGConfig`/`ToolsConfig`:
/// one typed section per subsystem, each independently defaultable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    pub adapters: Vec<AdapterDescriptor>,
    pub providers: ProviderManagerConfig,
    pub executor: ExecutorConfigToml,
    pub circuit_breaker: BreakerConfigToml,
    pub quota: QuotaConfig,
    pub throttle: ThrottleConfig,
    pub templates: TemplateStoreConfig,
    pub datasources: DatasourcesConfig,
    pub debug: DebugConfig,
}

const KNOWN_TOP_LEVEL_KEYS: &[&str] = &[
    "adapters",
    "providers",
    "executor",
    "circuit_breaker",
    "quota",
    "throttle",
    "templates",
    "datasources",
    "debug",
];

impl OrbitConfig {
    /// Loads from `path`, applying `ORBIT_<SECTION>_<KEY>` environment
    /// overrides on top (env wins), then validates. Unknown top-level keys
    /// are logged at `warn` rather than rejected, so a forward-compatible or
    /// typo'd key doesn't fail startup.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Self::warn_on_unknown_keys(content);

        let mut config: Self = toml::from_str(content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn warn_on_unknown_keys(content: &str) {
        let Ok(raw) = toml::from_str::<toml::Value>(content) else {
            return;
        };
        let Some(table) = raw.as_table() else {
            return;
        };
        for key in table.keys() {
            if !KNOWN_TOP_LEVEL_KEYS.contains(&key.as_str()) {
                warn!(key, "unknown top-level config key, ignoring");
            }
        }
    }

    /// Environment overrides layered via the `config` crate's `Environment`
    /// source, prefix `ORBIT`, double underscore as the section/key
    /// separator (a single `_` would collide with underscores already inside
    /// field names like `redis_url`) - e.g. `ORBIT_QUOTA__REDIS_URL`
    /// overrides `quota.redis_url`.
    fn apply_env_overrides(&mut self) {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("ORBIT")
                .separator("__")
                .try_parsing(true),
        );
        let Ok(layered) = builder.build() else {
            return;
        };

        if let Ok(redis_url) = layered.get_string("quota.redis_url") {
            self.quota.redis_url = redis_url;
        }
        if let Ok(daily_limit) = layered.get_int("quota.default_daily_limit") {
            self.quota.default_daily_limit = Some(daily_limit.max(0) as u64);
        }
        if let Ok(monthly_limit) = layered.get_int("quota.default_monthly_limit") {
            self.quota.default_monthly_limit = Some(monthly_limit.max(0) as u64);
        }
        if let Ok(enabled) = layered.get_bool("throttle.enabled") {
            self.throttle.enabled = enabled;
        }
        if let Ok(level) = layered.get_string("debug.level") {
            self.debug.level = level;
        }
        if let Ok(enabled) = layered.get_bool("debug.enabled") {
            self.debug.enabled = enabled;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.circuit_breaker.validate().map_err(ConfigError::Validation)?;
        self.executor.validate().map_err(ConfigError::Validation)?;
        self.throttle.validate().map_err(ConfigError::Validation)?;
        self.templates.validate().map_err(ConfigError::Validation)?;

        let mut seen = std::collections::HashSet::new();
        for adapter in &self.adapters {
            if !seen.insert(&adapter.name) {
                return Err(ConfigError::Validation(format!(
                    "duplicate adapter name '{}'",
                    adapter.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_cleanly() {
        let config = OrbitConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_minimal_toml_with_section_overrides() {
        let toml = r#"
            [quota]
            redis_url = "redis://example:6380"
            default_daily_limit = 500

            [throttle]
            threshold_percent = 0.5
        "#;
        let config = OrbitConfig::from_toml(toml).unwrap();
        assert_eq!(config.quota.redis_url, "redis://example:6380");
        assert_eq!(config.quota.default_daily_limit, Some(500));
        assert_eq!(config.throttle.threshold_percent, 0.5);
    }

    #[test]
    fn rejects_duplicate_adapter_names() {
        let toml = r#"
            [[adapters]]
            name = "kb"
            adapter_type = "retriever"
            datasource = "chroma"
            implementation = "chroma"
            enabled = true

            [[adapters]]
            name = "kb"
            adapter_type = "retriever"
            datasource = "chroma2"
            implementation = "chroma"
            enabled = true
        "#;
        let err = OrbitConfig::from_toml(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn zero_failure_threshold_is_rejected() {
        let toml = r#"
            [circuit_breaker]
            failure_threshold = 0
        "#;
        let err = OrbitConfig::from_toml(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn unknown_top_level_key_does_not_fail_parsing() {
        let toml = r#"
            totally_made_up_section = true
        "#;
        assert!(OrbitConfig::from_toml(toml).is_ok());
    }
}
