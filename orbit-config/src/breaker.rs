//! ABOUTME: Serializable circuit breaker tuning, converted into orbit_breaker::BreakerConfig

use std::time::Duration;

use orbit_breaker::BreakerConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfigToml {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub recovery_timeout_ms: u64,
    pub operation_timeout_ms: u64,
}

impl Default for BreakerConfigToml {
    fn default() -> Self {
        let defaults = BreakerConfig::default();
        Self {
            failure_threshold: defaults.failure_threshold,
            success_threshold: defaults.success_threshold,
            recovery_timeout_ms: defaults.recovery_timeout.as_millis() as u64,
            operation_timeout_ms: defaults.operation_timeout.as_millis() as u64,
        }
    }
}

impl BreakerConfigToml {
    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("circuit_breaker.failure_threshold must be >= 1".to_string());
        }
        if self.success_threshold == 0 {
            return Err("circuit_breaker.success_threshold must be >= 1".to_string());
        }
        Ok(())
    }
}

impl From<&BreakerConfigToml> for BreakerConfig {
    fn from(toml: &BreakerConfigToml) -> Self {
        Self {
            failure_threshold: toml.failure_threshold,
            success_threshold: toml.success_threshold,
            recovery_timeout: Duration::from_millis(toml.recovery_timeout_ms),
            operation_timeout: Duration::from_millis(toml.operation_timeout_ms),
        }
    }
}
