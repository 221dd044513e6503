//! ABOUTME: Serializable executor strategy/scheduling, converted into orbit_executor types

use std::time::Duration;

use orbit_executor::{ExecutorConfig, Strategy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfigToml {
    /// One of "all", "first_success", "best_effort".
    pub strategy: String,
    pub max_concurrent_adapters: usize,
    pub execution_timeout_ms: u64,
}

impl Default for ExecutorConfigToml {
    fn default() -> Self {
        let defaults = ExecutorConfig::default();
        Self {
            strategy: "all".to_string(),
            max_concurrent_adapters: defaults.max_concurrent_adapters,
            execution_timeout_ms: defaults.execution_timeout.as_millis() as u64,
        }
    }
}

impl ExecutorConfigToml {
    pub fn validate(&self) -> Result<(), String> {
        match self.strategy.as_str() {
            "all" | "first_success" | "best_effort" => Ok(()),
            other => Err(format!(
                "executor.strategy must be one of all|first_success|best_effort, got '{other}'"
            )),
        }
    }
}

impl TryFrom<&ExecutorConfigToml> for ExecutorConfig {
    type Error = String;

    fn try_from(toml: &ExecutorConfigToml) -> Result<Self, Self::Error> {
        toml.validate()?;
        let strategy = match toml.strategy.as_str() {
            "all" => Strategy::All,
            "first_success" => Strategy::FirstSuccess,
            "best_effort" => Strategy::BestEffort,
            other => return Err(format!("unknown executor strategy '{other}'")),
        };
        Ok(Self {
            strategy,
            max_concurrent_adapters: toml.max_concurrent_adapters,
            execution_timeout: Duration::from_millis(toml.execution_timeout_ms),
        })
    }
}
