//! ABOUTME: Debug/observability toggles read by the CLI's tracing-subscriber bootstrap

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub enabled: bool,
    /// `tracing_subscriber::EnvFilter` directive, e.g. "orbit=debug,info".
    pub level: String,
    pub json_output: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "info".to_string(),
            json_output: false,
        }
    }
}
