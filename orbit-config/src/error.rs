//! ABOUTME: Config-specific error type - fatal only at startup, per the gateway error taxonomy

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config validation failed: {0}")]
    Validation(String),
}

impl From<ConfigError> for orbit_core::GatewayError {
    fn from(err: ConfigError) -> Self {
        orbit_core::GatewayError::config(err.to_string())
    }
}
