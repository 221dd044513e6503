//! ABOUTME: Error taxonomy shared across every ORBIT crate
//! ABOUTME: Mirrors the gateway's error propagation policy - each layer converts to this vocabulary

use thiserror::Error;

/// The gateway-wide error taxonomy.
///
/// Every subsystem converts its internal errors into one of these variants at
/// its boundary. `CircuitOpen`, `OperationTimeout`, `TemplateMatchError`, and
/// `ParameterValidationError` are never surfaced to an HTTP client as a 5xx -
/// callers that receive them are expected to degrade gracefully instead of
/// propagating them further.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Invalid or missing required configuration. Fatal only at startup.
    #[error("configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Returned by the throttle middleware as an HTTP 429.
    #[error("quota exceeded for key {key}: {period} limit reached")]
    QuotaExceeded { key: String, period: QuotaPeriod },

    /// Returned by the executor as an adapter failure; never raised to the client directly.
    #[error("circuit open for adapter '{adapter}'")]
    CircuitOpen { adapter: String },

    /// A call exceeded its enforced deadline. Counted as a circuit-breaker failure.
    #[error("operation timed out after {elapsed_ms}ms (limit {limit_ms}ms)")]
    OperationTimeout { elapsed_ms: u64, limit_ms: u64 },

    /// No template matched above `confidence_threshold`.
    #[error("no template matched query above confidence threshold")]
    TemplateMatchError,

    /// A required parameter was missing, or a value failed validation.
    #[error("parameter validation failed: {reason}")]
    ParameterValidationError { reason: String },

    /// Any wire-level failure from a datasource, truncated to avoid leaking internals.
    #[error("backend error from '{backend}': {message}")]
    BackendError { backend: String, message: String },

    /// Caught at the outermost boundary only; indicates a logic bug, not a request error.
    #[error("internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl GatewayError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        const MAX_LEN: usize = 500;
        let mut message = message.into();
        if message.len() > MAX_LEN {
            message.truncate(MAX_LEN);
            message.push_str("...(truncated)");
        }
        Self::BackendError {
            backend: backend.into(),
            message,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Whether this error should ever be allowed to escape as an HTTP 5xx.
    /// Everything except `Internal` is handled by a dedicated fallback path.
    #[must_use]
    pub const fn is_escaping_fault(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Which quota period was breached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaPeriod {
    Daily,
    Monthly,
}

impl std::fmt::Display for QuotaPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Monthly => write!(f, "monthly"),
        }
    }
}

/// Convenience result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, GatewayError>;
