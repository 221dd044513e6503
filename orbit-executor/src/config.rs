//! ABOUTME: Fan-out strategy and scheduling knobs for the parallel adapter executor

use std::time::Duration;

/// How the executor decides when enough adapters have answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Wait for every adapter or until `execution_timeout` elapses.
    All,
    /// Return as soon as one adapter yields `success=true` with non-empty
    /// data; the rest are cancelled.
    FirstSuccess,
    /// Wait up to `execution_timeout`; return whatever completed, treating
    /// the rest as timed out.
    BestEffort,
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub strategy: Strategy,
    /// Upper bound on adapters running at once across a single `execute` call.
    pub max_concurrent_adapters: usize,
    /// Overall deadline for the whole fan-out, independent of any per-adapter
    /// circuit breaker timeout. The effective per-call deadline is the
    /// minimum of this and the adapter's own `operation_timeout`.
    pub execution_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::All,
            max_concurrent_adapters: 8,
            execution_timeout: Duration::from_secs(15),
        }
    }
}
