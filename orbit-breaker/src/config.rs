//! ABOUTME: Circuit breaker tuning knobs, with presets mirroring common operator profiles

use std::time::Duration;

/// Tuning knobs for one circuit breaker instance.
///
/// Defaults favor fast failure detection over patience, consistent with a
/// gateway that must keep serving other adapters while one backend recovers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakerConfig {
    /// Consecutive failures (closed state) before the circuit opens.
    pub failure_threshold: u32,
    /// Consecutive successes (half-open state) before the circuit closes.
    pub success_threshold: u32,
    /// How long the circuit stays open before admitting a half-open probe.
    pub recovery_timeout: Duration,
    /// Hard per-call timeout enforced regardless of isolation mode.
    pub operation_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            recovery_timeout: Duration::from_secs(30),
            operation_timeout: Duration::from_secs(10),
        }
    }
}

impl BreakerConfig {
    /// Aggressive detection, short recovery window - for cheap, high-volume adapters.
    #[must_use]
    pub fn fast_fail() -> Self {
        Self {
            failure_threshold: 2,
            success_threshold: 1,
            recovery_timeout: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(2),
        }
    }

    /// Patient profile - for slow but reliable backends where a single
    /// transient hiccup should not flip the circuit.
    #[must_use]
    pub fn conservative() -> Self {
        Self {
            failure_threshold: 8,
            success_threshold: 3,
            recovery_timeout: Duration::from_secs(60),
            operation_timeout: Duration::from_secs(30),
        }
    }
}

/// How the operation passed to `CircuitBreaker::execute` is actually run.
///
/// The isolation choice never changes the state-machine semantics (spec
/// 4.1) - it only changes where the `Future` is polled.
#[derive(Clone)]
pub enum Isolation {
    /// Poll inline on the caller's task; timeout is still enforced.
    None,
    /// Bounded worker pool: at most `max_workers` operations in flight for
    /// this adapter at once, others queue for a permit.
    WorkerPool { max_workers: usize },
    /// Heavier isolation for badly-behaved backends: the operation runs on
    /// a dedicated multi-thread runtime rather than sharing the gateway's
    /// main Tokio runtime, so a backend that blocks its thread cannot
    /// starve unrelated requests. This is thread-level, not OS-process,
    /// isolation - a single Rust binary has no cheap way to sandbox a
    /// misbehaving async dependency into another process.
    DedicatedRuntime,
}

impl std::fmt::Debug for Isolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "Isolation::None"),
            Self::WorkerPool { max_workers } => {
                write!(f, "Isolation::WorkerPool{{max_workers: {max_workers}}}")
            }
            Self::DedicatedRuntime => write!(f, "Isolation::DedicatedRuntime"),
        }
    }
}
