//! ABOUTME: Per-adapter circuit breaker: closed/open/half-open with timeout accounting
//! ABOUTME: Isolation (inline/worker-pool/dedicated-runtime) never changes the state machine

mod config;
mod manager;
mod runtime_pool;

pub use config::{BreakerConfig, Isolation};
pub use manager::CircuitBreakerManager;

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// What went wrong executing an operation through the breaker.
#[derive(Debug, thiserror::Error)]
pub enum BreakerError {
    #[error("circuit open")]
    Open,
    #[error("operation timed out after {elapsed_ms}ms (limit {limit_ms}ms)")]
    Timeout { elapsed_ms: u64, limit_ms: u64 },
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

#[derive(Debug, Default)]
struct ResponseWindow {
    samples: std::collections::VecDeque<Duration>,
}

const WINDOW_CAP: usize = 100;

impl ResponseWindow {
    fn push(&mut self, d: Duration) {
        if self.samples.len() >= WINDOW_CAP {
            self.samples.pop_front();
        }
        self.samples.push_back(d);
    }

    fn average(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.samples.iter().sum();
        total / self.samples.len() as u32
    }
}

/// Point-in-time snapshot of one breaker's counters, for `/health/adapters`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CircuitBreakerStats {
    pub adapter_name: String,
    pub state: BreakerState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub timeout: u64,
    pub avg_response_time: Duration,
}

/// A single adapter's circuit breaker.
///
/// All state transitions are serialized by `transition_lock` - cross-adapter
/// breakers are fully independent, each guarded by its own mutex.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    state: parking_lot::RwLock<BreakerState>,
    transition_lock: tokio::sync::Mutex<()>,
    consecutive_failures: AtomicU32,
    consecutive_successes: AtomicU32,
    last_failure_time: parking_lot::RwLock<Option<Instant>>,
    last_success_time: parking_lot::RwLock<Option<Instant>>,
    state_change_time: parking_lot::RwLock<Instant>,
    total: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    timeout: AtomicU64,
    response_window: parking_lot::Mutex<ResponseWindow>,
    half_open_probe_in_flight: AtomicBool,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: parking_lot::RwLock::new(BreakerState::Closed),
            transition_lock: tokio::sync::Mutex::new(()),
            consecutive_failures: AtomicU32::new(0),
            consecutive_successes: AtomicU32::new(0),
            last_failure_time: parking_lot::RwLock::new(None),
            last_success_time: parking_lot::RwLock::new(None),
            state_change_time: parking_lot::RwLock::new(Instant::now()),
            total: AtomicU64::new(0),
            successful: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            timeout: AtomicU64::new(0),
            response_window: parking_lot::Mutex::new(ResponseWindow::default()),
            half_open_probe_in_flight: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn state(&self) -> BreakerState {
        *self.state.read()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `operation` through the breaker: timeout enforcement, isolation,
    /// fast-fail when open, and failure/success accounting.
    ///
    /// `operation` and its output must be `'static` because worker-pool and
    /// dedicated-runtime isolation may hand the future to another task.
    /// Callers (the executor) own short-lived query data and should clone it
    /// into the closure rather than borrow it.
    pub async fn execute<F, Fut, T>(&self, isolation: &Isolation, operation: F) -> Result<T, BreakerError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        if !self.admit_call().await {
            return Err(BreakerError::Open);
        }

        let timeout = self.effective_timeout();
        let start = Instant::now();
        let outcome = Self::run_isolated(isolation, timeout, operation).await;
        let elapsed = start.elapsed();

        match outcome {
            Ok(Ok(value)) => {
                self.record_success(elapsed);
                Ok(value)
            }
            Ok(Err(err)) => {
                self.record_failure();
                Err(BreakerError::Failed(err))
            }
            Err(_elapsed_timeout) => {
                self.timeout.fetch_add(1, Ordering::Relaxed);
                self.record_failure();
                Err(BreakerError::Timeout {
                    elapsed_ms: elapsed.as_millis() as u64,
                    limit_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    #[must_use]
    pub fn effective_timeout(&self) -> Duration {
        self.config.operation_timeout
    }

    async fn run_isolated<F, Fut, T>(
        isolation: &Isolation,
        timeout: Duration,
        operation: F,
    ) -> Result<anyhow::Result<T>, tokio::time::error::Elapsed>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        match isolation {
            Isolation::None => tokio::time::timeout(timeout, operation()).await,
            Isolation::WorkerPool { .. } => {
                // The semaphore permit is acquired by the executor (see
                // `CircuitBreakerManager::acquire_worker_permit`) before
                // this point; here we only need the timeout around the
                // spawned task so a hung operation does not retain its
                // permit forever.
                let handle = tokio::spawn(operation());
                tokio::time::timeout(timeout, async move {
                    handle
                        .await
                        .unwrap_or_else(|e| Err(anyhow::anyhow!("adapter task panicked: {e}")))
                })
                .await
            }
            Isolation::DedicatedRuntime => {
                let fut = operation();
                tokio::time::timeout(timeout, runtime_pool::run_on_dedicated_runtime(fut)).await
            }
        }
    }

    /// `can_execute` plus the state transition it may trigger, plus
    /// half-open probe serialization. Returns `false` when the call must be
    /// fast-failed as `CircuitOpen`.
    async fn admit_call(&self) -> bool {
        let current = self.state();
        match current {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let elapsed = self.state_change_time.read().elapsed();
                if elapsed < self.config.recovery_timeout {
                    return false;
                }
                let _guard = self.transition_lock.lock().await;
                // Re-check under the lock: another task may have already
                // transitioned us to half-open.
                if self.state() == BreakerState::Open {
                    self.transition_to(BreakerState::HalfOpen);
                }
                self.try_claim_half_open_probe()
            }
            BreakerState::HalfOpen => self.try_claim_half_open_probe(),
        }
    }

    fn try_claim_half_open_probe(&self) -> bool {
        self.half_open_probe_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn release_half_open_probe(&self) {
        self.half_open_probe_in_flight.store(false, Ordering::Release);
    }

    fn record_success(&self, elapsed: Duration) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.successful.fetch_add(1, Ordering::Relaxed);
        *self.last_success_time.write() = Some(Instant::now());
        self.response_window.lock().push(elapsed);

        let current = self.state();
        if current == BreakerState::HalfOpen {
            self.release_half_open_probe();
            let successes = self.consecutive_successes.fetch_add(1, Ordering::AcqRel) + 1;
            if successes >= self.config.success_threshold {
                self.transition_to(BreakerState::Closed);
            }
        } else if current == BreakerState::Closed {
            self.consecutive_failures.store(0, Ordering::Release);
        }
    }

    fn record_failure(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
        *self.last_failure_time.write() = Some(Instant::now());

        let current = self.state();
        match current {
            BreakerState::Closed => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
                if failures >= self.config.failure_threshold {
                    self.transition_to(BreakerState::Open);
                }
            }
            BreakerState::HalfOpen => {
                self.release_half_open_probe();
                self.transition_to(BreakerState::Open);
            }
            BreakerState::Open => {}
        }
    }

    fn transition_to(&self, new_state: BreakerState) {
        let mut state = self.state.write();
        if *state == new_state {
            return;
        }
        info!(adapter = %self.name, from = ?*state, to = ?new_state, "circuit breaker state transition");
        *state = new_state;
        *self.state_change_time.write() = Instant::now();
        match new_state {
            BreakerState::Closed => {
                self.consecutive_failures.store(0, Ordering::Release);
                self.consecutive_successes.store(0, Ordering::Release);
            }
            BreakerState::HalfOpen => {
                self.consecutive_successes.store(0, Ordering::Release);
            }
            BreakerState::Open => {}
        }
    }

    /// Bypass the state machine; still logs and updates `state_change_time`.
    pub fn force_open(&self) {
        warn!(adapter = %self.name, "circuit breaker forced open");
        self.transition_to(BreakerState::Open);
    }

    /// Bypass the state machine; still logs and updates `state_change_time`.
    pub fn force_close(&self) {
        warn!(adapter = %self.name, "circuit breaker forced closed");
        self.transition_to(BreakerState::Closed);
    }

    /// Reset all counters and close the circuit. Does not change `state` if
    /// already closed, only the counters.
    pub fn reset(&self) {
        self.transition_to(BreakerState::Closed);
        self.total.store(0, Ordering::Relaxed);
        self.successful.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.timeout.store(0, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.consecutive_successes.store(0, Ordering::Relaxed);
        self.response_window.lock().samples.clear();
        *self.last_failure_time.write() = None;
        *self.last_success_time.write() = None;
    }

    #[must_use]
    pub fn stats(&self) -> CircuitBreakerStats {
        CircuitBreakerStats {
            adapter_name: self.name.clone(),
            state: self.state(),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            consecutive_successes: self.consecutive_successes.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
            successful: self.successful.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timeout: self.timeout.load(Ordering::Relaxed),
            avg_response_time: self.response_window.lock().average(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> BreakerConfig {
        BreakerConfig {
            failure_threshold: 2,
            success_threshold: 2,
            recovery_timeout: Duration::from_millis(50),
            operation_timeout: Duration::from_millis(200),
        }
    }

    async fn ok_op() -> anyhow::Result<u32> {
        Ok(42)
    }

    async fn err_op() -> anyhow::Result<u32> {
        Err(anyhow::anyhow!("boom"))
    }

    #[tokio::test]
    async fn opens_after_failure_threshold_and_fast_fails() {
        let breaker = CircuitBreaker::new("adapter", fast_config());

        assert!(breaker.execute(&Isolation::None, err_op).await.is_err());
        assert_eq!(breaker.state(), BreakerState::Closed);

        assert!(breaker.execute(&Isolation::None, err_op).await.is_err());
        assert_eq!(breaker.state(), BreakerState::Open);

        let result = breaker.execute(&Isolation::None, ok_op).await;
        assert!(matches!(result, Err(BreakerError::Open)));
    }

    #[tokio::test]
    async fn recovers_through_half_open_after_timeout() {
        let breaker = CircuitBreaker::new("adapter", fast_config());
        let _ = breaker.execute(&Isolation::None, err_op).await;
        let _ = breaker.execute(&Isolation::None, err_op).await;
        assert_eq!(breaker.state(), BreakerState::Open);

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(breaker.execute(&Isolation::None, ok_op).await.is_ok());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        assert!(breaker.execute(&Isolation::None, ok_op).await.is_ok());
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens_immediately() {
        let breaker = CircuitBreaker::new("adapter", fast_config());
        let _ = breaker.execute(&Isolation::None, err_op).await;
        let _ = breaker.execute(&Isolation::None, err_op).await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        let result = breaker.execute(&Isolation::None, err_op).await;
        assert!(result.is_err());
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn timeout_counts_as_failure_and_increments_timeout_metric() {
        let breaker = CircuitBreaker::new(
            "adapter",
            BreakerConfig {
                failure_threshold: 1,
                success_threshold: 1,
                recovery_timeout: Duration::from_millis(50),
                operation_timeout: Duration::from_millis(10),
            },
        );

        let result = breaker
            .execute(&Isolation::None, || async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok::<_, anyhow::Error>(1)
            })
            .await;

        assert!(matches!(result, Err(BreakerError::Timeout { .. })));
        assert_eq!(breaker.state(), BreakerState::Open);
        assert_eq!(breaker.stats().timeout, 1);
    }

    #[tokio::test]
    async fn force_open_bypasses_thresholds() {
        let breaker = CircuitBreaker::new("adapter", BreakerConfig::default());
        assert_eq!(breaker.state(), BreakerState::Closed);
        breaker.force_open();
        assert_eq!(breaker.state(), BreakerState::Open);
        breaker.force_close();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn reset_clears_counters_without_requiring_open_state() {
        let breaker = CircuitBreaker::new("adapter", fast_config());
        let _ = breaker.execute(&Isolation::None, err_op).await;
        assert_eq!(breaker.stats().failed, 1);
        breaker.reset();
        assert_eq!(breaker.stats().failed, 0);
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn half_open_admits_exactly_one_concurrent_probe() {
        let breaker = Arc::new(CircuitBreaker::new("adapter", fast_config()));
        let _ = breaker.execute(&Isolation::None, err_op).await;
        let _ = breaker.execute(&Isolation::None, err_op).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(breaker.state(), BreakerState::Open);

        // Manually drive half-open admission without consuming the probe,
        // then verify a second concurrent admit is rejected.
        assert!(breaker.admit_call().await);
        assert!(!breaker.try_claim_half_open_probe());
        breaker.release_half_open_probe();
    }
}
