//! ABOUTME: Bounded, circuit-broken, timeout-enforced fan-out over retrieval adapters
//! ABOUTME: Strategies (all/first_success/best_effort) only change when results are returned

mod config;

pub use config::{ExecutorConfig, Strategy};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use orbit_breaker::{BreakerConfig, BreakerError, CircuitBreakerManager, Isolation};
use orbit_core::{Adapter, AdapterResult, RetrieveOptions};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Everything the executor needs to run one adapter: the adapter itself plus
/// the isolation mode and breaker tuning its descriptor calls for. Produced
/// by whatever owns the adapter registry (`orbit-retrievers`).
#[derive(Clone)]
pub struct ResolvedAdapter {
    pub adapter: Arc<dyn Adapter>,
    pub isolation: Isolation,
    pub breaker_config: BreakerConfig,
}

/// Looks up a named adapter's current, hot-reloadable configuration.
pub trait AdapterSource: Send + Sync {
    fn resolve(&self, name: &str) -> Option<ResolvedAdapter>;
}

/// Fan-out executor: one call per request, many adapters, one breaker each.
pub struct ParallelAdapterExecutor {
    breakers: Arc<CircuitBreakerManager>,
    source: Arc<dyn AdapterSource>,
    config: ExecutorConfig,
}

enum TaskOutcome {
    Success(AdapterResult),
    Failure(AdapterResult),
}

impl ParallelAdapterExecutor {
    #[must_use]
    pub fn new(source: Arc<dyn AdapterSource>, breakers: Arc<CircuitBreakerManager>, config: ExecutorConfig) -> Self {
        Self { breakers, source, config }
    }

    /// Fans `query` out to every name in `adapter_names`. Always returns
    /// exactly one `AdapterResult` per requested name, in the order given.
    pub async fn execute(
        &self,
        query: &str,
        adapter_names: &[String],
        options: &RetrieveOptions,
    ) -> Vec<AdapterResult> {
        if adapter_names.is_empty() {
            return Vec::new();
        }

        let concurrency = Arc::new(Semaphore::new(self.config.max_concurrent_adapters.max(1)));
        let mut join_set: JoinSet<(usize, TaskOutcome)> = JoinSet::new();

        for (index, name) in adapter_names.iter().enumerate() {
            let Some(resolved) = self.source.resolve(name) else {
                join_set.spawn(std::future::ready((
                    index,
                    TaskOutcome::Failure(AdapterResult::failure(
                        name.clone(),
                        "adapter not found",
                        Duration::ZERO,
                    )),
                )));
                continue;
            };

            let breaker = self.breakers.get_or_create(name, resolved.breaker_config);
            let permit_pool = concurrency.clone();
            let name = name.clone();
            let query = query.to_string();
            let options = options.clone();
            let isolation = resolved.isolation.clone();
            let adapter = resolved.adapter.clone();

            join_set.spawn(async move {
                let _permit = permit_pool
                    .acquire_owned()
                    .await
                    .expect("executor semaphore is never closed");
                let outcome = Self::run_one(&name, &breaker, &isolation, adapter, query, options).await;
                (index, outcome)
            });
        }

        match self.config.strategy {
            Strategy::FirstSuccess => self.drain_first_success(join_set, adapter_names).await,
            Strategy::All | Strategy::BestEffort => self.drain_with_deadline(join_set, adapter_names).await,
        }
    }

    async fn run_one(
        name: &str,
        breaker: &orbit_breaker::CircuitBreaker,
        isolation: &Isolation,
        adapter: Arc<dyn Adapter>,
        query: String,
        options: RetrieveOptions,
    ) -> TaskOutcome {
        let start = Instant::now();
        let op = move || async move { adapter.retrieve(&query, &options).await.map_err(anyhow::Error::from) };

        match breaker.execute(isolation, op).await {
            Ok(data) => {
                let elapsed = start.elapsed();
                TaskOutcome::Success(AdapterResult::success(name, data, elapsed))
            }
            Err(BreakerError::Open) => {
                debug!(adapter = name, "circuit open, short-circuiting");
                TaskOutcome::Failure(AdapterResult::failure(name, "circuit open", start.elapsed()))
            }
            Err(BreakerError::Timeout { elapsed_ms, limit_ms }) => {
                warn!(adapter = name, elapsed_ms, limit_ms, "adapter operation timed out");
                TaskOutcome::Failure(AdapterResult::failure(
                    name,
                    format!("timed out after {elapsed_ms}ms (limit {limit_ms}ms)"),
                    start.elapsed(),
                ))
            }
            Err(BreakerError::Failed(err)) => {
                TaskOutcome::Failure(AdapterResult::failure(name, err.to_string(), start.elapsed()))
            }
        }
    }

    /// `all` / `best_effort`: wait for everything or until `execution_timeout`,
    /// whichever comes first. Anything still outstanding at the deadline is
    /// aborted and recorded as cancelled — its own in-flight breaker call, if
    /// any, is simply dropped rather than marked success or failure.
    async fn drain_with_deadline(
        &self,
        mut join_set: JoinSet<(usize, TaskOutcome)>,
        adapter_names: &[String],
    ) -> Vec<AdapterResult> {
        let mut results: HashMap<usize, AdapterResult> = HashMap::with_capacity(adapter_names.len());
        let deadline = tokio::time::Instant::now() + self.config.execution_timeout;

        loop {
            if results.len() == adapter_names.len() {
                break;
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, join_set.join_next()).await {
                Ok(Some(Ok((index, outcome)))) => {
                    results.insert(index, Self::unwrap_outcome(outcome));
                }
                Ok(Some(Err(join_err))) => {
                    warn!(error = %join_err, "adapter task panicked");
                }
                Ok(None) => break,
                Err(_elapsed) => break,
            }
        }

        join_set.abort_all();
        self.fill_missing(results, adapter_names, "execution timeout exceeded")
    }

    /// `first_success`: return the moment one adapter succeeds with
    /// non-empty data, cancelling every other outstanding launch.
    async fn drain_first_success(
        &self,
        mut join_set: JoinSet<(usize, TaskOutcome)>,
        adapter_names: &[String],
    ) -> Vec<AdapterResult> {
        let mut results: HashMap<usize, AdapterResult> = HashMap::with_capacity(adapter_names.len());
        let deadline = tokio::time::Instant::now() + self.config.execution_timeout;

        while results.len() < adapter_names.len() {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, join_set.join_next()).await {
                Ok(Some(Ok((index, TaskOutcome::Success(result))))) if !result.data.is_empty() => {
                    results.insert(index, result);
                    break;
                }
                Ok(Some(Ok((index, outcome)))) => {
                    results.insert(index, Self::unwrap_outcome(outcome));
                }
                Ok(Some(Err(join_err))) => {
                    warn!(error = %join_err, "adapter task panicked");
                }
                Ok(None) => break,
                Err(_elapsed) => break,
            }
        }

        join_set.abort_all();
        self.fill_missing(results, adapter_names, "cancelled")
    }

    fn unwrap_outcome(outcome: TaskOutcome) -> AdapterResult {
        match outcome {
            TaskOutcome::Success(r) | TaskOutcome::Failure(r) => r,
        }
    }

    fn fill_missing(
        &self,
        mut results: HashMap<usize, AdapterResult>,
        adapter_names: &[String],
        reason: &str,
    ) -> Vec<AdapterResult> {
        adapter_names
            .iter()
            .enumerate()
            .map(|(index, name)| {
                results.remove(&index).unwrap_or_else(|| {
                    if reason == "cancelled" {
                        AdapterResult::cancelled(name)
                    } else {
                        AdapterResult::failure(name, reason, self.config.execution_timeout)
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use orbit_core::{ContextItem, GatewayError};
    use std::collections::HashMap as StdHashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedAdapter {
        name: String,
        delay: Duration,
        outcome: FixedOutcome,
        calls: Arc<AtomicUsize>,
    }

    #[derive(Clone)]
    enum FixedOutcome {
        Ok(Vec<ContextItem>),
        Err,
    }

    #[async_trait]
    impl Adapter for FixedAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        async fn retrieve(&self, _query: &str, _options: &RetrieveOptions) -> Result<Vec<ContextItem>, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match &self.outcome {
                FixedOutcome::Ok(items) => Ok(items.clone()),
                FixedOutcome::Err => Err(GatewayError::backend("test", "boom")),
            }
        }
    }

    struct MapSource(StdHashMap<String, ResolvedAdapter>);

    impl AdapterSource for MapSource {
        fn resolve(&self, name: &str) -> Option<ResolvedAdapter> {
            self.0.get(name).cloned()
        }
    }

    fn resolved(adapter: Arc<dyn Adapter>) -> ResolvedAdapter {
        ResolvedAdapter {
            adapter,
            isolation: Isolation::None,
            breaker_config: BreakerConfig {
                failure_threshold: 3,
                success_threshold: 1,
                recovery_timeout: Duration::from_millis(50),
                operation_timeout: Duration::from_secs(5),
            },
        }
    }

    #[tokio::test]
    async fn all_strategy_returns_one_result_per_adapter_in_order() {
        let mut map = StdHashMap::new();
        map.insert(
            "fast".to_string(),
            resolved(Arc::new(FixedAdapter {
                name: "fast".to_string(),
                delay: Duration::ZERO,
                outcome: FixedOutcome::Ok(vec![ContextItem::new("hi", 0.9)]),
                calls: Arc::new(AtomicUsize::new(0)),
            })),
        );
        map.insert(
            "broken".to_string(),
            resolved(Arc::new(FixedAdapter {
                name: "broken".to_string(),
                delay: Duration::ZERO,
                outcome: FixedOutcome::Err,
                calls: Arc::new(AtomicUsize::new(0)),
            })),
        );

        let executor = ParallelAdapterExecutor::new(
            Arc::new(MapSource(map)),
            Arc::new(CircuitBreakerManager::new()),
            ExecutorConfig {
                strategy: Strategy::All,
                max_concurrent_adapters: 4,
                execution_timeout: Duration::from_secs(2),
            },
        );

        let names = vec!["fast".to_string(), "broken".to_string()];
        let results = executor.execute("q", &names, &RetrieveOptions::default()).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].adapter_name, "fast");
        assert!(results[0].success);
        assert_eq!(results[1].adapter_name, "broken");
        assert!(!results[1].success);
    }

    #[tokio::test]
    async fn unknown_adapter_name_yields_a_failure_result_not_a_panic() {
        let executor = ParallelAdapterExecutor::new(
            Arc::new(MapSource(StdHashMap::new())),
            Arc::new(CircuitBreakerManager::new()),
            ExecutorConfig::default(),
        );
        let names = vec!["ghost".to_string()];
        let results = executor.execute("q", &names, &RetrieveOptions::default()).await;
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert_eq!(results[0].error.as_deref(), Some("adapter not found"));
    }

    #[tokio::test]
    async fn first_success_cancels_slower_adapters() {
        let slow_calls = Arc::new(AtomicUsize::new(0));
        let mut map = StdHashMap::new();
        map.insert(
            "quick".to_string(),
            resolved(Arc::new(FixedAdapter {
                name: "quick".to_string(),
                delay: Duration::from_millis(5),
                outcome: FixedOutcome::Ok(vec![ContextItem::new("hit", 0.8)]),
                calls: Arc::new(AtomicUsize::new(0)),
            })),
        );
        map.insert(
            "slow".to_string(),
            resolved(Arc::new(FixedAdapter {
                name: "slow".to_string(),
                delay: Duration::from_millis(500),
                outcome: FixedOutcome::Ok(vec![ContextItem::new("late", 0.8)]),
                calls: slow_calls.clone(),
            })),
        );

        let executor = ParallelAdapterExecutor::new(
            Arc::new(MapSource(map)),
            Arc::new(CircuitBreakerManager::new()),
            ExecutorConfig {
                strategy: Strategy::FirstSuccess,
                max_concurrent_adapters: 4,
                execution_timeout: Duration::from_secs(2),
            },
        );

        let names = vec!["quick".to_string(), "slow".to_string()];
        let results = executor.execute("q", &names, &RetrieveOptions::default()).await;

        assert_eq!(results.len(), 2);
        let quick = results.iter().find(|r| r.adapter_name == "quick").unwrap();
        let slow = results.iter().find(|r| r.adapter_name == "slow").unwrap();
        assert!(quick.success);
        assert!(!slow.success);
        assert_eq!(slow.error.as_deref(), Some("cancelled"));
    }

    #[tokio::test]
    async fn best_effort_returns_timeout_for_adapters_still_running_at_deadline() {
        let mut map = StdHashMap::new();
        map.insert(
            "stuck".to_string(),
            resolved(Arc::new(FixedAdapter {
                name: "stuck".to_string(),
                delay: Duration::from_secs(10),
                outcome: FixedOutcome::Ok(vec![ContextItem::new("never", 0.5)]),
                calls: Arc::new(AtomicUsize::new(0)),
            })),
        );

        let executor = ParallelAdapterExecutor::new(
            Arc::new(MapSource(map)),
            Arc::new(CircuitBreakerManager::new()),
            ExecutorConfig {
                strategy: Strategy::BestEffort,
                max_concurrent_adapters: 4,
                execution_timeout: Duration::from_millis(30),
            },
        );

        let names = vec!["stuck".to_string()];
        let results = executor.execute("q", &names, &RetrieveOptions::default()).await;
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert_eq!(results[0].error.as_deref(), Some("execution timeout exceeded"));
    }
}
