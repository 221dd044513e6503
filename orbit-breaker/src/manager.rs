//! ABOUTME: Registry of per-adapter circuit breakers, keyed by adapter name
//! ABOUTME: One breaker per adapter name; creation is idempotent and lock-free on the happy path

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Semaphore;

use crate::{BreakerConfig, CircuitBreaker, CircuitBreakerStats, Isolation};

/// Owns every adapter's `CircuitBreaker` plus, for adapters configured with
/// `Isolation::WorkerPool`, the bounded semaphore that limits their
/// concurrent in-flight calls.
#[derive(Default)]
pub struct CircuitBreakerManager {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    worker_pools: DashMap<String, Arc<Semaphore>>,
}

impl CircuitBreakerManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing breaker for `name`, or creates one with
    /// `default_config` if this is the first time it's been seen.
    pub fn get_or_create(&self, name: &str, default_config: BreakerConfig) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, default_config)))
            .clone()
    }

    /// Creates (or replaces) the breaker for `name` with an explicit config,
    /// used when an adapter descriptor carries `fault_tolerance` overrides.
    pub fn create_custom(&self, name: &str, config: BreakerConfig) -> Arc<CircuitBreaker> {
        let breaker = Arc::new(CircuitBreaker::new(name, config));
        self.breakers.insert(name.to_string(), breaker.clone());
        breaker
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|e| e.clone())
    }

    /// Acquires a worker-pool permit for `name`, lazily sizing the semaphore
    /// from `max_workers` the first time it's asked for. Callers hold the
    /// returned permit for the lifetime of the `CircuitBreaker::execute` call
    /// so a hung backend can still only occupy `max_workers` slots.
    pub async fn acquire_worker_permit(
        &self,
        name: &str,
        max_workers: usize,
    ) -> tokio::sync::OwnedSemaphorePermit {
        let semaphore = self
            .worker_pools
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(max_workers.max(1))))
            .clone();
        semaphore
            .acquire_owned()
            .await
            .expect("worker pool semaphore is never closed")
    }

    #[must_use]
    pub fn all_stats(&self) -> Vec<CircuitBreakerStats> {
        self.breakers.iter().map(|e| e.value().stats()).collect()
    }

    pub fn reset_all(&self) {
        for entry in &self.breakers {
            entry.value().reset();
        }
    }

    pub fn reset(&self, name: &str) -> bool {
        match self.breakers.get(name) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.breakers.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn get_or_create_returns_same_instance_for_repeated_calls() {
        let manager = CircuitBreakerManager::new();
        let a = manager.get_or_create("kb", BreakerConfig::default());
        let b = manager.get_or_create("kb", BreakerConfig::conservative());
        assert!(Arc::ptr_eq(&a, &b), "second call must not replace the first breaker");
    }

    #[test]
    fn create_custom_replaces_existing_breaker() {
        let manager = CircuitBreakerManager::new();
        let a = manager.get_or_create("kb", BreakerConfig::default());
        let b = manager.create_custom("kb", BreakerConfig::fast_fail());
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn reset_all_clears_every_breaker() {
        let manager = CircuitBreakerManager::new();
        let breaker = manager.get_or_create(
            "kb",
            BreakerConfig {
                failure_threshold: 1,
                success_threshold: 1,
                recovery_timeout: Duration::from_millis(10),
                operation_timeout: Duration::from_millis(50),
            },
        );
        let _ = breaker
            .execute(&Isolation::None, || async { Err::<u32, _>(anyhow::anyhow!("boom")) })
            .await;
        assert_eq!(manager.all_stats()[0].failed, 1);
        manager.reset_all();
        assert_eq!(manager.all_stats()[0].failed, 0);
    }

    #[tokio::test]
    async fn worker_pool_permits_are_bounded() {
        let manager = CircuitBreakerManager::new();
        let _p1 = manager.acquire_worker_permit("kb", 1).await;
        let second = manager.acquire_worker_permit("kb", 1);
        tokio::select! {
            _ = second => panic!("second permit should not have been granted immediately"),
            () = tokio::time::sleep(Duration::from_millis(20)) => {}
        }
    }
}
