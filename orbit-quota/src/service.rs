//! ABOUTME: QuotaService - atomic Redis-backed per-key counters with fail-open degradation
//! ABOUTME: Every Redis error is swallowed here; callers always see "within quota" on failure

use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use orbit_config::QuotaConfig;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use tracing::warn;

use crate::period::{daily_suffix, daily_ttl_seconds, monthly_suffix, monthly_ttl_seconds};
use crate::lua::INCREMENT_AND_GET;

/// Outcome of one `increment_and_get` call. All-zero on any Redis failure,
/// the fail-open default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuotaUsage {
    pub daily_used: u64,
    pub monthly_used: u64,
    pub daily_ttl_remaining: i64,
    pub monthly_ttl_remaining: i64,
}

/// Per-key quota policy, normally loaded from a persisted store and cached
/// locally; falls back to the process-wide defaults in [`QuotaConfig`].
#[derive(Debug, Clone, Copy)]
pub struct QuotaKeyConfig {
    pub daily_limit: Option<u64>,
    pub monthly_limit: Option<u64>,
    pub throttle_enabled: bool,
    pub throttle_priority: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetPeriod {
    Daily,
    Monthly,
    All,
}

pub struct QuotaService {
    manager: tokio::sync::Mutex<ConnectionManager>,
    script: Script,
    config: QuotaConfig,
    key_config_cache: DashMap<String, (QuotaKeyConfig, Instant)>,
}

impl QuotaService {
    pub async fn connect(config: QuotaConfig) -> Result<Self, orbit_core::GatewayError> {
        let client = redis::Client::open(config.redis_url.clone())
            .map_err(|e| orbit_core::GatewayError::config(format!("invalid redis url: {e}")))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| orbit_core::GatewayError::backend("redis", e.to_string()))?;
        Ok(Self {
            manager: tokio::sync::Mutex::new(manager),
            script: Script::new(INCREMENT_AND_GET),
            config,
            key_config_cache: DashMap::new(),
        })
    }

    fn keys(&self, key: &str) -> (String, String, String) {
        let now = Utc::now();
        (
            format!("orbit:quota:{key}:daily:{}", daily_suffix(now)),
            format!("orbit:quota:{key}:monthly:{}", monthly_suffix(now)),
            format!("orbit:quota:{key}:last_request"),
        )
    }

    /// Atomically increments both counters and records the request
    /// timestamp. Never returns an error: any Redis failure is logged and
    /// answered as "no usage yet" so traffic is never blocked on an outage.
    pub async fn increment_and_get(&self, key: &str) -> QuotaUsage {
        let (daily_key, monthly_key, last_request_key) = self.keys(key);
        let now = Utc::now();

        let result: redis::RedisResult<(i64, i64, i64, i64)> = {
            let mut manager = self.manager.lock().await;
            self.script
                .key(&daily_key)
                .key(&monthly_key)
                .key(&last_request_key)
                .arg(daily_ttl_seconds(now))
                .arg(monthly_ttl_seconds(now))
                .arg(now.timestamp())
                .invoke_async(&mut *manager)
                .await
        };

        match result {
            Ok((daily, monthly, daily_ttl, monthly_ttl)) => QuotaUsage {
                daily_used: daily.max(0) as u64,
                monthly_used: monthly.max(0) as u64,
                daily_ttl_remaining: daily_ttl,
                monthly_ttl_remaining: monthly_ttl,
            },
            Err(err) => {
                warn!(key, error = %err, "quota increment failed, failing open");
                QuotaUsage::default()
            }
        }
    }

    /// Reads `key`'s policy, consulting a short-lived local cache before
    /// falling back to a Redis hash lookup, then to process-wide defaults.
    /// Any failure (cache miss plus Redis error) also falls back to
    /// defaults - this path fails open exactly like `increment_and_get`.
    pub async fn get_quota_config(&self, key: &str) -> QuotaKeyConfig {
        let ttl = Duration::from_secs(self.config.config_cache_ttl_secs);
        if let Some(entry) = self.key_config_cache.get(key) {
            if entry.1.elapsed() < ttl {
                return entry.0;
            }
        }

        let config = self.fetch_quota_config(key).await.unwrap_or_else(|| self.default_key_config());
        self.key_config_cache.insert(key.to_string(), (config, Instant::now()));
        config
    }

    async fn fetch_quota_config(&self, key: &str) -> Option<QuotaKeyConfig> {
        let hash_key = format!("orbit:quota:{key}:config");
        let mut manager = self.manager.lock().await;
        let fields: redis::RedisResult<Vec<(String, String)>> = manager.hgetall(&hash_key).await;
        match fields {
            Ok(pairs) if !pairs.is_empty() => {
                let map: std::collections::HashMap<_, _> = pairs.into_iter().collect();
                Some(QuotaKeyConfig {
                    daily_limit: map.get("daily_limit").and_then(|v| v.parse().ok()),
                    monthly_limit: map.get("monthly_limit").and_then(|v| v.parse().ok()),
                    throttle_enabled: map
                        .get("throttle_enabled")
                        .map(|v| v == "1" || v == "true")
                        .unwrap_or(true),
                    throttle_priority: map.get("throttle_priority").and_then(|v| v.parse().ok()).unwrap_or(5),
                })
            }
            Ok(_) => None,
            Err(err) => {
                warn!(key, error = %err, "quota config lookup failed, using defaults");
                None
            }
        }
    }

    fn default_key_config(&self) -> QuotaKeyConfig {
        QuotaKeyConfig {
            daily_limit: self.config.default_daily_limit,
            monthly_limit: self.config.default_monthly_limit,
            throttle_enabled: true,
            throttle_priority: 5,
        }
    }

    /// Deletes the counter(s) for `key`. `ResetPeriod::All` also clears the
    /// locally cached policy so the next lookup re-reads from Redis.
    pub async fn reset(&self, key: &str, period: ResetPeriod) {
        let (daily_key, monthly_key, _) = self.keys(key);
        let targets: Vec<&str> = match period {
            ResetPeriod::Daily => vec![daily_key.as_str()],
            ResetPeriod::Monthly => vec![monthly_key.as_str()],
            ResetPeriod::All => vec![daily_key.as_str(), monthly_key.as_str()],
        };

        let mut manager = self.manager.lock().await;
        for target in targets {
            if let Err(err) = manager.del::<_, ()>(target).await {
                warn!(key, target, error = %err, "quota reset failed");
            }
        }
        if period == ResetPeriod::All {
            self.key_config_cache.remove(key);
        }
    }
}
