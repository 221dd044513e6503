//! ABOUTME: Redis connection and default limit configuration for the Quota service (C8)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    pub redis_url: String,
    /// Process-wide default, used when a key's persisted config has no override.
    pub default_daily_limit: Option<u64>,
    pub default_monthly_limit: Option<u64>,
    /// How long `get_quota_config` caches a key's config locally (~5 min default).
    pub config_cache_ttl_secs: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            default_daily_limit: Some(10_000),
            default_monthly_limit: Some(250_000),
            config_cache_ttl_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayCurve {
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    pub enabled: bool,
    pub threshold_percent: f32,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub curve: DelayCurve,
    /// Priority -> multiplier anchor points, interpolated piecewise-linearly.
    /// Spec 4.5 defaults: `1 -> 0.5, 5 -> 1.0, 10 -> 2.0`.
    pub priority_anchors: Vec<(u32, f32)>,
    /// Path prefixes bypassed with zero overhead and no counter increment.
    pub excluded_paths: Vec<String>,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_percent: 0.70,
            min_delay_ms: 0,
            max_delay_ms: 2_000,
            curve: DelayCurve::Linear,
            priority_anchors: vec![(1, 0.5), (5, 1.0), (10, 2.0)],
            excluded_paths: vec!["/health".to_string(), "/metrics".to_string()],
        }
    }
}

impl ThrottleConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.threshold_percent) {
            return Err("throttle.threshold_percent must be in [0, 1]".to_string());
        }
        if self.min_delay_ms > self.max_delay_ms {
            return Err("throttle.min_delay_ms must be <= max_delay_ms".to_string());
        }
        if self.priority_anchors.is_empty() {
            return Err("throttle.priority_anchors must have at least one anchor point".to_string());
        }
        Ok(())
    }
}
