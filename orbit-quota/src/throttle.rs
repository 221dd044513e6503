//! ABOUTME: ThrottleMiddleware - pre-adapter delay shaping and 429 enforcement (C9)

use std::sync::Arc;
use std::time::Duration;

use orbit_config::{DelayCurve, ThrottleConfig};

use crate::service::{QuotaKeyConfig, QuotaService, QuotaUsage};

#[derive(Debug, Clone)]
pub struct ThrottleDecision {
    pub delay: Duration,
    pub rejected: bool,
    pub reason: Option<String>,
    pub usage: QuotaUsage,
}

impl ThrottleDecision {
    fn pass(delay: Duration, usage: QuotaUsage) -> Self {
        Self { delay, rejected: false, reason: None, usage }
    }

    fn reject(reason: impl Into<String>, usage: QuotaUsage) -> Self {
        Self { delay: Duration::ZERO, rejected: true, reason: Some(reason.into()), usage }
    }
}

pub struct ThrottleMiddleware {
    quota: Arc<QuotaService>,
    config: ThrottleConfig,
}

impl ThrottleMiddleware {
    #[must_use]
    pub fn new(quota: Arc<QuotaService>, config: ThrottleConfig) -> Self {
        Self { quota, config }
    }

    #[must_use]
    pub fn is_excluded(&self, path: &str) -> bool {
        self.config.excluded_paths.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Runs the full throttle pipeline for one request: excluded-path
    /// bypass, atomic increment, usage-fraction delay, and 429 enforcement.
    pub async fn check(&self, key: &str, path: &str) -> ThrottleDecision {
        if !self.config.enabled || self.is_excluded(path) {
            return ThrottleDecision::pass(Duration::ZERO, QuotaUsage::default());
        }

        let key_config = self.quota.get_quota_config(key).await;
        let usage = self.quota.increment_and_get(key).await;

        if let Some(reason) = breach_reason(&key_config, &usage) {
            return ThrottleDecision::reject(reason, usage);
        }

        let usage_fraction = usage_fraction(&key_config, &usage);
        let delay = compute_delay(&self.config, usage_fraction, key_config.throttle_priority);
        ThrottleDecision::pass(delay, usage)
    }
}

/// The delay curve from spec §4.5, pulled out as a free function so it can
/// be tested against the worked numeric example without a live `QuotaService`.
fn compute_delay(config: &ThrottleConfig, usage_fraction: f32, priority: u32) -> Duration {
    let threshold = config.threshold_percent;
    let base_ms = if usage_fraction < threshold {
        0.0
    } else {
        let x = ((usage_fraction - threshold) / (1.0 - threshold)).clamp(0.0, 1.0);
        let min = config.min_delay_ms as f32;
        let max = config.max_delay_ms as f32;
        match config.curve {
            DelayCurve::Linear => min + (max - min) * x,
            DelayCurve::Exponential => min + (max - min) * x * x,
        }
    };

    let multiplier = interpolate_priority(&config.priority_anchors, priority);
    let scaled = (base_ms * multiplier).round().clamp(0.0, config.max_delay_ms as f32);
    Duration::from_millis(scaled as u64)
}

fn usage_fraction(key_config: &QuotaKeyConfig, usage: &QuotaUsage) -> f32 {
    let daily = match key_config.daily_limit {
        Some(limit) if limit > 0 => usage.daily_used as f32 / limit as f32,
        _ => 0.0,
    };
    let monthly = match key_config.monthly_limit {
        Some(limit) if limit > 0 => usage.monthly_used as f32 / limit as f32,
        _ => 0.0,
    };
    daily.max(monthly)
}

fn breach_reason(key_config: &QuotaKeyConfig, usage: &QuotaUsage) -> Option<String> {
    if let Some(limit) = key_config.daily_limit {
        if usage.daily_used > limit {
            return Some(format!(
                "daily quota exceeded: {}/{} (resets in {}s)",
                usage.daily_used, limit, usage.daily_ttl_remaining
            ));
        }
    }
    if let Some(limit) = key_config.monthly_limit {
        if usage.monthly_used > limit {
            return Some(format!(
                "monthly quota exceeded: {}/{} (resets in {}s)",
                usage.monthly_used, limit, usage.monthly_ttl_remaining
            ));
        }
    }
    None
}

/// Piecewise-linear interpolation over `(priority, multiplier)` anchor
/// points, clamped to the first/last anchor outside their range.
fn interpolate_priority(anchors: &[(u32, f32)], priority: u32) -> f32 {
    if anchors.is_empty() {
        return 1.0;
    }
    let mut sorted = anchors.to_vec();
    sorted.sort_by_key(|(p, _)| *p);

    if priority <= sorted[0].0 {
        return sorted[0].1;
    }
    if priority >= sorted[sorted.len() - 1].0 {
        return sorted[sorted.len() - 1].1;
    }
    for window in sorted.windows(2) {
        let (p0, v0) = window[0];
        let (p1, v1) = window[1];
        if priority >= p0 && priority <= p1 {
            if p1 == p0 {
                return v0;
            }
            let t = (priority - p0) as f32 / (p1 - p0) as f32;
            return v0 + (v1 - v0) * t;
        }
    }
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolation_matches_anchor_points_exactly() {
        let anchors = vec![(1, 0.5), (5, 1.0), (10, 2.0)];
        assert_eq!(interpolate_priority(&anchors, 1), 0.5);
        assert_eq!(interpolate_priority(&anchors, 5), 1.0);
        assert_eq!(interpolate_priority(&anchors, 10), 2.0);
    }

    #[test]
    fn interpolation_is_linear_between_anchors() {
        let anchors = vec![(1, 0.5), (5, 1.0)];
        // halfway between priority 1 and 5 is priority 3
        let mid = interpolate_priority(&anchors, 3);
        assert!((mid - 0.75).abs() < 1e-6);
    }

    #[test]
    fn interpolation_clamps_outside_anchor_range() {
        let anchors = vec![(1, 0.5), (5, 1.0), (10, 2.0)];
        assert_eq!(interpolate_priority(&anchors, 0), 0.5);
        assert_eq!(interpolate_priority(&anchors, 99), 2.0);
    }

    #[test]
    fn usage_fraction_treats_unset_limit_as_unlimited() {
        let key_config = QuotaKeyConfig {
            daily_limit: None,
            monthly_limit: Some(100),
            throttle_enabled: true,
            throttle_priority: 5,
        };
        let usage = QuotaUsage {
            daily_used: 99_999,
            monthly_used: 50,
            daily_ttl_remaining: 100,
            monthly_ttl_remaining: 100,
        };
        assert_eq!(usage_fraction(&key_config, &usage), 0.5);
    }

    #[test]
    fn breach_reason_is_none_under_limit() {
        let key_config = QuotaKeyConfig {
            daily_limit: Some(100),
            monthly_limit: Some(1000),
            throttle_enabled: true,
            throttle_priority: 5,
        };
        let usage = QuotaUsage {
            daily_used: 50,
            monthly_used: 500,
            daily_ttl_remaining: 1,
            monthly_ttl_remaining: 1,
        };
        assert!(breach_reason(&key_config, &usage).is_none());
    }

    #[test]
    fn compute_delay_matches_the_worked_example_in_spec_scenario_3() {
        let config = ThrottleConfig {
            enabled: true,
            threshold_percent: 0.70,
            min_delay_ms: 100,
            max_delay_ms: 5000,
            curve: DelayCurve::Linear,
            priority_anchors: vec![(1, 0.5), (5, 1.0), (10, 2.0)],
            excluded_paths: vec![],
        };
        // 850/1000 = 0.85 usage, priority 5 (multiplier 1.0):
        // x = (0.85 - 0.70) / (1 - 0.70) = 0.5 -> base = 100 + (5000-100)*0.5 = 2550
        let delay = compute_delay(&config, 0.85, 5);
        assert_eq!(delay, Duration::from_millis(2550));
    }

    #[test]
    fn compute_delay_is_zero_at_exactly_threshold() {
        let config = ThrottleConfig { threshold_percent: 0.70, ..ThrottleConfig::default() };
        assert_eq!(compute_delay(&config, 0.70, 5), Duration::ZERO);
    }

    #[test]
    fn compute_delay_caps_at_max_when_usage_saturates() {
        let config = ThrottleConfig {
            threshold_percent: 0.70,
            min_delay_ms: 100,
            max_delay_ms: 5000,
            curve: DelayCurve::Linear,
            priority_anchors: vec![(1, 0.5), (5, 1.0), (10, 2.0)],
            ..ThrottleConfig::default()
        };
        // priority 10 -> multiplier 2.0 would overshoot 5000*2; must clamp to max_delay_ms.
        let delay = compute_delay(&config, 1.0, 10);
        assert_eq!(delay, Duration::from_millis(5000));
    }

    #[test]
    fn breach_reason_fires_strictly_above_limit() {
        let key_config = QuotaKeyConfig {
            daily_limit: Some(100),
            monthly_limit: None,
            throttle_enabled: true,
            throttle_priority: 5,
        };
        let at_limit = QuotaUsage {
            daily_used: 100,
            monthly_used: 0,
            daily_ttl_remaining: 1,
            monthly_ttl_remaining: 1,
        };
        assert!(breach_reason(&key_config, &at_limit).is_none());

        let over_limit = QuotaUsage { daily_used: 101, ..at_limit };
        assert!(breach_reason(&key_config, &over_limit).is_some());
    }
}
