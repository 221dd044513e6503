//! ABOUTME: Quota Service (C8) and Throttle Middleware (C9) - atomic counters feeding delay shaping

mod lua;
mod period;
pub mod service;
pub mod throttle;

pub use service::{QuotaKeyConfig, QuotaService, QuotaUsage, ResetPeriod};
pub use throttle::{ThrottleDecision, ThrottleMiddleware};
