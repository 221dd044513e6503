//! ABOUTME: UTC period-key computation and TTL sizing for the daily/monthly counters

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

/// Extra seconds tacked onto a period's natural expiry so a counter survives
/// slightly past midnight/month-end rather than racing the clock.
const DAILY_BUFFER_SECS: i64 = Duration::days(1).num_seconds();
const MONTHLY_BUFFER_SECS: i64 = Duration::days(5).num_seconds();

#[must_use]
pub fn daily_suffix(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d").to_string()
}

#[must_use]
pub fn monthly_suffix(now: DateTime<Utc>) -> String {
    now.format("%Y%m").to_string()
}

#[must_use]
pub fn daily_ttl_seconds(now: DateTime<Utc>) -> i64 {
    seconds_until_end_of_day(now) + DAILY_BUFFER_SECS
}

#[must_use]
pub fn monthly_ttl_seconds(now: DateTime<Utc>) -> i64 {
    seconds_until_end_of_month(now) + MONTHLY_BUFFER_SECS
}

fn seconds_until_end_of_day(now: DateTime<Utc>) -> i64 {
    let tomorrow = now.date_naive() + Duration::days(1);
    let tomorrow_midnight = Utc.from_utc_datetime(&tomorrow.and_hms_opt(0, 0, 0).expect("valid midnight"));
    (tomorrow_midnight - now).num_seconds().max(0)
}

fn seconds_until_end_of_month(now: DateTime<Utc>) -> i64 {
    let (next_year, next_month) = if now.month() == 12 { (now.year() + 1, 1) } else { (now.year(), now.month() + 1) };
    let first_of_next_month = NaiveDate::from_ymd_opt(next_year, next_month, 1).expect("valid calendar date");
    let first_of_next_month_utc = Utc.from_utc_datetime(&first_of_next_month.and_hms_opt(0, 0, 0).expect("valid midnight"));
    (first_of_next_month_utc - now).num_seconds().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_suffix_formats_as_yyyymmdd() {
        let now = Utc.with_ymd_and_hms(2026, 3, 5, 12, 0, 0).unwrap();
        assert_eq!(daily_suffix(now), "20260305");
    }

    #[test]
    fn monthly_suffix_formats_as_yyyymm() {
        let now = Utc.with_ymd_and_hms(2026, 3, 5, 12, 0, 0).unwrap();
        assert_eq!(monthly_suffix(now), "202603");
    }

    #[test]
    fn daily_ttl_is_always_positive_and_includes_buffer() {
        let just_before_midnight = Utc.with_ymd_and_hms(2026, 3, 5, 23, 59, 0).unwrap();
        let ttl = daily_ttl_seconds(just_before_midnight);
        assert!(ttl > DAILY_BUFFER_SECS);
        assert!(ttl < DAILY_BUFFER_SECS + 120);
    }

    #[test]
    fn monthly_ttl_handles_december_rollover() {
        let new_years_eve = Utc.with_ymd_and_hms(2026, 12, 31, 23, 0, 0).unwrap();
        let ttl = monthly_ttl_seconds(new_years_eve);
        assert!(ttl > MONTHLY_BUFFER_SECS);
    }
}
