//! Weekly billing periods for activation counters.
//!
//! A period is identified by the Monday (UTC) of the ISO week containing
//! the activation instant. Counters keyed by (user, period) roll over
//! naturally when the key changes; nothing is deleted at the boundary.

use chrono::{DateTime, Datelike, Duration, Utc};

pub fn now_ts() -> u64 {
    Utc::now().timestamp() as u64
}

/// Period key for an epoch timestamp: the week's Monday as "YYYY-MM-DD".
pub fn period_key(ts: u64) -> String {
    let dt = DateTime::<Utc>::from_timestamp(ts as i64, 0).unwrap_or_default();
    let days_into_week = dt.weekday().num_days_from_monday() as i64;
    let monday = dt.date_naive() - Duration::days(days_into_week);
    monday.format("%Y-%m-%d").to_string()
}

/// Key for the current instant.
pub fn current_period() -> String {
    period_key(now_ts())
}
