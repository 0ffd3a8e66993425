//! Test helpers and utilities

use chrono::{NaiveDate, NaiveDateTime};

/// Initialize tracing for tests (call once at start of test)
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("shelfwatch_rdbc=debug"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// A fixed timestamp on 2026-01-01, `minute` minutes past midnight
pub fn ts(minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 1, 1)
        .and_then(|d| d.and_hms_opt(minute / 60, minute % 60, 0))
        .expect("valid timestamp")
}
