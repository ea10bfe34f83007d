//! Timestamp type used throughout the core, and the single canonical parser
//! for incoming time strings.
//!
//! Timestamps are Unix epoch seconds (UTC). They are rendered as RFC3339 in
//! UTC; anything arriving from outside goes through [`parse_timestamp`].

use crate::error::CoreError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

pub const MINUTE: u64 = 60;
pub const HOUR: u64 = 60 * MINUTE;
pub const DAY: u64 = 24 * HOUR;

/// A Unix timestamp in seconds since epoch (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch (time zero).
    pub const EPOCH: Self = Self(0);

    pub fn new(secs: u64) -> Self {
        Self(secs)
    }

    /// Current system time. A clock set before 1970 reads as the epoch.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Seconds elapsed since this timestamp (relative to `now`).
    pub fn elapsed_since(&self, now: Timestamp) -> u64 {
        now.0.saturating_sub(self.0)
    }

    /// Whether this timestamp + duration has passed relative to `now`.
    pub fn has_expired(&self, duration_secs: u64, now: Timestamp) -> bool {
        now.0 >= self.0.saturating_add(duration_secs)
    }

    pub fn plus_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    pub fn minus_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_sub(secs))
    }

    /// Canonical representation: RFC3339, UTC, second precision.
    pub fn to_rfc3339(&self) -> String {
        let secs = i64::try_from(self.0).unwrap_or(i64::MAX);
        match DateTime::<Utc>::from_timestamp(secs, 0) {
            Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
            None => format!("{}s", self.0),
        }
    }

    /// Parse any of the accepted input formats (see [`parse_timestamp`]).
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        parse_timestamp(input)
    }
}

impl FromStr for Timestamp {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_timestamp(s)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

/// Zoned layouts beyond strict RFC3339 (space separator, fractional seconds).
const ZONED_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

/// Naive layouts, interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// Parse a time string into a [`Timestamp`].
///
/// Accepted: RFC3339, RFC3339 with nanoseconds, `YYYY-MM-DD`,
/// `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD HH:MM:SS.fraction` and
/// `YYYY-MM-DD HH:MM:SS.fraction±hh:mm`. Inputs without an offset are UTC.
/// Sub-second precision is truncated.
pub fn parse_timestamp(input: &str) -> Result<Timestamp, CoreError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(CoreError::Validation("empty timestamp".to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return from_unix(dt.timestamp(), input);
    }
    for fmt in ZONED_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return from_unix(dt.timestamp(), input);
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return from_unix(naive.and_utc().timestamp(), input);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return from_unix(midnight.and_utc().timestamp(), input);
        }
    }

    Err(CoreError::Validation(format!("unrecognised timestamp: {input:?}")))
}

fn from_unix(secs: i64, input: &str) -> Result<Timestamp, CoreError> {
    u64::try_from(secs)
        .map(Timestamp::new)
        .map_err(|_| CoreError::Validation(format!("timestamp before 1970: {input:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-03-01T10:30:00Z
    const T: u64 = 1_709_289_000;

    #[test]
    fn parses_rfc3339_variants() {
        assert_eq!(parse_timestamp("2024-03-01T10:30:00Z").unwrap().as_secs(), T);
        assert_eq!(parse_timestamp("2024-03-01T13:30:00+03:00").unwrap().as_secs(), T);
        assert_eq!(
            parse_timestamp("2024-03-01T10:30:00.123456789Z").unwrap().as_secs(),
            T
        );
    }

    #[test]
    fn parses_sql_style_layouts() {
        assert_eq!(parse_timestamp("2024-03-01 10:30:00").unwrap().as_secs(), T);
        assert_eq!(parse_timestamp("2024-03-01 10:30:00.25").unwrap().as_secs(), T);
        assert_eq!(
            parse_timestamp("2024-03-01 13:30:00.500+03:00").unwrap().as_secs(),
            T
        );
        assert_eq!(
            parse_timestamp("2024-03-01").unwrap().as_secs(),
            T - 10 * HOUR - 30 * MINUTE
        );
    }

    #[test]
    fn rejects_garbage_and_pre_epoch() {
        assert!(parse_timestamp("").is_err());
        assert!(parse_timestamp("yesterday").is_err());
        assert!(parse_timestamp("1969-12-31T23:59:59Z").is_err());
    }

    #[test]
    fn canonical_rendering_round_trips() {
        let ts = Timestamp::new(T);
        assert_eq!(ts.to_rfc3339(), "2024-03-01T10:30:00Z");
        assert_eq!(parse_timestamp(&ts.to_rfc3339()).unwrap(), ts);
    }

    #[test]
    fn expiry_arithmetic() {
        let start = Timestamp::new(1000);
        assert!(!start.has_expired(60, Timestamp::new(1059)));
        assert!(start.has_expired(60, Timestamp::new(1060)));
        assert_eq!(start.minus_secs(5000), Timestamp::EPOCH);
        assert_eq!(start.elapsed_since(Timestamp::new(900)), 0);
    }
}
