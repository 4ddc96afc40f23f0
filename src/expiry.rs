//! Expiry windows and the on-disk timestamp format
//!
//! A download is stale once `downloaded_at + window` lies strictly in the past.
//! Windows are fixed-length: a day is always 24 hours, a week always 7 days.
//!
//! Timestamps are stored as naive UTC ISO-8601 text without an offset,
//! e.g. `2024-03-01T12:00:00.123456`. The fraction is left off entirely when
//! it is zero, so `2024-03-01T12:00:00` is also a written form.

use crate::{Error, Result};
use chrono::{NaiveDateTime, TimeDelta, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Format used when writing timestamps with a sub-second part
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Format used when writing whole-second timestamps
pub const TIMESTAMP_FORMAT_SECONDS: &str = "%Y-%m-%dT%H:%M:%S";

/// Formats accepted when reading timestamps. `%.f` also matches a missing fraction.
const ACCEPTED_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Units an expiry window can be expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl TimeUnit {
    /// Get the string representation of the unit
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
            TimeUnit::Weeks => "weeks",
        }
    }

    /// Get all units
    pub fn all() -> &'static [TimeUnit] {
        &[TimeUnit::Minutes, TimeUnit::Hours, TimeUnit::Days, TimeUnit::Weeks]
    }

    /// Fixed-length duration of `amount` units, or `None` on overflow
    pub fn duration(&self, amount: i64) -> Option<TimeDelta> {
        match self {
            TimeUnit::Minutes => TimeDelta::try_minutes(amount),
            TimeUnit::Hours => TimeDelta::try_hours(amount),
            TimeUnit::Days => TimeDelta::try_days(amount),
            TimeUnit::Weeks => TimeDelta::try_weeks(amount),
        }
    }
}

impl FromStr for TimeUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "minutes" | "minute" | "min" | "mins" => Ok(TimeUnit::Minutes),
            "hours" | "hour" | "h" => Ok(TimeUnit::Hours),
            "days" | "day" | "d" => Ok(TimeUnit::Days),
            "weeks" | "week" | "w" => Ok(TimeUnit::Weeks),
            _ => Err(Error::InvalidUnit(s.to_string())),
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A TTL such as "24 hours"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryWindow {
    pub amount: i64,
    pub unit: TimeUnit,
}

impl ExpiryWindow {
    pub fn new(amount: i64, unit: TimeUnit) -> Self {
        Self { amount, unit }
    }

    pub fn duration(&self) -> Result<TimeDelta> {
        self.unit.duration(self.amount).ok_or(Error::InvalidWindow {
            amount: self.amount,
            unit: self.unit,
        })
    }

    /// The instant after which something recorded at `since` is stale
    pub fn deadline(&self, since: NaiveDateTime) -> Result<NaiveDateTime> {
        since
            .checked_add_signed(self.duration()?)
            .ok_or(Error::InvalidWindow {
                amount: self.amount,
                unit: self.unit,
            })
    }

    /// Whether something recorded at `since` has expired by `now`
    pub fn is_expired(&self, since: NaiveDateTime, now: NaiveDateTime) -> Result<bool> {
        Ok(self.deadline(since)? < now)
    }
}

impl fmt::Display for ExpiryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.unit)
    }
}

/// Render a timestamp for storage, at microsecond precision
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    let fmt = if ts.nanosecond() / 1_000 == 0 {
        TIMESTAMP_FORMAT_SECONDS
    } else {
        TIMESTAMP_FORMAT
    };
    ts.format(fmt).to_string()
}

/// Parse a stored timestamp, returning a human-readable reason on failure
pub fn parse_timestamp(raw: &str) -> std::result::Result<NaiveDateTime, String> {
    let mut last_err = None;
    for fmt in ACCEPTED_FORMATS {
        match NaiveDateTime::parse_from_str(raw, fmt) {
            Ok(ts) => return Ok(ts),
            Err(e) => last_err = Some(e),
        }
    }
    Err(match last_err {
        Some(e) => format!("unparseable timestamp: {}", e),
        None => "unparseable timestamp".to_string(),
    })
}
