//! Download records - one row per URL in the dedup cache

use crate::expiry::ExpiryWindow;
use crate::Result;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// The last time a URL was fetched.
///
/// Re-recording a URL replaces `downloaded_at`; no history is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub url: String,
    /// Naive UTC
    pub downloaded_at: NaiveDateTime,
}

impl DownloadRecord {
    pub fn new(url: impl Into<String>, downloaded_at: NaiveDateTime) -> Self {
        Self {
            url: url.into(),
            downloaded_at,
        }
    }

    /// Whether this download is older than `window` at `now`
    pub fn is_expired(&self, window: &ExpiryWindow, now: NaiveDateTime) -> Result<bool> {
        window.is_expired(self.downloaded_at, now)
    }
}

/// Expiry decision for a URL that may or may not have been recorded
pub fn needs_refetch(
    record: Option<&DownloadRecord>,
    window: &ExpiryWindow,
    now: NaiveDateTime,
) -> Result<bool> {
    match record {
        None => Ok(true),
        Some(record) => record.is_expired(window, now),
    }
}
