//! # Docstore - crawler document persistence
//!
//! A small SQLite-backed store shared by the crawler pipeline.
//!
//! Docstore provides:
//! - A URL dedup cache (`downloaded_urls`) with time-based expiration
//! - A keyed table of extracted medical documents (`documents`)
//! - Per-call pooled sessions so many threads can share one store
//! - Path helpers for locating cached raw HTML

pub mod clock;
pub mod config;
pub mod document;
pub mod download;
pub mod expiry;
pub mod paths;
pub mod storage;

// Re-exports for convenient access
pub use clock::{Clock, SystemClock};
pub use config::StoreConfig;
pub use document::{DocumentFields, DocumentRecord};
pub use download::DownloadRecord;
pub use expiry::{ExpiryWindow, TimeUnit};
pub use paths::{html_path, html_path_in};
pub use storage::{DocumentStore, StoreStats};

use std::path::PathBuf;

/// Result type alias for Docstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Docstore operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Cannot initialize store at {}: {source}", path.display())]
    StorageInit {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid time unit: {0} (expected minutes, hours, days or weeks)")]
    InvalidUnit(String),

    #[error("Expiry window of {amount} {unit} is out of range")]
    InvalidWindow { amount: i64, unit: TimeUnit },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Corrupt data for {url}: {reason} (stored value {value:?})")]
    DataCorruption {
        url: String,
        value: String,
        reason: String,
    },

    #[error("No database session available: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Invalid config at {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    pub(crate) fn storage_init(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Error::StorageInit {
            path: path.into(),
            source: source.into(),
        }
    }

    pub(crate) fn config(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Error::Config {
            path: path.into(),
            source: source.into(),
        }
    }
}
